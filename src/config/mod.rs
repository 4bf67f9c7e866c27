use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How the service authenticates against the secret store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Developer machine: reuse the Azure CLI login
    AzureCli,
    /// Hosted execution: managed identity of the host
    ManagedIdentity,
}

/// Runtime configuration for the OCR sync service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Key Vault base URL holding the service secrets
    pub vault_url: Option<String>,

    /// Credential strategy for the vault (default: managed identity)
    pub credential_mode: CredentialMode,

    /// Id of the boolean "Azure OCR Completed" custom field (default: 2)
    pub flag_field_id: i64,

    /// Documents fetched per page (default: 10)
    pub batch_size: u32,

    /// Pause between two documents (default: 1s)
    pub document_pause: Duration,

    /// Cron expression, seconds resolution (default: daily at midnight UTC)
    pub schedule: String,

    /// Run a batch as soon as the worker starts (default: true)
    pub run_on_startup: bool,

    /// Directory holding per-document scratch files (default: system temp dir)
    pub scratch_dir: PathBuf,

    /// OCR model identifier (default: "prebuilt-read")
    pub model_id: String,

    /// Upper bound on waiting for one OCR job (default: 600s)
    pub ocr_poll_timeout: Duration,

    /// Per-request timeout for outbound HTTP (default: 120s)
    pub http_timeout: Duration,

    /// Scheduled runs re-raise fatal errors instead of logging them (default: false)
    pub propagate_run_errors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vault_url: None,
            credential_mode: CredentialMode::ManagedIdentity,
            flag_field_id: 2,
            batch_size: 10,
            document_pause: Duration::from_secs(1),
            schedule: "0 0 0 * * *".to_string(),
            run_on_startup: true,
            scratch_dir: env::temp_dir(),
            model_id: "prebuilt-read".to_string(),
            ocr_poll_timeout: Duration::from_secs(600),
            http_timeout: Duration::from_secs(120),
            propagate_run_errors: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            vault_url: env::var("VAULT_URL")
                .or_else(|_| env::var("vault_url"))
                .ok()
                .filter(|v| !v.trim().is_empty()),

            credential_mode: if env_flag("IS_LOCAL_DEV").unwrap_or(false) {
                CredentialMode::AzureCli
            } else {
                CredentialMode::ManagedIdentity
            },

            flag_field_id: env::var("OCR_FLAG_FIELD_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.flag_field_id),

            batch_size: env::var("OCR_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(default.batch_size),

            document_pause: env::var("OCR_DOCUMENT_PAUSE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.document_pause),

            schedule: env::var("OCR_SCHEDULE").unwrap_or(default.schedule),

            run_on_startup: env_flag("OCR_RUN_ON_STARTUP").unwrap_or(default.run_on_startup),

            scratch_dir: env::var("OCR_SCRATCH_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(default.scratch_dir),

            model_id: env::var("OCR_MODEL_ID").unwrap_or(default.model_id),

            ocr_poll_timeout: env::var("OCR_POLL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.ocr_poll_timeout),

            http_timeout: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.http_timeout),

            propagate_run_errors: env_flag("PROPAGATE_RUN_ERRORS")
                .unwrap_or(default.propagate_run_errors),
        }
    }

    /// Create config for local development (CLI login, no pause, no startup run)
    pub fn development() -> Self {
        Self {
            credential_mode: CredentialMode::AzureCli,
            document_pause: Duration::ZERO,
            run_on_startup: false,
            ..Self::default()
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}
