use crate::config::AppConfig;
use crate::infrastructure::clients::ClientProvider;
use crate::services::processor::RunSummary;
use anyhow::{Context, Result};
use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::time::{Duration, sleep};

/// Resolve clients and run one batch. Holds `run_lock` for the whole run.
pub async fn run_batch_once(
    clients: &dyn ClientProvider,
    config: &AppConfig,
    run_lock: &Mutex<()>,
) -> Result<RunSummary> {
    let _guard = run_lock.lock().await;
    let clients = clients.connect().await?;
    let summary = clients.processor(config).run_batch().await?;
    Ok(summary)
}

/// Fires a batch run on the configured cron schedule.
pub struct OcrWorker {
    clients: Arc<dyn ClientProvider>,
    config: AppConfig,
    run_lock: Arc<Mutex<()>>,
    shutdown: watch::Receiver<bool>,
}

impl OcrWorker {
    pub fn new(
        clients: Arc<dyn ClientProvider>,
        config: AppConfig,
        run_lock: Arc<Mutex<()>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            clients,
            config,
            run_lock,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let schedule = Schedule::from_str(&self.config.schedule)
            .with_context(|| format!("Invalid OCR schedule '{}'", self.config.schedule))?;
        tracing::info!(schedule = %self.config.schedule, "🚀 OCR worker started");

        if self.config.run_on_startup {
            self.tick().await?;
        }

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                tracing::warn!("OCR schedule has no upcoming runs, worker stopping");
                break;
            };
            let until = (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::from_secs(1));
            tracing::debug!(next = %next, "Next OCR run scheduled");

            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 OCR worker shutting down");
                    break;
                }
                _ = sleep(until) => {
                    self.tick().await?;
                }
            }
        }
        Ok(())
    }

    async fn tick(&self) -> Result<()> {
        tracing::info!("Paperless document processing timer fired");
        match run_batch_once(self.clients.as_ref(), &self.config, &self.run_lock).await {
            Ok(summary) => {
                tracing::info!(
                    processed = summary.processed,
                    failed = summary.failed,
                    stop = ?summary.stop,
                    "Processing completed successfully"
                );
                Ok(())
            }
            Err(e) if self.config.propagate_run_errors => Err(e),
            Err(e) => {
                tracing::error!("Error in processing: {:#}", e);
                Ok(())
            }
        }
    }
}
