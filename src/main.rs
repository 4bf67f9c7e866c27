use clap::Parser;
use dotenvy::dotenv;
use paperless_ocr_sync::config::AppConfig;
use paperless_ocr_sync::infrastructure::clients::{VaultClientProvider, setup_http_client};
use paperless_ocr_sync::infrastructure::secrets::setup_secret_store;
use paperless_ocr_sync::services::worker::{OcrWorker, run_batch_once};
use paperless_ocr_sync::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to run (api, worker, all, once)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the HTTP trigger
    #[arg(short, long, default_value_t = 7071)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperless_ocr_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Paperless OCR sync [Mode: {}]...", args.mode);

    // 2. Clients
    let config = AppConfig::from_env();
    info!(
        "⚙️  Config: flag field={}, batch size={}, schedule='{}', scratch={}",
        config.flag_field_id,
        config.batch_size,
        config.schedule,
        config.scratch_dir.display()
    );

    let http = setup_http_client(&config)?;
    let secret_store = setup_secret_store(&config, http.clone())?;
    let clients = Arc::new(VaultClientProvider::new(
        secret_store,
        http,
        config.clone(),
    ));
    let run_lock = Arc::new(Mutex::new(()));

    if args.mode == "once" {
        let summary = run_batch_once(clients.as_ref(), &config, &run_lock).await?;
        info!(
            "✅ Run finished: {} processed, {} failed, stop={:?}",
            summary.processed, summary.failed, summary.stop
        );
        return Ok(());
    }

    // 3. Shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Timer trigger
    if args.mode == "worker" || args.mode == "all" {
        let worker = OcrWorker::new(
            clients.clone(),
            config.clone(),
            run_lock.clone(),
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                error!("❌ OCR worker stopped: {:#}", e);
            }
        }));
        info!("👷 OCR worker initialized.");
    }

    // 5. HTTP trigger
    if args.mode == "api" || args.mode == "all" {
        let state = AppState {
            config: config.clone(),
            clients: clients.clone(),
            run_lock: run_lock.clone(),
        };

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ HTTP trigger listening on: http://0.0.0.0:{}", args.port);

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for shutdown signal
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down...");
    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
