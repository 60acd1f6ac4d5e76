use std::sync::Arc;

use mall_server::tasks::{HttpSmsSender, LogSmsSender, SmsSender, TaskQueue, TaskWorker};
use mall_server::{AppState, BoxError, Config};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mall_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting mall-server (env: {})", config.environment);

    let sms: Arc<dyn SmsSender> = match &config.sms_gateway_url {
        Some(url) => Arc::new(HttpSmsSender::new(url.clone(), config.sms_template_id.clone())),
        None => {
            tracing::warn!("SMS_GATEWAY_URL not set, SMS codes will only be logged");
            Arc::new(LogSmsSender)
        }
    };
    let (queue, rx) = TaskQueue::new(config.task_queue_capacity);
    let worker = TaskWorker::new(sms, config.sms_code_ttl_secs.div_ceil(60));
    let worker_handle = tokio::spawn(worker.run(rx));

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let state = AppState::connect(config, queue).await?;
    let app = mall_server::app(state);

    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("mall-server HTTP listening on {http_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue sender; the worker drains and exits
    if let Err(e) = worker_handle.await {
        tracing::error!("Task worker panicked: {e}");
    }
    tracing::info!("mall-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
