use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hopper_core::protocol::ClaimedJob;
use hopper_worker::{
    DispatcherClient, JobContext, JobProcessor, ProcessError, WorkerConfig, WorkerPool,
};

/// Logs each payload and reports success.
struct LogPayloadProcessor;

#[async_trait]
impl JobProcessor for LogPayloadProcessor {
    async fn process(&self, ctx: &JobContext, job: &ClaimedJob) -> Result<(), ProcessError> {
        tracing::info!(
            job_id = ctx.job_id(),
            request_id = job.request.id,
            tag = job.request.tag.as_deref().unwrap_or("-"),
            payload = %job.request.payload,
            "Processing payload",
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hopper_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        dispatcher = %config.dispatcher_url,
        worker = %config.worker_name,
        pollers = config.worker_count,
        "Loaded worker configuration",
    );

    let client = DispatcherClient::new(
        &config.dispatcher_url,
        &config.authorization_key,
        config.http_timeout,
    )
    .context("Failed to build dispatcher client")?;

    // --- Pool ---
    let cancel = CancellationToken::new();
    let pool = WorkerPool::from_config(client, LogPayloadProcessor, &config);
    let pool_handle = tokio::spawn(pool.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();
    tracing::info!("Waiting for in-flight jobs to finish");

    let summary = pool_handle.await.context("Worker pool task failed")?;
    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        lost = summary.lost,
        "Graceful shutdown complete",
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping pollers");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping pollers");
        }
    }
}
