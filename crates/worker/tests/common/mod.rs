#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use hopper_api::config::ServerConfig;
use hopper_api::router::build_app_router;
use hopper_api::state::AppState;
use hopper_core::protocol::{ClaimedJob, JobDetail};
use hopper_core::types::DbId;
use hopper_worker::{BackoffPolicy, DispatcherClient, JobContext, JobProcessor, ProcessError};

pub const TEST_KEY: &str = "test-authorization-key";

/// Backoff short enough that tests never wait on an idle poller.
pub const FAST_BACKOFF: BackoffPolicy = BackoffPolicy {
    idle: Duration::from_millis(20),
    error: Duration::from_millis(20),
};

/// Serve the real dispatcher router on an ephemeral local port and return
/// its base URL.
pub async fn spawn_dispatcher(pool: PgPool) -> String {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: Vec::new(),
        request_timeout_secs: 30,
        authorization_key: TEST_KEY.to_string(),
        job_lease_secs: 3600,
        lease_sweep_interval_secs: 60,
    };
    let app = build_app_router(AppState {
        pool,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{addr}")
}

pub fn client(base_url: &str) -> DispatcherClient {
    DispatcherClient::new(base_url, TEST_KEY, Duration::from_secs(5)).unwrap()
}

/// Poll until the job reaches a terminal status.
pub async fn wait_for_terminal(client: &DispatcherClient, job_id: DbId) -> JobDetail {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let detail = client.get_job(job_id).await.unwrap();
            if detail.job.status.is_terminal() {
                return detail;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job did not finish in time")
}

/// Processor whose behavior is chosen by the payload's `action` field:
/// `fail`, `fail-blank`, `panic`, `progress`, or anything else to succeed.
pub struct ScriptedProcessor;

#[async_trait]
impl JobProcessor for ScriptedProcessor {
    async fn process(&self, ctx: &JobContext, job: &ClaimedJob) -> Result<(), ProcessError> {
        match job.request.payload["action"].as_str() {
            Some("fail") => Err(ProcessError::failed("payload rejected")),
            Some("fail-blank") => Err(ProcessError::failed("  ")),
            Some("panic") => panic!("processor exploded"),
            Some("progress") => {
                ctx.progress("halfway there").await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
