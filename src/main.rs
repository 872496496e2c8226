//! Meta Bank server
//!
//! ```text
//! config/{env}.yaml ──▶ logging ──▶ store (PostgreSQL | in-memory)
//!                                     │
//!                      ┌──────────────┴──────────────┐
//!                      ▼                             ▼
//!               HTTP gateway ── tasks ──▶ verify-email processor
//! ```
//!
//! Usage: `meta_bank [--env <name>]` (default `dev`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use meta_bank::auth::JwtMaker;
use meta_bank::config::AppConfig;
use meta_bank::db::Database;
use meta_bank::gateway::{run_server, state::AppState};
use meta_bank::ledger::LedgerService;
use meta_bank::logging::init_logging;
use meta_bank::mail::LogEmailSender;
use meta_bank::store::{PgStore, Store};
use meta_bank::users::UserService;
use meta_bank::worker::{ProcessorConfig, TaskProcessor, task_queue};

const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--env" && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);

    info!(env = %env, git_hash = env!("GIT_HASH"), "Starting meta_bank");

    let token_maker = Arc::new(
        JwtMaker::new(&config.token.symmetric_key).context("Invalid token.symmetric_key")?,
    );

    match config.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.bootstrap_schema()
                .await
                .context("Failed to bootstrap schema")?;
            serve(PgStore::new(db.into_pool()), &config, token_maker).await
        }
        None => serve_in_memory(&config, token_maker).await,
    }
}

#[cfg(feature = "mem-store")]
async fn serve_in_memory(config: &AppConfig, token_maker: Arc<JwtMaker>) -> anyhow::Result<()> {
    warn!("postgres_url not set, running on the in-memory store (data is not persisted)");
    serve(meta_bank::store::MemStore::new(), config, token_maker).await
}

#[cfg(not(feature = "mem-store"))]
async fn serve_in_memory(_config: &AppConfig, _token_maker: Arc<JwtMaker>) -> anyhow::Result<()> {
    anyhow::bail!("postgres_url is required when built without the mem-store feature")
}

async fn serve<S: Store>(
    store: S,
    config: &AppConfig,
    token_maker: Arc<JwtMaker>,
) -> anyhow::Result<()> {
    let store = Arc::new(store);

    let (distributor, receiver) = task_queue(config.worker.queue_size);
    let processor = Arc::new(TaskProcessor::new(
        store.clone(),
        Arc::new(LogEmailSender::new(config.mail.from.clone())),
        ProcessorConfig {
            max_retry: config.worker.max_retry,
            base_url: config.mail.base_url.clone(),
            ..Default::default()
        },
    ));
    let worker = tokio::spawn(processor.run(receiver));

    let users = UserService::new(
        store.clone(),
        token_maker.clone(),
        distributor,
        chrono::Duration::seconds(config.token.access_token_duration_secs),
    );
    let state = Arc::new(AppState::new(
        LedgerService::new(store),
        users,
        token_maker,
    ));

    // Dropping the router's state closes the task queue.
    run_server(&config.gateway, state).await?;

    info!("Waiting for in-flight tasks");
    if tokio::time::timeout(TASK_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Task processor did not stop within {:?}", TASK_DRAIN_TIMEOUT);
    }
    Ok(())
}
