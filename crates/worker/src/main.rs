//! Push delivery worker.
//!
//! Long-running binary that owns the off-request-path half of the push
//! pipeline: the due-job scheduler and the terminal-job retention sweep.
//! Event ingestion happens in the web application through
//! `quillcast_push::Coalescer`; this process only delivers.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quillcast_push::{retention, Scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quillcast_worker=debug,quillcast_push=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = quillcast_db::create_pool(&database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!("../../db/migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let cancel = CancellationToken::new();

    let scheduler = Scheduler::web_push(pool.clone());
    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));
    let retention_task = tokio::spawn(retention::run(pool.clone(), cancel.clone()));

    tracing::info!("Push worker started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    cancel.cancel();
    let _ = scheduler_task.await;
    let _ = retention_task.await;

    tracing::info!("Push worker stopped");
    Ok(())
}
