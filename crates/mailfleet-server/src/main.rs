//! Mailfleet - Campaign dispatch service entry point

use anyhow::Result;
use mailfleet_common::config::Config;
use mailfleet_dispatch::{
    CampaignScheduler, Dispatcher, PlaintextCredentials, SmtpSessionFactory,
};
use mailfleet_storage::db::DatabasePool;
use mailfleet_storage::repository::{
    AccountRepository, CampaignRepository, DeliveryLogRepository, RecipientRepository,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config);

    info!("Starting Mailfleet dispatch service...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Shared cancellation for in-flight dispatch runs and the scheduler
    let cancel = CancellationToken::new();

    // Build the dispatch pipeline
    let sessions = Arc::new(SmtpSessionFactory::new(
        config.smtp.clone(),
        Arc::new(PlaintextCredentials),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(CampaignRepository::new(db_pool.clone())),
        Arc::new(AccountRepository::new(db_pool.clone())),
        Arc::new(RecipientRepository::new(db_pool.clone())),
        Arc::new(DeliveryLogRepository::new(db_pool.clone())),
        sessions,
        &config.dispatch,
        cancel.clone(),
    ));

    // Resume campaigns a previous process left in `sending`
    let resumed = dispatcher.resume_interrupted().await?;
    if !resumed.is_empty() {
        info!(campaigns = resumed.len(), "resumed interrupted dispatch runs");
    }

    // Start the scheduled campaign promoter
    let scheduler = CampaignScheduler::new(dispatcher.clone(), &config.scheduler, cancel.clone());
    let scheduler_handle = tokio::spawn(scheduler.run());

    info!("Mailfleet dispatch service started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // In-flight dispatch runs stop at their next pacing point and
    // reconcile their campaigns before exiting
    cancel.cancel();
    let _ = scheduler_handle.await;

    info!("Mailfleet dispatch service shutdown complete");

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone()));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_level(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}
