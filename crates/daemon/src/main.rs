//! MessageDelivery - Main Entry Point
//! Reconciliation loop + per-queue monitors over SQS and ECS

mod settings;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use msgdelivery_core::application::{cancel_scope, ControllerContext, Reconciler};
use msgdelivery_core::VERSION;
use msgdelivery_infra_aws::{load_aws_config, EcsOrchestrator, SqsQueueService};
use settings::EnvSettings;

const DEFAULT_LOG_FILTER: &str =
    "msgdelivery_daemon=info,msgdelivery_core=info,msgdelivery_infra_aws=info";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging() -> Result<()> {
    let log_format = std::env::var("MD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    init_logging()?;
    info!("MessageDelivery v{} starting...", VERSION);

    // 2. Load configuration (any error is fatal)
    let env = EnvSettings::load()?;
    let settings = env.controller_settings()?;
    let aws_settings = env.aws_settings()?;

    info!(
        cluster = %settings.cluster,
        task_definition = %settings.task_definition,
        launch_type = %settings.launch_type,
        message_threshold = settings.message_threshold,
        queue_prefix = %settings.queue_prefix,
        skip_tag = %settings.skip_tag,
        overrides = settings.container_override.is_some(),
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let sdk_config = load_aws_config(&aws_settings).await;
    let queues = Arc::new(SqsQueueService::new(&sdk_config));
    let orchestrator = Arc::new(EcsOrchestrator::new(&sdk_config));
    let ctx = ControllerContext::new(queues, orchestrator, settings);

    // 4. Start the reconciliation loop
    let (shutdown_scope, shutdown_token) = cancel_scope();
    let reconciler = Reconciler::new(ctx);
    let reconciler_handle = tokio::spawn(async move {
        reconciler.run(shutdown_token).await;
    });

    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping monitors...");

    // 6. Graceful shutdown; tasks already launched keep running
    shutdown_scope.cancel();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, reconciler_handle)
        .await
        .is_err()
    {
        warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Reconciliation loop did not stop in time"
        );
    }

    info!("Shutdown complete.");
    Ok(())
}
