//! NameSeek Enrich (nameseek-enrich) - Main entry point
//!
//! Runs one bulk enrichment over a base dataset and prints the run summary.
//! Ctrl+C / SIGTERM cancel the run; progress already checkpointed is kept
//! and the next invocation with the same parameters resumes from it.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use nameseek_common::events::{EnrichEvent, EventBus};
use nameseek_enrich::config::{build_run_configuration, resolve_provider_key, CliArgs};
use nameseek_enrich::orchestrator::policy::RatePolicy;
use nameseek_enrich::services::build_adapter;
use nameseek_enrich::EnrichmentRun;
use tokio::signal;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Bootstrap config (defaults when no file is present)
    let toml_config = nameseek_common::config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing: RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("nameseek_enrich={0},nameseek_common={0}", toml_config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting NameSeek enrichment v{}", env!("CARGO_PKG_VERSION"));

    let config = build_run_configuration(&args, &toml_config);
    let policy = config.validate().context("Invalid run configuration")?;
    let api_key = resolve_provider_key(config.provider, &toml_config)?;
    let adapter = build_adapter(config.provider, &config.model, api_key, policy.request_timeout)
        .context("Failed to initialize provider adapter")?;

    log_policy(&policy);

    let events = EventBus::default();
    let progress = tokio::spawn(log_progress(events.subscribe()));

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let run = EnrichmentRun::new(config, adapter)
        .with_event_bus(events)
        .with_cancel_token(cancel);

    let result = run.execute().await;
    // The run owned the last sender; the logger drains and exits
    let _ = progress.await;
    let summary = result.context("Enrichment run aborted")?;

    println!("{}", summary);

    if summary.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn log_policy(policy: &RatePolicy) {
    info!(
        provider = %policy.provider,
        tier = %policy.tier,
        max_concurrent = policy.max_concurrent,
        requests_per_minute = policy.requests_per_minute,
        timeout_s = policy.request_timeout.as_secs(),
        "Rate policy resolved"
    );
}

/// Log progress events until the bus is dropped
async fn log_progress(mut rx: Receiver<EnrichEvent>) {
    loop {
        match rx.recv().await {
            Ok(EnrichEvent::TaskCompleted {
                name,
                succeeded,
                completed,
                total,
                ..
            }) => {
                info!(
                    "[{}/{}] {} {}",
                    completed,
                    total,
                    name,
                    if succeeded { "done" } else { "failed" }
                );
            }
            Ok(EnrichEvent::RunCancelling { in_flight, .. }) => {
                warn!("Cancelling: waiting for {} in-flight request(s)", in_flight);
            }
            Ok(event) => debug!(?event, "Enrichment event"),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Progress logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn cancel_on_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling run");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling run");
        },
    }
    cancel.cancel();
}
