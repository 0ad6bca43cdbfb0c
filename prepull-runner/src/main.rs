//! Prepull Runner
//!
//! A container entrypoint that authenticates against a registry backend,
//! pulls a single image, then holds the process open so the hosting
//! container stays alive.
//!
//! Architecture:
//! - Configuration: Load the pull request record from the environment
//! - CLI wrappers: docker and gcloud invocations with captured output
//! - Runner: the sequential fetch routine and the indefinite hold
//!
//! Every failure is fatal and immediate: a missing variable, an
//! unavailable tool, a rejected login, or a failed pull all terminate
//! the process with a non-zero status and no retry.

mod docker;
mod exec;
mod gcloud;
mod keyfile;
mod runner;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prepull_core::config::PullConfig;

use crate::runner::FetchRunner;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prepull_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Prepull Runner");

    // Load configuration
    let config = PullConfig::from_env().context("Failed to load pull configuration")?;
    info!(
        "Loaded configuration: image_type={}, image={}",
        config.image_type(),
        config.image
    );

    // Fetch, then hold; run() only ever returns on failure
    let runner = FetchRunner::new(config);
    runner.run().await.context("Image fetch failed")?;

    Ok(())
}
