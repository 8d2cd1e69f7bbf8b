//! Stack deployment command.

use anyhow::{Context, Result};
use stackweave_config::document::base_dir;
use stackweave_deployer::{DeployOptions, StackDeployer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::Settings;

/// Resolve `config_path` and deploy `stack`, or every stack when `None`.
pub async fn run(
    settings: &Settings,
    config_path: &Path,
    stack: Option<&str>,
    poll_delay: Duration,
) -> Result<()> {
    let evaluator = settings.evaluator();
    let config = settings.resolve_config(&evaluator, config_path).await?;

    let options = DeployOptions {
        poll_delay,
        ..DeployOptions::default()
    };
    let deployer = StackDeployer::new(Arc::new(config), base_dir(config_path), evaluator, options)
        .with_context(|| format!("Invalid deploy section in {}", config_path.display()))?;

    match stack {
        Some(name) => deployer
            .deploy(name)
            .await
            .with_context(|| format!("Failed to deploy stack '{name}'"))?,
        None => deployer
            .deploy_all()
            .await
            .context("Failed to deploy stacks")?,
    }

    info!("Deployment finished");
    Ok(())
}
