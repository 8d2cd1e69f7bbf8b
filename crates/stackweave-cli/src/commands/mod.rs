//! CLI command implementations.

pub mod deploy;
pub mod generate;

use anyhow::{Context, Result};
use serde_json::Value;
use stackweave_config::{ConfigResolver, MacroEvaluator, Services};
use stackweave_core::RetryPolicy;
use stackweave_core::poll::DEFAULT_DELAY;
use stackweave_deployer::{AwsCli, Make};
use std::path::Path;
use std::sync::Arc;

/// Settings shared by every command.
pub struct Settings {
    pub retry: i64,
    pub max_passes: usize,
}

impl Settings {
    /// An evaluator wired to the `aws` and `make` command-line tools.
    pub fn evaluator(&self) -> MacroEvaluator {
        let aws = Arc::new(AwsCli::new());
        let services = Services {
            provisioner: aws.clone(),
            instances: aws,
            build_tool: Arc::new(Make::new()),
        };
        MacroEvaluator::new(services).with_retry(RetryPolicy::new(self.retry, DEFAULT_DELAY))
    }

    /// Resolve the configuration at `path` to its fixpoint.
    pub async fn resolve_config(&self, evaluator: &MacroEvaluator, path: &Path) -> Result<Value> {
        ConfigResolver::new(evaluator.clone())
            .with_max_passes(self.max_passes)
            .resolve(path)
            .await
            .context("Error on processing config file")
    }
}
