//! Dependency-aware stack deployment.
//!
//! Each manifest entry is deployed at most once per run: external dependencies
//! are waited for, managed dependencies are deployed first, then the entry's own
//! template is rendered and created or updated.

use async_recursion::async_recursion;
use serde_json::Value;
use stackweave_config::MacroEvaluator;
use stackweave_core::poll::{DEFAULT_DELAY, poll_until_terminal};
use stackweave_core::provisioner::{Capability, StackRequest, TemplateSource};
use stackweave_core::{
    Manifest, ProvisionerError, RetryPolicy, StackProvisioner, StackStatus, TemplateBucket,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::run::{DeploymentRun, Visit};
use crate::{DeployError, DeployResult};

/// Knobs for a deployment.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Delay between two status polls. Waits themselves never give up.
    pub poll_delay: Duration,
    /// Capabilities granted to every create and update.
    pub capabilities: Vec<Capability>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            poll_delay: DEFAULT_DELAY,
            capabilities: vec![Capability::Iam],
        }
    }
}

/// Deploys the stacks of a resolved configuration.
pub struct StackDeployer {
    manifest: Manifest,
    /// Template inputs are relative to this directory.
    config_dir: PathBuf,
    evaluator: MacroEvaluator,
    bucket: Option<TemplateBucket>,
    options: DeployOptions,
}

impl StackDeployer {
    /// Create a deployer for a resolved configuration.
    ///
    /// Fails before anything is deployed if the `deploy` section is malformed.
    pub fn new(
        config: Arc<Value>,
        config_dir: impl Into<PathBuf>,
        evaluator: MacroEvaluator,
        options: DeployOptions,
    ) -> DeployResult<Self> {
        let manifest = Manifest::from_config(&config)?;
        let bucket = manifest.template_bucket()?;
        Ok(Self {
            manifest,
            config_dir: config_dir.into(),
            evaluator: evaluator.with_config(config),
            bucket,
            options,
        })
    }

    /// Deploy one stack and its dependencies.
    pub async fn deploy(&self, name: &str) -> DeployResult<()> {
        self.run(&[name]).await
    }

    /// Deploy every stack in manifest order.
    pub async fn deploy_all(&self) -> DeployResult<()> {
        let names: Vec<&str> = self.manifest.names().collect();
        self.run(&names).await
    }

    async fn run(&self, names: &[&str]) -> DeployResult<()> {
        let mut run = DeploymentRun::new()?;
        info!(
            provisioner = self.provisioner().name(),
            stacks = names.len(),
            "Starting deployment run"
        );
        debug!(scratch = %run.scratch_dir().display(), "Scratch directory ready");

        for name in names {
            // Dropping the run on error removes the scratch directory.
            self.deploy_stack(&mut run, name).await?;
        }

        run.close()?;
        Ok(())
    }

    #[async_recursion]
    async fn deploy_stack(&self, run: &mut DeploymentRun, name: &str) -> DeployResult<()> {
        let definition = self
            .manifest
            .get(name)
            .ok_or_else(|| DeployError::UnknownStack(name.to_string()))?;

        match run.enter(name) {
            Visit::First => {}
            Visit::Finished => {
                debug!(stack = %name, "Already deployed in this run");
                return Ok(());
            }
            Visit::Cycle(path) => return Err(DeployError::DependencyCycle(path)),
        }

        for external in &definition.ext_deps {
            info!(stack = %name, dependency = %external, "Waiting for external stack");
            self.wait(external, None, StackStatus::is_complete, StackStatus::is_failed)
                .await?;
        }

        for dependency in &definition.deps {
            self.deploy_stack(run, dependency).await?;
        }

        if let Some((input, stack_name)) = definition.template() {
            let template = self.render(run, input, stack_name).await?;
            self.provision(stack_name, template).await?;
        }

        run.leave(name);
        Ok(())
    }

    /// Render a stack template into the scratch directory and decide how the
    /// provisioner receives it.
    async fn render(
        &self,
        run: &DeploymentRun,
        input: &str,
        stack_name: &str,
    ) -> DeployResult<TemplateSource> {
        let template_path = self.config_dir.join(input);
        info!(stack = %stack_name, template = %template_path.display(), "Generating stack");

        let rendered = self
            .evaluator
            .resolve_file(&template_path)
            .await
            .map_err(|source| DeployError::Render {
                stack: stack_name.to_string(),
                source,
            })?;
        let body = serde_json::to_string(&rendered)?;

        let scratch = run.template_path(stack_name);
        tokio::fs::write(&scratch, &body).await?;

        let Some(bucket) = &self.bucket else {
            return Ok(TemplateSource::Body(body));
        };

        let key = bucket.key_for(stack_name);
        info!(stack = %stack_name, bucket = %bucket.bucket, key = %key, "Uploading template");
        self.provisioner()
            .upload(&scratch, &bucket.bucket, &key)
            .await?;
        Ok(TemplateSource::Url(bucket.url_for(&key)))
    }

    async fn provision(&self, stack_name: &str, template: TemplateSource) -> DeployResult<()> {
        let request = StackRequest {
            name: stack_name.to_string(),
            template,
            capabilities: self.options.capabilities.clone(),
        };

        debug!(stack = %stack_name, "Getting current stack status");
        match self.provisioner().describe_stack(stack_name).await? {
            None => {
                info!(stack = %stack_name, "Creating stack");
                self.provisioner().create_stack(&request).await?;
            }
            Some(current) => {
                self.wait(
                    stack_name,
                    Some(current),
                    StackStatus::is_complete,
                    StackStatus::is_failed,
                )
                .await?;

                info!(stack = %stack_name, "Updating stack");
                match self.provisioner().update_stack(&request).await {
                    Ok(()) => {}
                    Err(e) if e.is_no_updates() => {
                        info!(stack = %stack_name, "Stack is already up to date");
                    }
                    Err(e) => {
                        error!(stack = %stack_name, error = %e, "Update failed");
                        return Err(e.into());
                    }
                }
            }
        }

        let status = self
            .wait(stack_name, None, StackStatus::is_deployed, |status| {
                status.is_terminal() && !status.is_deployed()
            })
            .await?;
        info!(stack = %stack_name, %status, "Stack deployed");
        Ok(())
    }

    /// Wait without limit for a stack to settle.
    async fn wait(
        &self,
        stack_name: &str,
        cached: Option<StackStatus>,
        is_complete: fn(&StackStatus) -> bool,
        is_failed: fn(&StackStatus) -> bool,
    ) -> DeployResult<StackStatus> {
        let policy = RetryPolicy::unbounded(self.options.poll_delay);
        let status = poll_until_terminal(
            &policy,
            stack_name,
            cached,
            || self.status_of(stack_name),
            is_complete,
            is_failed,
        )
        .await?;
        Ok(status)
    }

    async fn status_of(&self, stack_name: &str) -> stackweave_core::Result<StackStatus> {
        self.provisioner()
            .describe_stack(stack_name)
            .await?
            .ok_or_else(|| ProvisionerError::NotFound(format!("stack '{stack_name}'")).into())
    }

    fn provisioner(&self) -> &dyn StackProvisioner {
        self.evaluator.services().provisioner.as_ref()
    }
}
