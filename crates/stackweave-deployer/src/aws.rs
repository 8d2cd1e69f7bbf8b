//! Provisioning backend that drives the `aws` command-line tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stackweave_core::provisioner::{InstanceAddresses, StackRequest, StackResource, TemplateSource};
use stackweave_core::{InstanceInspector, ProvisionerError, StackProvisioner, StackStatus};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

/// Error text the CLI reports when describing a stack that does not exist.
const MISSING_STACK: &str = "does not exist";

/// Stack provisioner and instance inspector backed by the `aws` CLI.
///
/// Credentials and region come from the CLI's own environment.
pub struct AwsCli {
    program: String,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCli {
    /// Use the binary named by `STACKWEAVE_AWS_BIN`, or `aws`.
    pub fn new() -> Self {
        let program = std::env::var("STACKWEAVE_AWS_BIN").unwrap_or_else(|_| "aws".to_string());
        Self { program }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run one CLI operation and return its standard output.
    async fn run(&self, operation: &str, args: &[String]) -> Result<String, ProvisionerError> {
        debug!(program = %self.program, operation, "Running aws");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ProvisionerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ProvisionerError::rejected(operation, stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl StackProvisioner for AwsCli {
    fn name(&self) -> &'static str {
        "aws-cli"
    }

    async fn describe_stack(&self, name: &str) -> Result<Option<StackStatus>, ProvisionerError> {
        let args = command(&["cloudformation", "describe-stacks", "--stack-name", name]);
        match self.run("describe-stacks", &args).await {
            Ok(stdout) => parse_stack_status(&stdout).map(Some),
            Err(ProvisionerError::Rejected { message, .. }) if message.contains(MISSING_STACK) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<(), ProvisionerError> {
        let args = stack_args("create-stack", request);
        self.run("create-stack", &args).await.map(drop)
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<(), ProvisionerError> {
        let args = stack_args("update-stack", request);
        self.run("update-stack", &args).await.map(drop)
    }

    async fn describe_stack_resource(
        &self,
        stack: &str,
        logical_id: &str,
    ) -> Result<StackResource, ProvisionerError> {
        let args = command(&[
            "cloudformation",
            "describe-stack-resource",
            "--stack-name",
            stack,
            "--logical-resource-id",
            logical_id,
        ]);
        let stdout = self.run("describe-stack-resource", &args).await?;
        parse_stack_resource(&stdout)
    }

    async fn upload(&self, local: &Path, bucket: &str, key: &str) -> Result<(), ProvisionerError> {
        let local = local.display().to_string();
        let target = format!("s3://{bucket}/{key}");
        let args = command(&["s3", "cp", "--only-show-errors", local.as_str(), target.as_str()]);
        self.run("s3-cp", &args).await.map_err(|e| {
            error!(error = %e, target = %target, "Upload failed");
            e
        })?;
        Ok(())
    }
}

#[async_trait]
impl InstanceInspector for AwsCli {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<InstanceAddresses, ProvisionerError> {
        let args = command(&["ec2", "describe-instances", "--instance-ids", instance_id]);
        let stdout = self.run("describe-instances", &args).await?;
        parse_instance(&stdout, instance_id)
    }
}

fn command(args: &[&str]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.to_string())
        .chain(["--output".to_string(), "json".to_string()])
        .collect()
}

/// Arguments of a create or update call.
fn stack_args(operation: &str, request: &StackRequest) -> Vec<String> {
    let (flag, template) = match &request.template {
        TemplateSource::Body(body) => ("--template-body", body.as_str()),
        TemplateSource::Url(url) => ("--template-url", url.as_str()),
    };
    let mut args = command(&[
        "cloudformation",
        operation,
        "--stack-name",
        request.name.as_str(),
        flag,
        template,
    ]);
    if !request.capabilities.is_empty() {
        args.push("--capabilities".to_string());
        args.extend(request.capabilities.iter().map(|c| c.as_str().to_string()));
    }
    args
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacks {
    stacks: Vec<StackSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackSummary {
    stack_status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStackResource {
    stack_resource_detail: ResourceDetail,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceDetail {
    resource_status: String,
    #[serde(default)]
    physical_resource_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    #[serde(default)]
    public_ip_address: Option<String>,
    #[serde(default)]
    private_ip_address: Option<String>,
}

fn decode<T: DeserializeOwned>(operation: &str, stdout: &str) -> Result<T, ProvisionerError> {
    serde_json::from_str(stdout).map_err(|e| ProvisionerError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

fn parse_stack_status(stdout: &str) -> Result<StackStatus, ProvisionerError> {
    let response: DescribeStacks = decode("describe-stacks", stdout)?;
    response
        .stacks
        .into_iter()
        .next()
        .map(|stack| StackStatus::new(stack.stack_status))
        .ok_or_else(|| ProvisionerError::Decode {
            operation: "describe-stacks".to_string(),
            message: "no stacks in response".to_string(),
        })
}

fn parse_stack_resource(stdout: &str) -> Result<StackResource, ProvisionerError> {
    let response: DescribeStackResource = decode("describe-stack-resource", stdout)?;
    let detail = response.stack_resource_detail;
    Ok(StackResource {
        status: detail.resource_status,
        physical_id: detail.physical_resource_id,
    })
}

fn parse_instance(stdout: &str, instance_id: &str) -> Result<InstanceAddresses, ProvisionerError> {
    let response: DescribeInstances = decode("describe-instances", stdout)?;
    let instance = response
        .reservations
        .into_iter()
        .flat_map(|reservation| reservation.instances)
        .next()
        .ok_or_else(|| ProvisionerError::NotFound(format!("instance '{instance_id}'")))?;
    Ok(InstanceAddresses {
        public_ip: instance.public_ip_address,
        private_ip: instance.private_ip_address,
    })
}
