//! Capability traits for everything stackweave does outside the process.
//!
//! Provisioners drive the remote stack API, inspectors answer instance address
//! lookups and build tools produce artifacts on the local machine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ProvisionerError;
use crate::stack::StackStatus;

/// Where the provisioning API reads a template from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSource {
    /// The rendered template, sent inline.
    Body(String),
    /// A URL the provisioning API fetches the template from.
    Url(String),
}

/// Capabilities acknowledged when creating or updating a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    Iam,
    NamedIam,
    AutoExpand,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
            Capability::AutoExpand => "CAPABILITY_AUTO_EXPAND",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A create or update request for one stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    /// Deployed stack name.
    pub name: String,
    /// Template body or URL.
    pub template: TemplateSource,
    /// Capabilities granted to the operation.
    pub capabilities: Vec<Capability>,
}

/// A single resource inside a remote stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResource {
    pub status: String,
    pub physical_id: Option<String>,
}

impl StackResource {
    /// Whether the resource finished creating or updating.
    pub fn is_ready(&self) -> bool {
        matches!(self.status.as_str(), "CREATE_COMPLETE" | "UPDATE_COMPLETE")
    }
}

/// Network addresses of a compute instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAddresses {
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
}

/// Outcome of a local build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStatus {
    pub success: bool,
    pub code: Option<i32>,
}

/// Trait for the remote stack provisioning API.
#[async_trait]
pub trait StackProvisioner: Send + Sync {
    /// Name of this provisioner.
    fn name(&self) -> &'static str;

    /// Current status of a stack, or `None` if no stack with that name exists.
    async fn describe_stack(&self, name: &str) -> Result<Option<StackStatus>, ProvisionerError>;

    /// Start creating a stack.
    async fn create_stack(&self, request: &StackRequest) -> Result<(), ProvisionerError>;

    /// Start updating a stack.
    ///
    /// A stack that is already up to date is reported as a rejection whose
    /// message carries the provider's "no updates" reason.
    async fn update_stack(&self, request: &StackRequest) -> Result<(), ProvisionerError>;

    /// Look up one resource of a stack by its logical id.
    async fn describe_stack_resource(
        &self,
        stack: &str,
        logical_id: &str,
    ) -> Result<StackResource, ProvisionerError>;

    /// Upload a local file to object storage.
    async fn upload(&self, local: &Path, bucket: &str, key: &str) -> Result<(), ProvisionerError>;
}

/// Trait for compute instance lookups.
#[async_trait]
pub trait InstanceInspector: Send + Sync {
    async fn describe_instance(&self, instance_id: &str)
    -> Result<InstanceAddresses, ProvisionerError>;
}

/// Trait for the local build tool.
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Build `target` inside `dir`.
    async fn build(&self, dir: &Path, target: &str) -> Result<BuildStatus, ProvisionerError>;
}
