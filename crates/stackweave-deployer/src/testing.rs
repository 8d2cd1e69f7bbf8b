//! In-memory provisioning backend for deployer tests.

use async_trait::async_trait;
use stackweave_config::Services;
use stackweave_core::provisioner::{BuildStatus, InstanceAddresses, StackRequest, StackResource};
use stackweave_core::{BuildTool, InstanceInspector, ProvisionerError, StackProvisioner, StackStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A state-changing call made against the fake.
#[derive(Debug, Clone)]
pub enum Call {
    Create(StackRequest),
    Update(StackRequest),
    Upload {
        local: PathBuf,
        bucket: String,
        key: String,
    },
}

/// Stacks settle immediately: a create leaves `CREATE_COMPLETE`, an update
/// leaves `UPDATE_COMPLETE`, unless overridden with [`FakeCloud::settle_as`].
#[derive(Default)]
pub struct FakeCloud {
    statuses: Mutex<HashMap<String, String>>,
    outcomes: Mutex<HashMap<String, String>>,
    rejections: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeCloud {
    pub fn set_status(&self, stack: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(stack.to_string(), status.to_string());
    }

    /// Status a stack ends in after a create or update.
    pub fn settle_as(&self, stack: &str, status: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(stack.to_string(), status.to_string());
    }

    /// Reject every update of `stack` with `message`.
    pub fn reject_updates(&self, stack: &str, message: &str) {
        self.rejections
            .lock()
            .unwrap()
            .insert(stack.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of created stacks, in creation order.
    pub fn created(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(request) => Some(request.name),
                _ => None,
            })
            .collect()
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            provisioner: self.clone(),
            instances: self.clone(),
            build_tool: Arc::new(NoBuild),
        }
    }

    fn settle(&self, stack: &str, default: &str) {
        let status = self
            .outcomes
            .lock()
            .unwrap()
            .get(stack)
            .cloned()
            .unwrap_or_else(|| default.to_string());
        self.set_status(stack, &status);
    }
}

#[async_trait]
impl StackProvisioner for FakeCloud {
    fn name(&self) -> &'static str {
        "fake-cloud"
    }

    async fn describe_stack(&self, name: &str) -> Result<Option<StackStatus>, ProvisionerError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(name)
            .map(|status| StackStatus::from(status.as_str())))
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<(), ProvisionerError> {
        self.calls.lock().unwrap().push(Call::Create(request.clone()));
        self.settle(&request.name, "CREATE_COMPLETE");
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<(), ProvisionerError> {
        self.calls.lock().unwrap().push(Call::Update(request.clone()));
        if let Some(message) = self.rejections.lock().unwrap().get(&request.name) {
            return Err(ProvisionerError::rejected("update-stack", message.clone()));
        }
        self.settle(&request.name, "UPDATE_COMPLETE");
        Ok(())
    }

    async fn describe_stack_resource(
        &self,
        stack: &str,
        logical_id: &str,
    ) -> Result<StackResource, ProvisionerError> {
        Err(ProvisionerError::NotFound(format!(
            "resource '{logical_id}' in stack '{stack}'"
        )))
    }

    async fn upload(&self, local: &Path, bucket: &str, key: &str) -> Result<(), ProvisionerError> {
        assert!(local.exists(), "uploaded file {} is missing", local.display());
        self.calls.lock().unwrap().push(Call::Upload {
            local: local.to_path_buf(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl InstanceInspector for FakeCloud {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<InstanceAddresses, ProvisionerError> {
        Err(ProvisionerError::NotFound(format!("instance '{instance_id}'")))
    }
}

struct NoBuild;

#[async_trait]
impl BuildTool for NoBuild {
    async fn build(&self, _dir: &Path, _target: &str) -> Result<BuildStatus, ProvisionerError> {
        Ok(BuildStatus {
            success: false,
            code: None,
        })
    }
}
