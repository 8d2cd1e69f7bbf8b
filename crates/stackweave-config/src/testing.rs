//! In-memory capability doubles shared by the evaluator and resolver tests.

use async_trait::async_trait;
use stackweave_core::ProvisionerError;
use stackweave_core::provisioner::{
    BuildStatus, InstanceAddresses, StackRequest, StackResource,
};
use stackweave_core::{BuildTool, InstanceInspector, StackProvisioner, StackStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::Services;

#[derive(Default)]
pub struct FakeProvisioner {
    resources: Mutex<HashMap<(String, String), StackResource>>,
    pub resource_calls: AtomicUsize,
}

impl FakeProvisioner {
    pub fn add_resource(&self, stack: &str, logical_id: &str, status: &str, physical_id: &str) {
        self.resources.lock().unwrap().insert(
            (stack.to_string(), logical_id.to_string()),
            StackResource {
                status: status.to_string(),
                physical_id: Some(physical_id.to_string()),
            },
        );
    }
}

#[async_trait]
impl StackProvisioner for FakeProvisioner {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn describe_stack(&self, _name: &str) -> Result<Option<StackStatus>, ProvisionerError> {
        Ok(None)
    }

    async fn create_stack(&self, _request: &StackRequest) -> Result<(), ProvisionerError> {
        Ok(())
    }

    async fn update_stack(&self, _request: &StackRequest) -> Result<(), ProvisionerError> {
        Ok(())
    }

    async fn describe_stack_resource(
        &self,
        stack: &str,
        logical_id: &str,
    ) -> Result<StackResource, ProvisionerError> {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        self.resources
            .lock()
            .unwrap()
            .get(&(stack.to_string(), logical_id.to_string()))
            .cloned()
            .ok_or_else(|| ProvisionerError::NotFound(format!("resource '{logical_id}'")))
    }

    async fn upload(&self, _local: &Path, _bucket: &str, _key: &str) -> Result<(), ProvisionerError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeInstances {
    instances: Mutex<HashMap<String, InstanceAddresses>>,
}

impl FakeInstances {
    pub fn add(&self, instance_id: &str, addresses: InstanceAddresses) {
        self.instances
            .lock()
            .unwrap()
            .insert(instance_id.to_string(), addresses);
    }
}

#[async_trait]
impl InstanceInspector for FakeInstances {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<InstanceAddresses, ProvisionerError> {
        self.instances
            .lock()
            .unwrap()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| ProvisionerError::NotFound(format!("instance '{instance_id}'")))
    }
}

/// Writes `output` to the target file on success.
pub struct FakeBuildTool {
    output: Option<Vec<u8>>,
    pub builds: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeBuildTool {
    pub fn succeeding(output: &[u8]) -> Self {
        Self {
            output: Some(output.to_vec()),
            builds: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            output: None,
            builds: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BuildTool for FakeBuildTool {
    async fn build(&self, dir: &Path, target: &str) -> Result<BuildStatus, ProvisionerError> {
        self.builds
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), target.to_string()));
        match &self.output {
            Some(output) => {
                std::fs::write(dir.join(target), output).map_err(|source| {
                    ProvisionerError::Spawn {
                        program: "make".to_string(),
                        source,
                    }
                })?;
                Ok(BuildStatus {
                    success: true,
                    code: Some(0),
                })
            }
            None => Ok(BuildStatus {
                success: false,
                code: Some(2),
            }),
        }
    }
}

pub fn services(provisioner: impl Into<Arc<FakeProvisioner>>) -> Services {
    Services {
        provisioner: provisioner.into(),
        instances: Arc::new(FakeInstances::default()),
        build_tool: Arc::new(FakeBuildTool::failing()),
    }
}
