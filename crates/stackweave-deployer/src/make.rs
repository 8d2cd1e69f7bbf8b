//! Build tool backed by `make`.

use async_trait::async_trait;
use stackweave_core::provisioner::BuildStatus;
use stackweave_core::{BuildTool, ProvisionerError};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct Make {
    program: String,
}

impl Default for Make {
    fn default() -> Self {
        Self::new()
    }
}

impl Make {
    /// Use the binary named by `STACKWEAVE_MAKE_BIN`, or `make`.
    pub fn new() -> Self {
        let program = std::env::var("STACKWEAVE_MAKE_BIN").unwrap_or_else(|_| "make".to_string());
        Self { program }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl BuildTool for Make {
    async fn build(&self, dir: &Path, target: &str) -> Result<BuildStatus, ProvisionerError> {
        info!(dir = %dir.display(), target, "Running make");

        let output = Command::new(&self.program)
            .arg(target)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ProvisionerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = BuildStatus {
            success: output.status.success(),
            code: output.status.code(),
        };
        if status.success {
            debug!(output = %String::from_utf8_lossy(&output.stdout), "Make succeeded");
        } else {
            warn!(
                code = ?status.code,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Make failed"
            );
        }
        Ok(status)
    }
}
