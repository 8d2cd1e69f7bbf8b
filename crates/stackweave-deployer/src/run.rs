//! Run-scoped deployment state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Result of entering a stack during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    /// First time this run sees the stack.
    First,
    /// Already deployed by this run.
    Finished,
    /// Reached again while its own dependencies are still being deployed.
    Cycle(Vec<String>),
}

/// State of one deployment run: the stacks it has visited and a scratch
/// directory for rendered templates.
///
/// The scratch directory is removed when the run is dropped, whichever way the
/// run ends.
pub struct DeploymentRun {
    visited: HashSet<String>,
    active: Vec<String>,
    scratch: TempDir,
}

impl DeploymentRun {
    pub fn new() -> std::io::Result<Self> {
        let scratch = tempfile::Builder::new().prefix("stackweave-").tempdir()?;
        Ok(Self {
            visited: HashSet::new(),
            active: Vec::new(),
            scratch,
        })
    }

    /// Mark a stack as visited, or report why it must not be deployed again.
    pub fn enter(&mut self, name: &str) -> Visit {
        if let Some(position) = self.active.iter().position(|active| active == name) {
            let mut path = self.active[position..].to_vec();
            path.push(name.to_string());
            return Visit::Cycle(path);
        }
        if !self.visited.insert(name.to_string()) {
            return Visit::Finished;
        }
        self.active.push(name.to_string());
        Visit::First
    }

    /// Mark the most recently entered stack as finished.
    pub fn leave(&mut self, name: &str) {
        debug_assert_eq!(self.active.last().map(String::as_str), Some(name));
        self.active.pop();
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Path of the scratch file holding a stack's rendered template.
    pub fn template_path(&self, stack_name: &str) -> PathBuf {
        self.scratch.path().join(format!("stack-{stack_name}.json"))
    }

    /// Remove the scratch directory, reporting any error.
    pub fn close(self) -> std::io::Result<()> {
        self.scratch.close()
    }
}
