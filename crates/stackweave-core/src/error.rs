//! Error types for stackweave.

use thiserror::Error;

/// Reason reported by the provisioning API when an update would not change anything.
pub const NO_UPDATES_REASON: &str = "No updates are to be performed";

#[derive(Debug, Error)]
pub enum Error {
    #[error("stack '{stack}' is in failed state ({status})")]
    StackFailed { stack: String, status: String },

    #[error("gave up waiting for {subject} after {attempts} attempts")]
    ExhaustedRetries { subject: String, attempts: u64 },

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid template location '{location}': {reason}")]
    InvalidTempLocation { location: String, reason: String },

    #[error(transparent)]
    Provisioner(#[from] ProvisionerError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a capability backend (provisioning API, instance lookups, build tool).
#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected response from {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl ProvisionerError {
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the backend refused an update only because the stack is already up to date.
    pub fn is_no_updates(&self) -> bool {
        matches!(self, Self::Rejected { message, .. } if message.contains(NO_UPDATES_REASON))
    }
}
