//! Deployment errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("unknown stack: {0}")]
    UnknownStack(String),

    #[error("cycle detected in dependencies: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("cannot render stack '{stack}'")]
    Render {
        stack: String,
        #[source]
        source: stackweave_config::EvaluationError,
    },

    #[error("scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("cannot serialize template: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] stackweave_core::Error),
}

impl From<stackweave_core::ProvisionerError> for DeployError {
    fn from(err: stackweave_core::ProvisionerError) -> Self {
        Self::Core(err.into())
    }
}

pub type DeployResult<T> = std::result::Result<T, DeployError>;
