//! Macro evaluation errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("macro '{0}' must not have siblings")]
    AmbiguousMacro(String),

    #[error("unknown macro: {0}")]
    UnknownMacro(String),

    #[error("expected {expected}, found {found}")]
    Type {
        expected: &'static str,
        found: String,
    },

    #[error("cannot retrieve '{0}' from configuration")]
    ConfigLookup(String),

    #[error("no element '{0}' in collection")]
    MissingElement(String),

    #[error("'{0}' is already declared")]
    DuplicateKey(String),

    #[error("document '{0}' is provided by more than one file")]
    NameCollision(String),

    #[error("build of target '{target}' failed in {}", dir.display())]
    Build { dir: PathBuf, target: String },

    #[error("{subject} not ready after {attempts} attempts: {reason}")]
    ResourceNotReady {
        subject: String,
        attempts: u64,
        reason: String,
    },

    #[error("configuration did not converge after {0} passes")]
    ConfigDivergence(usize),

    #[error("cannot parse document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Provisioner(#[from] stackweave_core::ProvisionerError),

    #[error("error processing file '{}'", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<EvaluationError>,
    },

    #[error("error in {operator}")]
    InOperator {
        operator: &'static str,
        #[source]
        source: Box<EvaluationError>,
    },
}

pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;

impl EvaluationError {
    pub fn type_mismatch(expected: &'static str, found: &serde_json::Value) -> Self {
        Self::Type {
            expected,
            found: kind_of(found).to_string(),
        }
    }

    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    pub fn in_operator(self, operator: &'static str) -> Self {
        Self::InOperator {
            operator,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping file and operator context.
    pub fn root_cause(&self) -> &EvaluationError {
        match self {
            Self::InFile { source, .. } | Self::InOperator { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Short name of a value's shape, for error messages.
pub fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    }
}
