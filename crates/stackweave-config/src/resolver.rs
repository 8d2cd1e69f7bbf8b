//! Fixpoint resolution of the configuration document.
//!
//! `GetConfig` lookups may point at values that are themselves still macros, so
//! the whole document is re-resolved against its previous pass until a pass no
//! longer changes it.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::document;
use crate::operator::contains_macro;
use crate::{EvaluationError, EvaluationResult, MacroEvaluator};

/// Default cap on resolution passes.
pub const DEFAULT_MAX_PASSES: usize = 64;

/// A configuration document that stopped changing.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixpoint {
    pub document: Value,
    /// Passes run, including the final unchanged one.
    pub passes: usize,
}

/// Resolves a configuration document against itself.
pub struct ConfigResolver {
    evaluator: MacroEvaluator,
    max_passes: usize,
}

impl ConfigResolver {
    pub fn new(evaluator: MacroEvaluator) -> Self {
        Self {
            evaluator,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Load and resolve the configuration at `path`.
    pub async fn resolve(&self, path: &Path) -> EvaluationResult<Value> {
        info!(path = %path.display(), "Resolving configuration");
        let resolved = async {
            let document = document::load(path).await?;
            self.resolve_document(&document::base_dir(path), document)
                .await
        }
        .await;
        resolved
            .map(|fixpoint| fixpoint.document)
            .map_err(|e| e.in_file(path))
    }

    /// Resolve `document` until a pass yields its own input.
    pub async fn resolve_document(&self, cwd: &Path, document: Value) -> EvaluationResult<Fixpoint> {
        let mut current = Arc::new(document);
        for pass in 1..=self.max_passes {
            let next = self
                .evaluator
                .with_config(current.clone())
                .resolve(cwd, &current)
                .await?;

            if next == *current {
                // A lookup that yields its own macro reproduces itself forever.
                if contains_macro(&next) {
                    return Err(EvaluationError::ConfigDivergence(pass));
                }
                debug!(passes = pass, "Configuration converged");
                return Ok(Fixpoint {
                    document: next,
                    passes: pass,
                });
            }
            current = Arc::new(next);
        }

        Err(EvaluationError::ConfigDivergence(self.max_passes))
    }
}
