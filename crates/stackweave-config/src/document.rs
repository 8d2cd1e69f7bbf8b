//! Reading tree documents from disk.
//!
//! Documents are YAML; JSON files parse through the same reader.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::EvaluationResult;

/// File extensions treated as documents.
pub const DOCUMENT_SUFFIXES: &[&str] = &["yaml", "yml", "json"];

/// Parse document text into a tree.
pub fn parse(content: &str) -> EvaluationResult<Value> {
    Ok(serde_yaml::from_str(content)?)
}

/// Load a document from a file.
pub async fn load(path: &Path) -> EvaluationResult<Value> {
    debug!(path = %path.display(), "Loading document");
    let content = tokio::fs::read_to_string(path).await?;
    parse(&content)
}

/// The base name of a document file, or `None` if the file is not a document.
pub fn document_name(file_name: &str) -> Option<&str> {
    let (base, suffix) = file_name.rsplit_once('.')?;
    (!base.is_empty() && DOCUMENT_SUFFIXES.contains(&suffix)).then_some(base)
}

/// Directory relative paths inside a document are resolved against.
pub fn base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
