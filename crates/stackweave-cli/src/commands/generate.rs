//! Template rendering command.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::Settings;

/// What `generate` writes.
pub enum Target<'a> {
    /// The resolved configuration.
    Config,
    /// A template rendered against the resolved configuration.
    Template(&'a Path),
}

pub async fn run(
    settings: &Settings,
    target: Target<'_>,
    config_path: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let evaluator = settings.evaluator();
    let config = match config_path {
        Some(path) => settings.resolve_config(&evaluator, path).await?,
        None => Value::Object(Map::new()),
    };

    let rendered = match target {
        Target::Config => config,
        Target::Template(template) => evaluator
            .with_config(Arc::new(config))
            .resolve_file(template)
            .await
            .with_context(|| format!("Failed to render {}", template.display()))?,
    };

    let mut json = serde_json::to_string(&rendered)?;
    json.push('\n');
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(output = %output.display(), "Generated");
    Ok(())
}
