//! Stack definitions, the deployment manifest and remote status classification.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Status string reported by the provisioning API for a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackStatus(String);

impl StackStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last operation finished (`*_COMPLETE`).
    pub fn is_complete(&self) -> bool {
        self.0.ends_with("_COMPLETE")
    }

    /// The last operation failed (`*_FAILED`).
    pub fn is_failed(&self) -> bool {
        self.0.ends_with("_FAILED")
    }

    /// The last operation finished by rolling back (`ROLLBACK_COMPLETE`, `UPDATE_ROLLBACK_COMPLETE`).
    pub fn is_rolled_back(&self) -> bool {
        self.is_complete() && self.0.contains("ROLLBACK")
    }

    /// No operation is running on the stack.
    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_failed()
    }

    /// The last operation finished in the requested state.
    pub fn is_deployed(&self) -> bool {
        self.is_complete() && !self.is_rolled_back() && self.0 != "DELETE_COMPLETE"
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StackStatus {
    fn from(status: &str) -> Self {
        Self::new(status)
    }
}

/// One entry of `deploy.stack` in the resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    /// Deployed stack name.
    #[serde(default)]
    pub name: Option<String>,
    /// Template path, relative to the configuration file.
    #[serde(default)]
    pub input: Option<String>,
    /// Stacks this run deploys first.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Stacks deployed elsewhere that must be complete first.
    #[serde(default)]
    pub ext_deps: Vec<String>,
}

impl StackDefinition {
    /// The template path and deployed name, when this definition deploys anything itself.
    pub fn template(&self) -> Option<(&str, &str)> {
        match (&self.input, &self.name) {
            (Some(input), Some(name)) => Some((input.as_str(), name.as_str())),
            _ => None,
        }
    }
}

/// The `deploy` section of the resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Stack definitions keyed by manifest name, in declaration order.
    #[serde(default)]
    pub stack: IndexMap<String, StackDefinition>,
    /// `s3://bucket/prefix/` location for uploaded templates.
    #[serde(default)]
    pub s3_temp: Option<String>,
}

impl Manifest {
    /// Read the manifest from the `deploy` key of a resolved configuration.
    pub fn from_config(config: &serde_json::Value) -> Result<Self> {
        let deploy = config
            .get("deploy")
            .ok_or_else(|| Error::InvalidManifest("missing 'deploy' section".to_string()))?;
        serde_json::from_value(deploy.clone()).map_err(|e| Error::InvalidManifest(e.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&StackDefinition> {
        self.stack.get(name)
    }

    /// Manifest names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stack.keys().map(String::as_str)
    }

    /// Parsed upload location, if remote-template mode is configured.
    pub fn template_bucket(&self) -> Result<Option<TemplateBucket>> {
        self.s3_temp.as_deref().map(TemplateBucket::parse).transpose()
    }
}

/// Object storage location templates are uploaded to before provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBucket {
    pub bucket: String,
    /// Key prefix, always empty or ending in `/`.
    pub prefix: String,
}

impl TemplateBucket {
    /// Parse an `s3://bucket/prefix/` URI.
    pub fn parse(location: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidTempLocation {
            location: location.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(location).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "s3" {
            return Err(invalid("scheme must be s3"));
        }
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| invalid("missing bucket"))?;
        let path = url.path();
        if !path.ends_with('/') {
            return Err(invalid("prefix must end with '/'"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: path.trim_start_matches('/').to_string(),
        })
    }

    /// Object key for a stack's rendered template.
    pub fn key_for(&self, stack_name: &str) -> String {
        format!("{}{}.json", self.prefix, stack_name)
    }

    /// URL the provisioning API fetches an uploaded template from.
    pub fn url_for(&self, key: &str) -> String {
        format!("https://s3.amazonaws.com/{}/{}", self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(StackStatus::from("CREATE_COMPLETE").is_complete());
        assert!(StackStatus::from("UPDATE_ROLLBACK_FAILED").is_failed());
        assert!(StackStatus::from("UPDATE_ROLLBACK_COMPLETE").is_rolled_back());
        assert!(!StackStatus::from("UPDATE_COMPLETE").is_rolled_back());

        let in_progress = StackStatus::from("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS");
        assert!(!in_progress.is_terminal());
    }

    #[test]
    fn test_deployed_excludes_rollbacks_and_deletes() {
        assert!(StackStatus::from("CREATE_COMPLETE").is_deployed());
        assert!(StackStatus::from("UPDATE_COMPLETE").is_deployed());
        assert!(!StackStatus::from("ROLLBACK_COMPLETE").is_deployed());
        assert!(!StackStatus::from("DELETE_COMPLETE").is_deployed());
        assert!(!StackStatus::from("CREATE_IN_PROGRESS").is_deployed());
    }

    #[test]
    fn test_manifest_preserves_order() {
        let config = json!({
            "deploy": {
                "stack": {
                    "vpc": { "name": "prod-vpc", "input": "vpc.yaml" },
                    "app": { "name": "prod-app", "input": "app.yaml", "deps": ["vpc"], "ext_deps": ["shared-dns"] },
                    "all": { "deps": ["app"] }
                }
            }
        });

        let manifest = Manifest::from_config(&config).unwrap();
        let names: Vec<_> = manifest.names().collect();
        assert_eq!(names, vec!["vpc", "app", "all"]);

        let app = manifest.get("app").unwrap();
        assert_eq!(app.deps, vec!["vpc"]);
        assert_eq!(app.ext_deps, vec!["shared-dns"]);
        assert_eq!(app.template(), Some(("app.yaml", "prod-app")));
        assert_eq!(manifest.get("all").unwrap().template(), None);
    }

    #[test]
    fn test_missing_deploy_section() {
        let result = Manifest::from_config(&json!({ "region": "eu-west-1" }));
        assert!(matches!(result, Err(Error::InvalidManifest(_))));
    }

    #[test]
    fn test_template_bucket() {
        let bucket = TemplateBucket::parse("s3://deploy-artifacts/templates/prod/").unwrap();
        assert_eq!(bucket.bucket, "deploy-artifacts");
        assert_eq!(bucket.prefix, "templates/prod/");

        let key = bucket.key_for("prod-app");
        assert_eq!(key, "templates/prod/prod-app.json");
        assert_eq!(
            bucket.url_for(&key),
            "https://s3.amazonaws.com/deploy-artifacts/templates/prod/prod-app.json"
        );
    }

    #[test]
    fn test_template_bucket_rejects_bad_locations() {
        assert!(TemplateBucket::parse("https://bucket/prefix/").is_err());
        assert!(TemplateBucket::parse("s3://bucket/prefix").is_err());
        assert!(TemplateBucket::parse("not a url").is_err());
    }
}
