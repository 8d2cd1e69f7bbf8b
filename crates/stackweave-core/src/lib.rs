//! Core domain types and capability traits for stackweave.
//!
//! This crate contains:
//! - Capability traits for the remote provisioning API, instance lookups and local builds
//! - Stack definitions, the deployment manifest and remote status classification
//! - The retry/poll primitive shared by resource lookups and stack waits

pub mod error;
pub mod poll;
pub mod provisioner;
pub mod stack;

pub use error::{Error, ProvisionerError, Result};
pub use poll::RetryPolicy;
pub use provisioner::{BuildTool, InstanceInspector, StackProvisioner};
pub use stack::{Manifest, StackDefinition, StackStatus, TemplateBucket};
