//! Stack deployment for stackweave.
//!
//! Provides:
//! - The dependency-aware stack deployer
//! - Capability backends driving the `aws` and `make` command-line tools

pub mod aws;
pub mod deployer;
pub mod error;
pub mod make;
pub mod run;

#[cfg(test)]
mod testing;

pub use aws::AwsCli;
pub use deployer::{DeployOptions, StackDeployer};
pub use error::{DeployError, DeployResult};
pub use make::Make;
pub use run::DeploymentRun;
