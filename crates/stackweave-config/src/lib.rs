//! Document loading and macro evaluation for stackweave.
//!
//! This crate handles:
//! - Reading YAML/JSON documents into trees
//! - Expanding `TVLK::` macros through a static operator table
//! - Resolving the configuration document against itself until it is stable

pub mod document;
pub mod error;
pub mod evaluator;
pub mod operator;
pub mod resolver;

pub use error::{EvaluationError, EvaluationResult};
pub use evaluator::{MacroEvaluator, Services};
pub use operator::{MACRO_PREFIX, Operator};
pub use resolver::{ConfigResolver, Fixpoint};

#[cfg(test)]
mod testing;
