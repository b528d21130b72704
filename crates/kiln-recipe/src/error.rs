//! Errors raised while building schemas or reporting validation results.
//!
//! Validation failures are not errors here: they are returned as a
//! [`ValidationReport`](crate::validation::ValidationReport).

use kiln_registry::{RegistryError, StepCategory};
use thiserror::Error;

/// The recipe schema could not be composed from the registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{category} step '{name}' declares an invalid input shape: {reason}")]
    InvalidStepShape {
        name: String,
        category: StepCategory,
        reason: String,
    },

    #[error("step '{name}' is registered more than once ({first} and {second})")]
    DuplicateStep {
        name: String,
        first: StepCategory,
        second: StepCategory,
    },

    #[error("{category} step '{name}' uses a name reserved for a combinator")]
    ReservedStepName { name: String, category: StepCategory },

    #[error("{category} contain a step with an empty name")]
    EmptyStepName { category: StepCategory },

    #[error("composed recipe schema does not compile: {0}")]
    Compile(String),
}

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("document load error for '{path}': {reason}")]
    DocumentLoad { path: String, reason: String },

    #[error("failed to serialize validation output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write validation output: {0}")]
    Io(#[from] std::io::Error),
}
