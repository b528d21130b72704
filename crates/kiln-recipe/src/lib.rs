//! Kiln Recipe - recipe schema composition and validation
//!
//! A recipe describes how a dataset is built: the dates it covers, the
//! pipeline of registered steps that produce its fields, and output/build
//! settings. The set of valid steps comes from a [`StepRegistry`], so the
//! recipe schema is composed at runtime by [`init`] and then used to
//! validate documents.

pub mod builder;
pub mod dates;
pub mod document;
pub mod error;
pub mod input;
mod number;
pub mod schema;
pub mod validation;

pub use builder::{init, RecipeSchema, SchemaOptions, StepCatalog};
pub use dates::{DateError, Frequency, Timestamp, MAX_FREQUENCY_HOURS};
pub use document::load_document;
pub use error::{RecipeError, SchemaError};
pub use input::{Input, Step};
pub use kiln_registry::StepRegistry;
pub use schema::{Build, DateList, Dates, Interval, Output, Recipe, Statistics};
pub use validation::{
    expand, validate, validate_into, OutputMode, ValidatedRecipe, ValidationReport, Violation,
};
