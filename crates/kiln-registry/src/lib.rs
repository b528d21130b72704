//! Kiln Registry - the steps a recipe may reference
//!
//! A step is either a source (produces data) or a filter (transforms it).
//! Each registered step may declare a JSON Schema that its input body
//! must satisfy; steps without one accept any mapping.

pub mod error;
pub mod manifest;
pub mod registry;

pub use error::RegistryError;
pub use manifest::{load_manifest, parse_manifest, ManifestFormat};
pub use registry::{StaticRegistry, StepCategory, StepRegistry, StepSchema};
