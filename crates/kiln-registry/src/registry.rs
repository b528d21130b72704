//! Step registry: enumerates step names and their input shapes by category.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::RegistryError;

/// The two families of pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCategory {
    /// Steps that produce data.
    Sources,
    /// Steps that transform the output of other steps.
    Filters,
}

impl StepCategory {
    /// Categories in the order they are queried when building a schema.
    pub const ALL: [StepCategory; 2] = [StepCategory::Sources, StepCategory::Filters];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepCategory::Sources => "sources",
            StepCategory::Filters => "filters",
        }
    }
}

impl fmt::Display for StepCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepCategory {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sources" => Ok(StepCategory::Sources),
            "filters" => Ok(StepCategory::Filters),
            other => Err(RegistryError::UnknownCategory(other.to_string())),
        }
    }
}

/// A registered step and the shape of its input body.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSchema {
    pub name: String,
    /// JSON Schema the step body must satisfy. `None` accepts any mapping.
    pub shape: Option<Value>,
}

impl StepSchema {
    pub fn new(name: impl Into<String>, shape: Option<Value>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// Enumerates the steps available to recipes.
///
/// Schema builders query the registry on every build, so an implementation
/// must return a consistent snapshot for the duration of one call.
pub trait StepRegistry: Send + Sync {
    /// Returns every step registered under `category`.
    fn function_schemas(&self, category: StepCategory) -> Result<Vec<StepSchema>, RegistryError>;
}

impl<R: StepRegistry + ?Sized> StepRegistry for &R {
    fn function_schemas(&self, category: StepCategory) -> Result<Vec<StepSchema>, RegistryError> {
        (**self).function_schemas(category)
    }
}

impl<R: StepRegistry + ?Sized> StepRegistry for std::sync::Arc<R> {
    fn function_schemas(&self, category: StepCategory) -> Result<Vec<StepSchema>, RegistryError> {
        (**self).function_schemas(category)
    }
}

/// In-memory registry. Steps are returned sorted by name within a category.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    steps: BTreeMap<StepCategory, BTreeMap<String, Option<Value>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_step(
        mut self,
        category: StepCategory,
        name: impl Into<String>,
        shape: Option<Value>,
    ) -> Self {
        self.register(category, name, shape);
        self
    }

    /// Register a step, replacing any previous definition of the same name
    /// in the same category.
    pub fn register(
        &mut self,
        category: StepCategory,
        name: impl Into<String>,
        shape: Option<Value>,
    ) -> &mut Self {
        let name = name.into();
        let previous = self.steps.entry(category).or_default().insert(name.clone(), shape);
        if previous.is_some() {
            warn!("Step '{}' re-registered in {}", name, category);
        }
        self
    }

    pub fn contains(&self, category: StepCategory, name: &str) -> bool {
        self.steps
            .get(&category)
            .is_some_and(|steps| steps.contains_key(name))
    }

    /// Total number of registered steps across categories.
    pub fn len(&self) -> usize {
        self.steps.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StepRegistry for StaticRegistry {
    fn function_schemas(&self, category: StepCategory) -> Result<Vec<StepSchema>, RegistryError> {
        Ok(self
            .steps
            .get(&category)
            .map(|steps| {
                steps
                    .iter()
                    .map(|(name, shape)| StepSchema::new(name.clone(), shape.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
