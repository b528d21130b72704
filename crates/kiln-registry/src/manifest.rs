//! Registry manifests: a JSON or YAML file listing steps per category.
//!
//! ```yaml
//! sources:
//!   mars: { type: object, required: [param] }
//!   constants: ~
//! filters:
//!   rename: ~
//! ```
//!
//! A `null` shape registers the step without a declared input shape.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::RegistryError;
use crate::registry::{StaticRegistry, StepCategory};

/// Serialization format of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    /// Pick the format from a file extension; anything other than
    /// `.yaml`/`.yml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ManifestFormat::Yaml,
            _ => ManifestFormat::Json,
        }
    }
}

/// Load a manifest file into a [`StaticRegistry`].
pub fn load_manifest(path: &Path) -> Result<StaticRegistry, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let registry = parse_manifest(
        &content,
        ManifestFormat::from_path(path),
        &path.display().to_string(),
    )?;
    debug!(
        "Loaded {} steps from registry manifest {}",
        registry.len(),
        path.display()
    );
    Ok(registry)
}

/// Parse manifest text. `origin` names the manifest in error messages.
pub fn parse_manifest(
    content: &str,
    format: ManifestFormat,
    origin: &str,
) -> Result<StaticRegistry, RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidManifest {
        path: origin.to_string(),
        reason,
    };

    let document: Value = match format {
        ManifestFormat::Json => {
            serde_json::from_str(content).map_err(|e| invalid(format!("invalid JSON: {e}")))?
        }
        ManifestFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| invalid(format!("invalid YAML: {e}")))?
        }
    };

    let sections = match document {
        Value::Object(map) => map,
        Value::Null => return Ok(StaticRegistry::new()),
        other => {
            return Err(invalid(format!(
                "expected a mapping of categories, found {}",
                json_type_name(&other)
            )))
        }
    };

    let mut registry = StaticRegistry::new();
    for (key, section) in sections {
        let category: StepCategory = key.parse().map_err(|e: RegistryError| invalid(e.to_string()))?;
        let steps = match section {
            Value::Object(steps) => steps,
            Value::Null => continue,
            other => {
                return Err(invalid(format!(
                    "'{}' must map step names to shapes, found {}",
                    category,
                    json_type_name(&other)
                )))
            }
        };
        for (name, shape) in steps {
            let shape = match shape {
                Value::Null => None,
                shape => Some(shape),
            };
            registry.register(category, name, shape);
        }
    }

    Ok(registry)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StepRegistry;

    #[test]
    fn test_parse_yaml_manifest() {
        let yaml = r#"
sources:
  mars:
    type: object
    required: [param]
  constants: ~
filters:
  rename:
"#;
        let registry = parse_manifest(yaml, ManifestFormat::Yaml, "inline").unwrap();
        assert_eq!(registry.len(), 3);

        let sources = registry.function_schemas(StepCategory::Sources).unwrap();
        let mars = sources.iter().find(|s| s.name == "mars").unwrap();
        assert_eq!(mars.shape.as_ref().unwrap()["required"][0], "param");
        assert!(registry.contains(StepCategory::Filters, "rename"));
    }

    #[test]
    fn test_parse_json_manifest() {
        let json = r#"{"sources": {"netcdf": {"type": "object"}}}"#;
        let registry = parse_manifest(json, ManifestFormat::Json, "inline").unwrap();
        assert!(registry.contains(StepCategory::Sources, "netcdf"));
        assert!(registry
            .function_schemas(StepCategory::Filters)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = parse_manifest("outputs: {zarr: ~}", ManifestFormat::Yaml, "m.yaml").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("m.yaml"));
        assert!(msg.contains("outputs"));
    }

    #[test]
    fn test_section_must_be_mapping() {
        let err = parse_manifest("sources: [mars]", ManifestFormat::Yaml, "m.yaml").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidManifest { .. }));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_top_level_must_be_mapping() {
        let err = parse_manifest("[1, 2]", ManifestFormat::Json, "m.json").unwrap_err();
        assert!(err.to_string().contains("expected a mapping"));
    }

    #[test]
    fn test_null_manifest_is_empty_registry() {
        let registry = parse_manifest("~", ManifestFormat::Yaml, "empty.yaml").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("steps.yml")),
            ManifestFormat::Yaml
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("steps.json")),
            ManifestFormat::Json
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("steps")),
            ManifestFormat::Json
        );
    }
}
