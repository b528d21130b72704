//! Recipe validation: checks documents against a composed schema and
//! reports the outcome.

use std::fmt;
use std::io::{self, Write};

use kiln_registry::StepRegistry;
use serde_json::Value;
use tracing::{debug, warn};

use crate::builder::{init, RecipeSchema};
use crate::error::RecipeError;
use crate::schema::{deprecation_warnings, Recipe};

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer to the violating value in the recipe.
    pub instance_path: String,
    /// JSON Pointer to the schema keyword that rejected it.
    pub schema_path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Every violation found in one recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    fn single(message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation {
                instance_path: String::new(),
                schema_path: String::new(),
                message: message.into(),
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// True if any violation points at or below `instance_path`.
    pub fn touches(&self, instance_path: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.instance_path.starts_with(instance_path))
    }

    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// A recipe that passed validation, with defaults applied.
#[derive(Debug, Clone)]
pub struct ValidatedRecipe {
    pub recipe: Recipe,
    /// Deprecated fields found in the document.
    pub warnings: Vec<String>,
}

/// What [`validate`] prints after a successful validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// The recipe with defaults filled in.
    #[default]
    Document,
    /// The composed JSON Schema.
    Schema,
}

impl From<bool> for OutputMode {
    fn from(schema: bool) -> Self {
        if schema {
            OutputMode::Schema
        } else {
            OutputMode::Document
        }
    }
}

impl RecipeSchema {
    /// Structural violations of `config`, empty when it conforms.
    pub fn violations(&self, config: &Value) -> Vec<Violation> {
        self.validator
            .iter_errors(config)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    /// Validate `config` and convert it into a typed [`Recipe`].
    pub fn parse(&self, config: &Value) -> Result<ValidatedRecipe, ValidationReport> {
        let violations = self.violations(config);
        if !violations.is_empty() {
            return Err(ValidationReport { violations });
        }

        let recipe: Recipe =
            serde_json::from_value(config.clone()).map_err(|e| ValidationReport::single(e.to_string()))?;

        let warnings = deprecation_warnings(config);
        for warning in &warnings {
            warn!("{}", warning);
        }

        Ok(ValidatedRecipe { recipe, warnings })
    }

    /// The validated document with every default filled in.
    pub fn normalize(&self, config: &Value) -> Result<Value, ValidationReport> {
        let validated = self.parse(config)?;
        serde_json::to_value(&validated.recipe).map_err(|e| ValidationReport::single(e.to_string()))
    }

    /// Validate `config` and write the outcome to `out`.
    ///
    /// Returns `Ok(false)` for an invalid recipe; `Err` only when the
    /// outcome cannot be written.
    pub fn report<W: Write>(
        &self,
        config: &Value,
        mode: OutputMode,
        out: &mut W,
    ) -> Result<bool, RecipeError> {
        match self.parse(config) {
            Ok(validated) => {
                let rendered = match mode {
                    OutputMode::Document => serde_json::to_string_pretty(&validated.recipe)?,
                    OutputMode::Schema => serde_json::to_string_pretty(self.json_schema())?,
                };
                writeln!(out, "Validation successful!")?;
                writeln!(out, "{rendered}")?;
                debug!(
                    "Recipe valid ({} deprecation warnings)",
                    validated.warnings.len()
                );
                Ok(true)
            }
            Err(report) => {
                writeln!(out, "Validation failed:")?;
                writeln!(out, "{report}")?;
                debug!("Recipe invalid ({} violations)", report.len());
                Ok(false)
            }
        }
    }
}

/// Build the schema from `registry`, validate `config` and print the
/// outcome to stdout.
///
/// Invalid recipes yield `Ok(false)`. A registry that cannot be turned
/// into a schema is an `Err`.
pub fn validate(
    registry: &dyn StepRegistry,
    config: &Value,
    mode: OutputMode,
) -> Result<bool, RecipeError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    validate_into(registry, config, mode, &mut out)
}

/// [`validate`] writing to `out` instead of stdout.
pub fn validate_into<W: Write>(
    registry: &dyn StepRegistry,
    config: &Value,
    mode: OutputMode,
    out: &mut W,
) -> Result<bool, RecipeError> {
    let schema = init(registry)?;
    schema.report(config, mode, out)
}

/// Returns `config` unchanged.
///
/// Use [`RecipeSchema::normalize`] to obtain a recipe with defaults applied.
pub fn expand(config: Value) -> Value {
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_registry::{StaticRegistry, StepCategory};
    use serde_json::json;

    fn registry() -> StaticRegistry {
        StaticRegistry::new()
            .with_step(StepCategory::Sources, "mars", None)
            .with_step(StepCategory::Filters, "rename", None)
    }

    fn minimal() -> Value {
        json!({"dates": {"start": "2020-01-01", "end": "2020-01-02", "frequency": "1h"}})
    }

    fn run(config: &Value, mode: OutputMode) -> (bool, String) {
        let mut out = Vec::new();
        let ok = validate_into(&registry(), config, mode, &mut out).unwrap();
        (ok, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_report_success_prints_normalized_document() {
        let (ok, output) = run(&minimal(), OutputMode::Document);
        assert!(ok);
        let (header, body) = output.split_once('\n').unwrap();
        assert_eq!(header, "Validation successful!");
        let dump: Value = serde_json::from_str(body).unwrap();
        assert_eq!(dump["output"]["dtype"], "float32");
        assert_eq!(dump["build"]["group_by"], "monthly");
    }

    #[test]
    fn test_report_schema_mode_prints_schema_only() {
        let (ok, output) = run(&minimal(), OutputMode::from(true));
        assert!(ok);
        let (_, body) = output.split_once('\n').unwrap();
        let printed: Value = serde_json::from_str(body).unwrap();
        assert_eq!(printed["title"], "Recipe");
        assert!(printed.get("$defs").is_some());
        assert!(printed.get("output").is_none());
    }

    #[test]
    fn test_report_failure_lists_violations() {
        let config = json!({"dates": {"start": "not a date"}, "colour": "red"});
        let (ok, output) = run(&config, OutputMode::Document);
        assert!(!ok);
        assert!(output.starts_with("Validation failed:\n"));
        assert!(output.contains("/dates/start"));
        assert!(output.contains("colour"));
    }

    #[test]
    fn test_parse_collects_deprecation_warnings() {
        let schema = init(&registry()).unwrap();
        let mut config = minimal();
        config["copyright"] = json!("ecmwf");
        let validated = schema.parse(&config).unwrap();
        assert_eq!(validated.warnings.len(), 1);
        assert_eq!(validated.recipe.copyright.as_deref(), Some("ecmwf"));
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let schema = init(&registry()).unwrap();
        let normalized = schema.normalize(&minimal()).unwrap();
        assert_eq!(normalized["attribution"], "unknown");
        assert_eq!(normalized["flatten_grid"], true);
        assert_eq!(normalized["statistics"]["allow_nans"], json!([]));
    }

    #[test]
    fn test_expand_returns_input_unchanged() {
        let config = json!({"dates": {"values": []}, "anything": 1});
        assert_eq!(expand(config.clone()), config);
    }

    #[test]
    fn test_construction_error_propagates() {
        let registry = StaticRegistry::new().with_step(StepCategory::Sources, "join", None);
        let mut out = Vec::new();
        let result = validate_into(&registry, &minimal(), OutputMode::Document, &mut out);
        assert!(matches!(result, Err(RecipeError::Schema(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_violation_display() {
        let root = Violation {
            instance_path: String::new(),
            schema_path: "/required".to_string(),
            message: "\"dates\" is a required property".to_string(),
        };
        assert_eq!(root.to_string(), "  (root): \"dates\" is a required property");

        let nested = Violation {
            instance_path: "/output/dtype".to_string(),
            ..root
        };
        assert!(nested.to_string().starts_with("  /output/dtype: "));
    }
}
