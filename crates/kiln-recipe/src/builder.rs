//! Recipe schema builder: composes the JSON Schema of a recipe from the
//! steps a registry currently knows about.
//!
//! The registry is read once per build into a closed [`StepCatalog`]. Each
//! step becomes a `{name: <shape>}` definition. `SimpleStep` is a
//! single-key discriminated union over them: the lone key of a node selects
//! the definition its body is checked against. The wider unions are layered
//! on top, each routing a node holding a combinator key to that combinator
//! and everything else to the next union down.
//!
//! | Union | Routes | Falls back to |
//! |---|---|---|
//! | `SimpleStep` | registered steps | |
//! | `StepOrPipe` | `pipe` | `SimpleStep` |
//! | `StepOrDatesJoin` | `dates` | `StepOrPipe` |
//! | `Input` | `dates`, `concat`, `join` | `StepOrPipe` |

use std::fmt;

use jsonschema::{Draft, Validator};
use kiln_registry::{StepCategory, StepRegistry};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::dates::{parse_datetime, Frequency, MAX_FREQUENCY_HOURS};
use crate::error::SchemaError;
use crate::input::{COMBINATOR_KEYS, CONCAT, DATES, JOIN, PIPE};
use crate::schema::{GroupPeriod, DEPRECATED_FIELDS};

/// Custom string format for recipe timestamps.
pub const DATETIME_FORMAT: &str = "kiln-datetime";
/// Custom string format for interval frequencies.
pub const FREQUENCY_FORMAT: &str = "kiln-frequency";

const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Reject recipes without an `input` section.
    pub require_input: bool,
}

/// A step as captured from the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub category: StepCategory,
    pub shape: Option<Value>,
}

impl CatalogEntry {
    /// Key of this step's definition under `$defs`.
    fn definition_key(&self, index: usize) -> String {
        let plain = self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if plain {
            format!("step.{}", self.name)
        } else {
            format!("step-{index}")
        }
    }
}

/// The closed set of steps a schema was built from, in registry order
/// (sources first, then filters).
#[derive(Debug, Clone, Default)]
pub struct StepCatalog {
    entries: Vec<CatalogEntry>,
}

impl StepCatalog {
    /// Snapshot the registry, rejecting names and shapes that cannot be
    /// expressed in a recipe schema.
    pub fn from_registry(registry: &dyn StepRegistry) -> Result<Self, SchemaError> {
        let mut entries: Vec<CatalogEntry> = Vec::new();

        for category in StepCategory::ALL {
            for step in registry.function_schemas(category)? {
                if step.name.is_empty() {
                    return Err(SchemaError::EmptyStepName { category });
                }
                if COMBINATOR_KEYS.contains(&step.name.as_str()) {
                    return Err(SchemaError::ReservedStepName {
                        name: step.name,
                        category,
                    });
                }
                if let Some(first) = entries.iter().find(|e| e.name == step.name) {
                    return Err(SchemaError::DuplicateStep {
                        name: step.name,
                        first: first.category,
                        second: category,
                    });
                }
                if let Some(shape) = &step.shape {
                    jsonschema::validator_for(shape).map_err(|e| {
                        SchemaError::InvalidStepShape {
                            name: step.name.clone(),
                            category,
                            reason: e.to_string(),
                        }
                    })?;
                }
                entries.push(CatalogEntry {
                    name: step.name,
                    category,
                    shape: step.shape,
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn category_of(&self, name: &str) -> Option<StepCategory> {
        self.get(name).map(|e| e.category)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn count(&self, category: StepCategory) -> usize {
        self.entries.iter().filter(|e| e.category == category).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A composed, compiled recipe schema.
///
/// Immutable once built; rebuild it when the registry changes.
pub struct RecipeSchema {
    catalog: StepCatalog,
    options: SchemaOptions,
    document: Value,
    pub(crate) validator: Validator,
}

impl fmt::Debug for RecipeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeSchema")
            .field("catalog", &self.catalog)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Build the recipe schema for the registry's current steps.
pub fn init(registry: &dyn StepRegistry) -> Result<RecipeSchema, SchemaError> {
    RecipeSchema::build(registry, SchemaOptions::default())
}

impl RecipeSchema {
    pub fn build(registry: &dyn StepRegistry, options: SchemaOptions) -> Result<Self, SchemaError> {
        let catalog = StepCatalog::from_registry(registry)?;
        let document = compose(&catalog, options);
        let validator = compile(&document)?;

        debug!(
            "Composed recipe schema: {} sources, {} filters, input required: {}",
            catalog.count(StepCategory::Sources),
            catalog.count(StepCategory::Filters),
            options.require_input
        );

        Ok(Self {
            catalog,
            options,
            document,
            validator,
        })
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn options(&self) -> SchemaOptions {
        self.options
    }

    /// The machine-readable schema description.
    pub fn json_schema(&self) -> &Value {
        &self.document
    }
}

fn compile(document: &Value) -> Result<Validator, SchemaError> {
    let mut options = jsonschema::options();
    options
        .with_draft(Draft::Draft202012)
        .should_validate_formats(true)
        .with_format(DATETIME_FORMAT, |s: &str| parse_datetime(s).is_ok())
        .with_format(FREQUENCY_FORMAT, |s: &str| s.parse::<Frequency>().is_ok());
    options
        .build(document)
        .map_err(|e| SchemaError::Compile(e.to_string()))
}

fn def_ref(key: &str) -> Value {
    json!({ "$ref": format!("#/$defs/{key}") })
}

fn object(properties: Map<String, Value>) -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": properties,
    })
}

fn properties<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(name, schema)| (name.to_string(), schema))
        .collect()
}

fn with_default(mut schema: Value, default: Value) -> Value {
    schema["default"] = default;
    schema
}

fn deprecated(mut schema: Value, advice: &str) -> Value {
    if let Value::Object(map) = &mut schema {
        map.insert("deprecated".into(), Value::Bool(true));
        map.insert("description".into(), json!(format!("Deprecated: {advice}")));
    }
    schema
}

fn deprecation_advice(pointer: &str) -> &'static str {
    DEPRECATED_FIELDS
        .iter()
        .find(|(p, _)| *p == pointer)
        .map(|(_, advice)| *advice)
        .unwrap_or("this field is ignored")
}

/// A union selected by the node's single key. `variants` pairs each key
/// with the `$defs` entry its node is checked against.
fn single_key_union(variants: &[(&str, &str)]) -> Value {
    let keys: Vec<&str> = variants.iter().map(|(key, _)| *key).collect();
    let property_names = if keys.is_empty() {
        Value::Bool(false)
    } else {
        json!({ "enum": keys })
    };

    let mut union = json!({
        "type": "object",
        "minProperties": 1,
        "maxProperties": 1,
        "propertyNames": property_names,
    });
    let branches: Vec<Value> = variants
        .iter()
        .map(|(key, def)| json!({ "if": { "required": [key] }, "then": def_ref(def) }))
        .collect();
    if !branches.is_empty() {
        union["allOf"] = Value::Array(branches);
    }
    union
}

/// Nodes holding `key` are checked against `target`, all others against
/// `otherwise`.
fn route(key: &str, target: &str, otherwise: Value) -> Value {
    json!({
        "type": "object",
        "if": { "required": [key] },
        "then": def_ref(target),
        "else": otherwise,
    })
}

/// An integer the recipe model can hold as `i64`.
fn integer() -> Value {
    json!({ "type": "integer", "minimum": i64::MIN, "maximum": i64::MAX })
}

fn list_of(def: &str) -> Value {
    json!({ "type": "array", "items": def_ref(def) })
}

fn combinator(key: &str, items: &str) -> Value {
    let mut schema = object(properties([(key, list_of(items))]));
    schema["required"] = json!([key]);
    schema
}

fn step_definition(entry: &CatalogEntry, def_key: &str) -> Value {
    let body = match &entry.shape {
        Some(Value::Object(shape)) if !shape.contains_key("$id") => {
            // Embedded as its own resource so the shape's internal
            // references keep resolving against the shape itself.
            let mut shape = shape.clone();
            shape.insert("$id".into(), json!(format!("urn:kiln:{def_key}")));
            Value::Object(shape)
        }
        Some(shape) => shape.clone(),
        None => json!({ "type": "object" }),
    };

    let mut props = Map::new();
    props.insert(entry.name.clone(), body);
    json!({
        "title": entry.name,
        "description": format!("{} step '{}'", entry.category, entry.name),
        "type": "object",
        "required": [entry.name],
        "properties": props,
    })
}

fn compose(catalog: &StepCatalog, options: SchemaOptions) -> Value {
    let mut defs = static_definitions();

    let step_keys: Vec<(String, String)> = catalog
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.name.clone(), entry.definition_key(index)))
        .collect();
    for (entry, (_, def_key)) in catalog.entries().iter().zip(&step_keys) {
        defs.insert(def_key.clone(), step_definition(entry, def_key));
    }

    let simple: Vec<(&str, &str)> = step_keys
        .iter()
        .map(|(name, def)| (name.as_str(), def.as_str()))
        .collect();

    defs.insert("SimpleStep".into(), single_key_union(&simple));
    defs.insert(
        "StepOrPipe".into(),
        route(PIPE, "Pipe", def_ref("SimpleStep")),
    );
    defs.insert(
        "StepOrDatesJoin".into(),
        route(DATES, "DatesJoin", def_ref("StepOrPipe")),
    );
    defs.insert(
        "Input".into(),
        route(
            DATES,
            "DatesJoin",
            route(CONCAT, "Concat", route(JOIN, "Join", def_ref("StepOrPipe"))),
        ),
    );

    defs.insert("Pipe".into(), combinator(PIPE, "StepOrPipe"));
    defs.insert("Join".into(), combinator(JOIN, "StepOrPipe"));
    defs.insert("Concat".into(), combinator(CONCAT, "StepOrDatesJoin"));
    let mut dates_join = object(properties([
        (DATES, def_ref("Interval")),
        (JOIN, list_of("StepOrPipe")),
    ]));
    dates_join["required"] = json!([DATES, JOIN]);
    defs.insert("DatesJoin".into(), dates_join);

    let string = || json!({ "type": "string" });
    let legacy = |name: &str, schema: Value| deprecated(schema, deprecation_advice(&format!("/{name}")));

    let mut recipe = object(properties([
        ("description", string()),
        ("name", string()),
        ("licence", json!({ "type": "string", "default": "unknown" })),
        ("attribution", json!({ "type": "string", "default": "unknown" })),
        ("dates", def_ref("Dates")),
        ("input", def_ref("Input")),
        ("output", def_ref("Output")),
        ("build", def_ref("Build")),
        ("statistics", def_ref("Statistics")),
        ("common", def_ref("Common")),
        ("sources", def_ref("Common")),
        ("aliases", json!({ "type": ["object", "array"] })),
        ("flatten_grid", json!({ "type": "boolean", "default": true })),
        ("ensemble_dimension", with_default(integer(), json!(2))),
        ("copyright", legacy("copyright", string())),
        ("purpose", legacy("purpose", string())),
        ("config_format_version", legacy("config_format_version", integer())),
        ("status", legacy("status", string())),
        ("dataset_status", legacy("dataset_status", string())),
    ]));

    let mut required = vec![json!("dates")];
    if options.require_input {
        required.push(json!("input"));
    }

    let root = recipe
        .as_object_mut()
        .map(std::mem::take)
        .unwrap_or_default();
    let mut document = Map::new();
    document.insert("$schema".into(), json!(SCHEMA_DIALECT));
    document.insert("title".into(), json!("Recipe"));
    document.extend(root);
    document.insert("required".into(), Value::Array(required));
    document.insert("$defs".into(), Value::Object(defs));
    Value::Object(document)
}

/// Definitions that do not depend on the registry.
fn static_definitions() -> Map<String, Value> {
    let timestamp = || def_ref("Timestamp");
    let timestamps = || list_of("Timestamp");
    let group_by = || {
        deprecated(
            def_ref("GroupBy"),
            deprecation_advice("/dates/group_by"),
        )
    };

    let mut defs = Map::new();
    defs.insert(
        "Timestamp".into(),
        json!({ "type": "string", "format": DATETIME_FORMAT }),
    );
    defs.insert(
        "Frequency".into(),
        json!({
            "anyOf": [
                { "type": "integer", "exclusiveMinimum": 0, "maximum": MAX_FREQUENCY_HOURS },
                { "type": "string", "format": FREQUENCY_FORMAT },
            ]
        }),
    );
    defs.insert(
        "GroupBy".into(),
        json!({
            "anyOf": [integer(), { "enum": GroupPeriod::NAMES }],
            "default": "monthly",
        }),
    );
    defs.insert(
        "StatisticsEnd".into(),
        json!({ "anyOf": [integer(), timestamp()] }),
    );

    defs.insert(
        "Interval".into(),
        object(properties([
            ("start", timestamp()),
            ("end", timestamp()),
            ("frequency", def_ref("Frequency")),
            ("missing", timestamps()),
            ("group_by", group_by()),
        ])),
    );
    defs.insert(
        "DateList".into(),
        object(properties([
            ("values", timestamps()),
            ("missing", timestamps()),
            ("group_by", group_by()),
        ])),
    );
    defs.insert(
        "Dates".into(),
        json!({
            "type": "object",
            "if": { "required": ["values"] },
            "then": def_ref("DateList"),
            "else": def_ref("Interval"),
        }),
    );

    defs.insert(
        "Output".into(),
        object(properties([
            ("statistics_end", def_ref("StatisticsEnd")),
            ("chunking", json!({ "type": "object" })),
            ("dtype", json!({ "type": "string", "default": "float32" })),
            ("flatten_grid", json!({ "type": "boolean", "default": true })),
            ("order_by", json!({ "type": "array", "items": { "type": "string" } })),
            ("remapping", json!({ "type": "object" })),
            ("statistics", json!({ "type": ["object", "string"] })),
        ])),
    );
    defs.insert(
        "Build".into(),
        object(properties([
            ("group_by", def_ref("GroupBy")),
            ("use_grib_paramid", json!({ "type": "boolean", "default": false })),
            ("variable_naming", json!({ "type": "string" })),
        ])),
    );
    defs.insert(
        "Statistics".into(),
        object(properties([
            ("end", def_ref("StatisticsEnd")),
            (
                "allow_nans",
                json!({ "type": "array", "items": { "type": "string" }, "default": [] }),
            ),
        ])),
    );
    defs.insert("Common".into(), json!({ "type": "object" }));

    defs
}
