//! Recipe document model: the typed form of a validated recipe.

use std::collections::HashSet;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::dates::{DateError, Frequency, Timestamp};
use crate::input::{Input, CONCAT, DATES, JOIN, PIPE};
use crate::number;

/// Legacy fields still accepted but reported as deprecated, as
/// (JSON pointer into the recipe, advice) pairs.
pub const DEPRECATED_FIELDS: [(&str, &str); 6] = [
    ("/copyright", "set `attribution` instead"),
    ("/purpose", "this field is ignored"),
    ("/config_format_version", "this field is ignored"),
    ("/status", "this field is ignored"),
    ("/dataset_status", "this field is ignored"),
    ("/dates/group_by", "set `build.group_by` instead"),
];

/// Period used to group dates into build chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupPeriod {
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "MMDD")]
    MonthDay,
}

impl GroupPeriod {
    pub const NAMES: [&'static str; 4] = ["monthly", "daily", "weekly", "MMDD"];
}

/// Either a fixed number of dates per group or a calendar period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupBy {
    Count(i64),
    Period(GroupPeriod),
}

impl<'de> Deserialize<'de> for GroupBy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => number::from_number(&n)
                .map(GroupBy::Count)
                .ok_or_else(|| D::Error::custom(format!("group_by {n} is not an i64 integer"))),
            other => serde_json::from_value(other)
                .map(GroupBy::Period)
                .map_err(D::Error::custom),
        }
    }
}

impl Default for GroupBy {
    fn default() -> Self {
        GroupBy::Period(GroupPeriod::Monthly)
    }
}

/// End of the statistics window: a timestamp or a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatisticsEnd {
    Year(i64),
    Timestamp(Timestamp),
}

impl<'de> Deserialize<'de> for StatisticsEnd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => number::from_number(&n)
                .map(StatisticsEnd::Year)
                .ok_or_else(|| D::Error::custom(format!("year {n} is not an i64 integer"))),
            other => serde_json::from_value(other)
                .map(StatisticsEnd::Timestamp)
                .map_err(D::Error::custom),
        }
    }
}

/// Dates described by a start, an end and a frequency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Interval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<Timestamp>>,
    /// Deprecated.
    #[serde(default)]
    pub group_by: GroupBy,
}

impl Interval {
    /// Every date from `start` to `end` inclusive, stepping by `frequency`.
    pub fn enumerate(&self) -> Result<Vec<Timestamp>, DateError> {
        let start = self.start.ok_or(DateError::IncompleteInterval("start"))?;
        let end = self.end.ok_or(DateError::IncompleteInterval("end"))?;
        let frequency = self
            .frequency
            .ok_or(DateError::IncompleteInterval("frequency"))?;
        if end < start {
            return Err(DateError::EndBeforeStart { start, end });
        }

        let mut dates = Vec::new();
        let mut current = Some(start);
        while let Some(date) = current.filter(|d| *d <= end) {
            dates.push(date);
            current = date.checked_add(frequency);
        }
        Ok(dates)
    }
}

/// Dates listed explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Timestamp>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<Timestamp>>,
    /// Deprecated.
    #[serde(default)]
    pub group_by: GroupBy,
}

/// The `dates` section. A block holding a `values` key is a [`DateList`];
/// anything else is an [`Interval`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Dates {
    Interval(Interval),
    List(DateList),
}

impl Dates {
    pub fn missing(&self) -> &[Timestamp] {
        let missing = match self {
            Dates::Interval(interval) => &interval.missing,
            Dates::List(list) => &list.missing,
        };
        missing.as_deref().unwrap_or_default()
    }

    /// Concrete dates of the recipe, in order, without the `missing` ones.
    pub fn resolve(&self) -> Result<Vec<Timestamp>, DateError> {
        let all = match self {
            Dates::Interval(interval) => interval.enumerate()?,
            Dates::List(list) => list.values.clone().unwrap_or_default(),
        };
        let missing: HashSet<&Timestamp> = self.missing().iter().collect();
        Ok(all.into_iter().filter(|d| !missing.contains(d)).collect())
    }
}

impl<'de> Deserialize<'de> for Dates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let block = Map::<String, Value>::deserialize(deserializer)?;
        let is_list = block.contains_key("values");
        let value = Value::Object(block);
        let dates = if is_list {
            serde_json::from_value(value).map(Dates::List)
        } else {
            serde_json::from_value(value).map(Dates::Interval)
        };
        dates.map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics_end: Option<StatisticsEnd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking: Option<Map<String, Value>>,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    #[serde(default = "default_true")]
    pub flatten_grid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remapping: Option<Map<String, Value>>,
    /// A mapping of options or the name of a single statistics flavour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            statistics_end: None,
            chunking: None,
            dtype: default_dtype(),
            flatten_grid: true,
            order_by: None,
            remapping: None,
            statistics: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Build {
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub use_grib_paramid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_naming: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Statistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<StatisticsEnd>,
    #[serde(default)]
    pub allow_nans: Vec<String>,
}

/// `aliases` may be a mapping or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Aliases {
    Mapping(Map<String, Value>),
    List(Vec<Value>),
}

/// A dataset recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_unknown")]
    pub licence: String,
    #[serde(default = "default_unknown")]
    pub attribution: String,

    pub dates: Dates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Input>,

    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub build: Build,
    #[serde(default)]
    pub statistics: Statistics,
    /// Free-form settings shared across steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Aliases>,

    // Legacy top-level settings
    #[serde(default = "default_true")]
    pub flatten_grid: bool,
    #[serde(
        default = "default_ensemble_dimension",
        deserialize_with = "number::deserialize"
    )]
    pub ensemble_dimension: i64,

    // Deprecated, see DEPRECATED_FIELDS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(
        default,
        deserialize_with = "number::option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub config_format_version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_status: Option<String>,
}

fn default_dtype() -> String {
    "float32".to_string()
}

fn default_unknown() -> String {
    "unknown".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ensemble_dimension() -> i64 {
    2
}

const DATES_GROUP_BY: &str = "/dates/group_by";

fn deprecation_warning(field: &str, advice: &str) -> String {
    format!("'{field}' is deprecated: {advice}")
}

/// Deprecation warnings for the legacy fields present in a raw recipe,
/// including `group_by` in the dates of dates-join blocks.
pub fn deprecation_warnings(config: &Value) -> Vec<String> {
    let mut warnings: Vec<String> = DEPRECATED_FIELDS
        .iter()
        .filter(|(pointer, _)| config.pointer(pointer).is_some())
        .map(|(pointer, advice)| {
            deprecation_warning(&pointer.trim_start_matches('/').replace('/', "."), advice)
        })
        .collect();

    if let Some(input) = config.get("input") {
        input_deprecations(input, "input", &mut warnings);
    }
    warnings
}

/// Walks combinator lists only; step bodies are opaque.
fn input_deprecations(node: &Value, path: &str, warnings: &mut Vec<String>) {
    let Some(map) = node.as_object() else {
        return;
    };

    if node.pointer(DATES_GROUP_BY).is_some() {
        let advice = DEPRECATED_FIELDS
            .iter()
            .find(|(pointer, _)| *pointer == DATES_GROUP_BY)
            .map_or("", |(_, advice)| *advice);
        warnings.push(deprecation_warning(&format!("{path}.{DATES}.group_by"), advice));
    }

    for key in [PIPE, JOIN, CONCAT] {
        if let Some(Value::Array(items)) = map.get(key) {
            for (i, item) in items.iter().enumerate() {
                input_deprecations(item, &format!("{path}.{key}.{i}"), warnings);
            }
        }
    }
}
