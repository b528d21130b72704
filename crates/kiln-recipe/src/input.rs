//! The `input` tree of a recipe: registered steps and the combinators that
//! compose them.
//!
//! Every node is a mapping identified by its key. `pipe`, `join` and
//! `concat` hold lists of nodes; a mapping holding `dates` is a dates-join
//! block (`{dates: <interval>, join: [...]}`); any other single key names a
//! registered step.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::Interval;

pub const PIPE: &str = "pipe";
pub const JOIN: &str = "join";
pub const CONCAT: &str = "concat";
pub const DATES: &str = "dates";

/// Keys that can never name a registered step.
pub const COMBINATOR_KEYS: [&str; 4] = [PIPE, DATES, CONCAT, JOIN];

/// A registered source or filter invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Step(Step),
    /// Each node feeds the next.
    Pipe(Vec<Input>),
    /// Nodes combined over the same dates.
    Join(Vec<Input>),
    /// Nodes over different date ranges, stacked in time.
    Concat(Vec<Input>),
    /// A join restricted to its own interval.
    DatesJoin { dates: Interval, join: Vec<Input> },
}

impl Input {
    /// The key that identifies this node in a document.
    pub fn key(&self) -> &str {
        match self {
            Input::Step(step) => &step.name,
            Input::Pipe(_) => PIPE,
            Input::Join(_) => JOIN,
            Input::Concat(_) => CONCAT,
            Input::DatesJoin { .. } => DATES,
        }
    }

    /// All steps of the tree in document order.
    pub fn steps(&self) -> Vec<&Step> {
        let mut steps = Vec::new();
        self.collect_steps(&mut steps);
        steps
    }

    fn collect_steps<'a>(&'a self, out: &mut Vec<&'a Step>) {
        match self {
            Input::Step(step) => out.push(step),
            Input::Pipe(nodes) | Input::Join(nodes) | Input::Concat(nodes) => {
                for node in nodes {
                    node.collect_steps(out);
                }
            }
            Input::DatesJoin { join, .. } => {
                for node in join {
                    node.collect_steps(out);
                }
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DatesJoinBlock {
    dates: Interval,
    join: Vec<Input>,
}

impl<'de> Deserialize<'de> for Input {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;

        if object.contains_key(DATES) {
            let block: DatesJoinBlock =
                serde_json::from_value(Value::Object(object)).map_err(D::Error::custom)?;
            return Ok(Input::DatesJoin {
                dates: block.dates,
                join: block.join,
            });
        }

        if object.len() != 1 {
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            return Err(D::Error::custom(format!(
                "an input node must have exactly one key, found {} ({})",
                keys.len(),
                keys.join(", ")
            )));
        }

        let Some((key, body)) = object.into_iter().next() else {
            return Err(D::Error::custom("an input node must have exactly one key"));
        };
        let nodes = |body: Value| serde_json::from_value::<Vec<Input>>(body).map_err(D::Error::custom);
        match key.as_str() {
            PIPE => nodes(body).map(Input::Pipe),
            JOIN => nodes(body).map(Input::Join),
            CONCAT => nodes(body).map(Input::Concat),
            _ => Ok(Input::Step(Step { name: key, body })),
        }
    }
}

impl Serialize for Input {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Input::Step(step) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&step.name, &step.body)?;
                map.end()
            }
            Input::Pipe(nodes) | Input::Join(nodes) | Input::Concat(nodes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(self.key(), nodes)?;
                map.end()
            }
            Input::DatesJoin { dates, join } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(DATES, dates)?;
                map.serialize_entry(JOIN, join)?;
                map.end()
            }
        }
    }
}
