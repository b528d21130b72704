//! Integer fields as they arrive from JSON and YAML documents.
//!
//! A JSON Schema `integer` matches whole-number floats such as `6.0`, so
//! every integer field of the recipe model accepts them too.

use std::fmt;

use serde::de::{self, Unexpected, Visitor};
use serde::Deserializer;
use serde_json::Number;

/// `v` as an `i64` when it is a whole number within range.
pub(crate) fn whole(v: f64) -> Option<i64> {
    // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// `n` as an `i64`, accepting whole-number floats.
pub(crate) fn from_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        if n.is_f64() {
            n.as_f64().and_then(whole)
        } else {
            None
        }
    })
}

struct IntegerVisitor;

impl Visitor<'_> for IntegerVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer within the range of i64")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        whole(v).ok_or_else(|| E::invalid_value(Unexpected::Float(v), &self))
    }
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(IntegerVisitor)
}

pub(crate) mod option {
    use serde::Deserializer;

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        super::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize")]
        value: i64,
    }

    fn read(value: serde_json::Value) -> Result<i64, serde_json::Error> {
        serde_json::from_value::<Holder>(json!({ "value": value })).map(|h| h.value)
    }

    #[test]
    fn test_whole_floats_accepted() {
        assert_eq!(read(json!(6)).unwrap(), 6);
        assert_eq!(read(json!(6.0)).unwrap(), 6);
        assert_eq!(read(json!(-2.0)).unwrap(), -2);
    }

    #[test]
    fn test_fractions_and_overflow_rejected() {
        assert!(read(json!(6.5)).is_err());
        assert!(read(json!(u64::MAX)).is_err());
        assert!(read(json!(1e19)).is_err());
        assert!(read(json!("6")).is_err());
    }

    #[test]
    fn test_from_number() {
        assert_eq!(from_number(&Number::from(7)), Some(7));
        assert_eq!(from_number(&Number::from(u64::MAX)), None);
        assert_eq!(Number::from_f64(3.0).as_ref().and_then(from_number), Some(3));
        assert_eq!(Number::from_f64(3.25).as_ref().and_then(from_number), None);
    }
}
