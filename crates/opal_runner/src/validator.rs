//! Validator (C5): a pure function turning a snippet's raw JSON result into
//! a `Partial`, or rejecting it. No I/O, no state — grounded on the same
//! "pure transform before it touches shared state" shape as
//! `casparian_sentinel::catalog_executor`'s intent handling, just applied
//! to data instead of control messages.

use opal_protocol::{Number, Partial};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InvalidPartialError {
    #[error("result is not a JSON object")]
    NotAnObject,

    #[error("key {0:?} does not map to a number")]
    ValueNotANumber(String),

    #[error("key {0:?} maps to a non-finite number")]
    NonFiniteValue(String),
}

/// Validate a raw result. Keys must be strings (guaranteed by JSON object
/// syntax) mapping to finite numbers; any other shape is rejected whole
/// (the spec does not partially accept a malformed result). An
/// object with no usable entries validates to an empty Partial, which the
/// Collector then drops silently (spec's resolution of its open question).
pub fn validate(raw: Value) -> Result<Partial, InvalidPartialError> {
    let object = match raw {
        Value::Object(map) => map,
        _ => return Err(InvalidPartialError::NotAnObject),
    };

    let mut fields = BTreeMap::new();
    for (key, value) in object {
        let number = json_number_to_number(&value)
            .ok_or_else(|| InvalidPartialError::ValueNotANumber(key.clone()))?;
        if !number.is_finite() {
            return Err(InvalidPartialError::NonFiniteValue(key));
        }
        fields.insert(key, number);
    }

    Ok(Partial::new(fields))
}

fn json_number_to_number(value: &Value) -> Option<Number> {
    let n = value.as_number()?;
    if let Some(i) = n.as_i64() {
        Some(Number::from(i))
    } else {
        n.as_f64().map(Number::from)
    }
}
