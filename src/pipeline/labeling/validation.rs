// Strict validation of the model's answer.
// Locates the JSON object in free-form output, checks all six keys are present,
// and coerces each value to bool. One bad key rejects the whole answer.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::types::{Classification, SpinalLevel, NEED_CHECK_KEY};
use super::ExtractionError;

/// Greedy: first `{` to last `}`, across newlines. The model may reason before
/// the object, and that preamble is discarded.
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Validate raw model output into a full classification.
pub fn validate_response(raw_output: &str) -> Result<Classification, ExtractionError> {
    let candidate = extract_json_region(raw_output)?;
    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| ExtractionError::JsonParsing(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ExtractionError::JsonParsing("top-level value is not an object".into()))?;
    coerce_object(object)
}

/// Locate the candidate JSON region in the model output.
pub fn extract_json_region(raw_output: &str) -> Result<&str, ExtractionError> {
    JSON_OBJECT_RE
        .find(raw_output)
        .map(|m| m.as_str())
        .ok_or(ExtractionError::NoJsonObject)
}

fn coerce_object(object: &Map<String, Value>) -> Result<Classification, ExtractionError> {
    let mut result = Classification::default();
    for level in SpinalLevel::ALL {
        result.set_level(level, required_bool(object, level.key())?);
    }
    result.need_check = required_bool(object, NEED_CHECK_KEY)?;
    Ok(result)
}

fn required_bool(object: &Map<String, Value>, key: &str) -> Result<bool, ExtractionError> {
    let value = object
        .get(key)
        .ok_or_else(|| ExtractionError::MissingKey(key.to_string()))?;
    coerce_bool(value).ok_or_else(|| ExtractionError::NotBoolean {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Accepted forms: JSON booleans, "true"/"false" in any case, and the integers 0 and 1.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}
