//! Run parameter translation
//!
//! Caller-supplied parameters arrive as a JSON object and leave as engine
//! flags. The translation is total over the accepted input:
//! - key `k` becomes the flag `--k`
//! - strings pass through verbatim, numbers and booleans use their JSON text
//! - `null`, arrays and objects are rejected
//!
//! Keys that collide with a reserved engine flag are rejected before any run
//! is created, so the engine never sees duplicate or conflicting flags.

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

use crate::error::ValidationError;

/// Validated parameters ready to be passed to the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineParams(BTreeMap<String, String>);

impl EngineParams {
    /// Validates and translates a JSON parameter map
    ///
    /// # Arguments
    /// * `params` - Parameters as supplied by the caller
    /// * `reserved` - Flag names owned by the launcher (leading dashes ignored)
    pub fn from_json(
        params: &HashMap<String, JsonValue>,
        reserved: &[String],
    ) -> Result<Self, ValidationError> {
        let mut translated = BTreeMap::new();

        for (key, value) in params {
            validate_key(key, reserved)?;
            translated.insert(key.clone(), stringify(key, value)?);
        }

        Ok(Self(translated))
    }

    /// Renders the parameters as `--key value` argument pairs
    ///
    /// Each flag is independent; the engine must not rely on their order.
    pub fn to_args(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(key, value)| [format!("--{}", key), value.clone()])
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn validate_key(key: &str, reserved: &[String]) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }

    let well_formed = !key.starts_with('-')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !well_formed {
        return Err(ValidationError::InvalidKey(key.to_string()));
    }

    if reserved
        .iter()
        .any(|flag| flag.trim_start_matches('-').eq_ignore_ascii_case(key))
    {
        return Err(ValidationError::ReservedKey(key.to_string()));
    }

    Ok(())
}

fn stringify(key: &str, value: &JsonValue) -> Result<String, ValidationError> {
    let unsupported = |kind| ValidationError::UnsupportedValue {
        key: key.to_string(),
        kind,
    };

    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Null => Err(unsupported("null")),
        JsonValue::Array(_) => Err(unsupported("array")),
        JsonValue::Object(_) => Err(unsupported("object")),
    }
}
