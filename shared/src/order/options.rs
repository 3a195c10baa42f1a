//! Option-selection payload normalization
//!
//! Ordering clients submit the chosen option values in several shapes: a
//! structured array, a single option object, a map keyed by option id, or
//! any of those JSON-encoded into a string. Everything is normalized here
//! into one canonical list the moment it enters the system, so business
//! logic never inspects the raw shape.
//!
//! Canonical (serialized) form:
//!
//! ```json
//! [{"optionId": 1, "optionName": "Size",
//!   "values": [{"valueId": 3, "valueLabel": "Large", "priceDelta": 0.5}]}]
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// One selected option with its chosen values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOption {
    pub option_id: i64,
    pub option_name: String,
    pub values: Vec<SelectedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedValue {
    pub value_id: i64,
    pub value_label: String,
    /// Absent when the client sent no numeric delta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_delta: Option<f64>,
}

/// Normalized option selection of one order line
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OptionSelection(Vec<SelectedOption>);

impl OptionSelection {
    pub fn new(options: Vec<SelectedOption>) -> Self {
        Self(options)
    }

    /// Normalize any accepted payload shape
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(encoded) => {
                let trimmed = encoded.trim();
                if trimmed.is_empty() {
                    return Ok(Self::default());
                }
                let decoded: Value = serde_json::from_str(trimmed).map_err(|e| {
                    AppError::invalid_option_payload(format!("Options are not valid JSON: {}", e))
                })?;
                if decoded.is_string() {
                    return Err(AppError::invalid_option_payload(
                        "Options are JSON-encoded more than once",
                    ));
                }
                Self::from_value(decoded)
            }
            Value::Array(entries) => entries
                .into_iter()
                .map(|entry| parse_option(entry, None))
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            Value::Object(map) if has_any(&map, OPTION_ID_KEYS) => {
                Ok(Self(vec![parse_option(Value::Object(map), None)?]))
            }
            Value::Object(map) => map
                .into_iter()
                .map(|(key, entry)| {
                    let option_id = key.parse::<i64>().map_err(|_| {
                        AppError::invalid_option_payload(format!(
                            "Option key \"{}\" is not an option id",
                            key
                        ))
                    })?;
                    parse_option(entry, Some(option_id))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            other => Err(AppError::invalid_option_payload(format!(
                "Unsupported options payload: {}",
                other
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|option| option.values.is_empty())
    }

    pub fn options(&self) -> &[SelectedOption] {
        &self.0
    }

    /// At least one value was submitted for this option id
    pub fn includes_option(&self, option_id: i64) -> bool {
        self.0
            .iter()
            .any(|option| option.option_id == option_id && !option.values.is_empty())
    }

    /// Every numeric price delta of every selected value
    pub fn price_deltas(&self) -> impl Iterator<Item = f64> + '_ {
        self.0
            .iter()
            .flat_map(|option| option.values.iter())
            .filter_map(|value| value.price_delta)
    }

    /// Canonical JSON, as stored on the order item
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string())
    }
}

impl<'de> Deserialize<'de> for OptionSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<String> for OptionSelection {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_value(Value::String(value))
    }
}

const OPTION_ID_KEYS: &[&str] = &["optionId", "option_id", "id"];
const OPTION_NAME_KEYS: &[&str] = &["optionName", "option_name", "name"];
const VALUE_ID_KEYS: &[&str] = &["valueId", "value_id", "id"];
const VALUE_LABEL_KEYS: &[&str] = &["valueLabel", "value_label", "label", "name"];
const PRICE_DELTA_KEYS: &[&str] = &["priceDelta", "price_delta"];

fn has_any(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| map.contains_key(*key))
}

fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

/// Ids arrive as numbers or numeric strings
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// `entry` is either an option object or, for keyed maps, a bare value list
fn parse_option(entry: Value, keyed_id: Option<i64>) -> Result<SelectedOption, AppError> {
    let map = match entry {
        Value::Object(map) => map,
        values @ Value::Array(_) if keyed_id.is_some() => {
            let mut map = Map::new();
            map.insert("values".to_string(), values);
            map
        }
        other => {
            return Err(AppError::invalid_option_payload(format!(
                "Option entry must be an object, got {}",
                other
            )));
        }
    };

    let option_id = match (field(&map, OPTION_ID_KEYS).and_then(as_id), keyed_id) {
        (Some(id), _) | (None, Some(id)) => id,
        (None, None) => {
            return Err(AppError::invalid_option_payload("Option entry has no optionId"));
        }
    };

    let values = match map.get("values").or_else(|| map.get("value")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| parse_value(v, option_id))
            .collect::<Result<Vec<_>, _>>()?,
        Some(single) => vec![parse_value(single, option_id)?],
    };

    Ok(SelectedOption {
        option_id,
        option_name: as_label(field(&map, OPTION_NAME_KEYS)),
        values,
    })
}

fn parse_value(value: &Value, option_id: i64) -> Result<SelectedValue, AppError> {
    let Value::Object(map) = value else {
        return Err(AppError::invalid_option_payload(format!(
            "Value of option {} must be an object",
            option_id
        )));
    };

    let value_id = field(map, VALUE_ID_KEYS).and_then(as_id).ok_or_else(|| {
        AppError::invalid_option_payload(format!("Value of option {} has no valueId", option_id))
    })?;

    // Only real, finite numbers count as a delta
    let price_delta = field(map, PRICE_DELTA_KEYS)
        .and_then(Value::as_f64)
        .filter(|delta| delta.is_finite());

    Ok(SelectedValue {
        value_id,
        value_label: as_label(field(map, VALUE_LABEL_KEYS)),
        price_delta,
    })
}
