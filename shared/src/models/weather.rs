//! Normalized weather models
//!
//! Each block enumerates the provider fields it carries. Every field is an
//! `Option<Value>`: present upstream values are copied verbatim (no type
//! coercion), absent ones become `null`. Nested lists are lenient, and
//! entries that are not JSON objects are dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Weather condition entry (`current.weather[]`, `hourly[].weather[]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherCondition {
    pub id: Option<Value>,
    pub main: Option<Value>,
    pub description: Option<Value>,
    pub icon: Option<Value>,
}

/// Current conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentBlock {
    pub dt: Option<Value>,
    pub sunrise: Option<Value>,
    pub sunset: Option<Value>,
    pub temp: Option<Value>,
    pub feels_like: Option<Value>,
    pub pressure: Option<Value>,
    pub humidity: Option<Value>,
    pub dew_point: Option<Value>,
    pub uvi: Option<Value>,
    pub clouds: Option<Value>,
    pub visibility: Option<Value>,
    pub wind_speed: Option<Value>,
    pub wind_deg: Option<Value>,
    pub wind_gust: Option<Value>,
    #[serde(deserialize_with = "object_list")]
    pub weather: Vec<WeatherCondition>,
}

/// One hour of forecast
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlyBlock {
    pub dt: Option<Value>,
    pub temp: Option<Value>,
    pub feels_like: Option<Value>,
    pub pressure: Option<Value>,
    pub humidity: Option<Value>,
    pub dew_point: Option<Value>,
    pub uvi: Option<Value>,
    pub clouds: Option<Value>,
    pub visibility: Option<Value>,
    pub wind_speed: Option<Value>,
    pub wind_deg: Option<Value>,
    pub wind_gust: Option<Value>,
    #[serde(deserialize_with = "object_list")]
    pub weather: Vec<WeatherCondition>,
    pub pop: Option<Value>,
}

/// Government weather alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertBlock {
    pub sender_name: Option<Value>,
    pub event: Option<Value>,
    pub start: Option<Value>,
    pub end: Option<Value>,
    pub description: Option<Value>,
    #[serde(deserialize_with = "list_or_null")]
    pub tags: Option<Vec<Value>>,
}

/// Stable, provider-independent response shape.
///
/// `raw` holds the untouched provider payload when the caller asked for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedWeather {
    pub current: CurrentBlock,
    #[serde(deserialize_with = "object_list")]
    pub hourly: Vec<HourlyBlock>,
    #[serde(deserialize_with = "object_list")]
    pub alerts: Vec<AlertBlock>,
    pub raw: Option<Value>,
}

/// Map the object entries of a JSON list, ignoring everything else
pub fn objects_of<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| item.is_object())
            .filter_map(|item| T::deserialize(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn object_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(objects_of(Some(&value)))
}

fn list_or_null<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(items)),
        _ => Ok(None),
    }
}
