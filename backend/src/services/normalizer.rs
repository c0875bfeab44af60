//! Maps provider payloads onto the normalized weather shape

use serde::de::DeserializeOwned;
use serde_json::Value;

use shared::{objects_of, AlertBlock, CurrentBlock, HourlyBlock, NormalizedWeather};

/// Reshape a provider payload. Missing or mistyped sections become empty
/// blocks, and nothing is computed or coerced.
pub fn normalize(payload: &Value, include_raw: bool) -> NormalizedWeather {
    NormalizedWeather {
        current: object_or_default::<CurrentBlock>(payload.get("current")),
        hourly: objects_of::<HourlyBlock>(payload.get("hourly")),
        alerts: objects_of::<AlertBlock>(payload.get("alerts")),
        raw: include_raw.then(|| payload.clone()),
    }
}

/// Drop `raw` from an already normalized result unless the caller wants it
pub fn apply_raw_preference(mut normalized: NormalizedWeather, include_raw: bool) -> NormalizedWeather {
    if !include_raw {
        normalized.raw = None;
    }
    normalized
}

fn object_or_default<T: DeserializeOwned + Default>(value: Option<&Value>) -> T {
    match value {
        Some(value @ Value::Object(_)) => T::deserialize(value).unwrap_or_default(),
        _ => T::default(),
    }
}
