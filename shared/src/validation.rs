//! Validation of inbound onecall query parameters
//!
//! Every field is checked and every failure is reported, so a caller can
//! fix all of them in one round trip.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ExcludeBlock, GeoQuery, Units};

/// Raw query parameters as received on the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OneCallParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub units: Option<String>,
    pub lang: Option<String>,
    pub exclude: Option<String>,
    pub raw: Option<String>,
}

/// Field name to message, in field-name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate raw parameters into a [`GeoQuery`].
///
/// Defaults: `units=metric`, `lang=en`, no exclusions, `raw=false`.
pub fn validate_onecall_params(params: &OneCallParams) -> Result<GeoQuery, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let lat = validate_coordinate(&mut errors, "lat", params.lat.as_deref(), 90.0);
    let lon = validate_coordinate(&mut errors, "lon", params.lon.as_deref(), 180.0);

    let units = match params.units.as_deref().unwrap_or("metric").parse::<Units>() {
        Ok(units) => Some(units),
        Err(()) => {
            errors.add("units", "units must be metric, imperial, or standard");
            None
        }
    };

    let lang = params.lang.clone().unwrap_or_else(|| "en".to_string());
    if lang.is_empty() {
        errors.add("lang", "lang must be a non-empty string");
    }

    let exclude = match parse_exclude(params.exclude.as_deref().unwrap_or("")) {
        Ok(exclude) => exclude,
        Err(()) => {
            errors.add("exclude", "exclude has invalid values");
            BTreeSet::new()
        }
    };

    let include_raw = match parse_raw_flag(params.raw.as_deref()) {
        Ok(flag) => flag,
        Err(()) => {
            errors.add("raw", "raw must be 0 or 1");
            false
        }
    };

    match (lat, lon, units) {
        (Some(lat), Some(lon), Some(units)) if errors.is_empty() => Ok(GeoQuery {
            lat,
            lon,
            units,
            lang,
            exclude,
            include_raw,
        }),
        _ => Err(errors),
    }
}

fn validate_coordinate(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    limit: f64,
) -> Option<f64> {
    let raw = match raw.map(str::trim) {
        None | Some("") => {
            errors.add(field, format!("{} is required", field));
            return None;
        }
        Some(raw) => raw,
    };

    let value = match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            errors.add(field, format!("{} must be a float", field));
            return None;
        }
    };

    if value < -limit || value > limit {
        errors.add(
            field,
            format!("{} must be between -{} and {}", field, limit, limit),
        );
        return None;
    }

    Some(value)
}

/// Comma separated, case-insensitive; blank items are ignored
fn parse_exclude(raw: &str) -> Result<BTreeSet<ExcludeBlock>, ()> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::parse::<ExcludeBlock>)
        .collect()
}

fn parse_raw_flag(raw: Option<&str>) -> Result<bool, ()> {
    match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
        None | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(_) => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(lat: &str, lon: &str) -> OneCallParams {
        OneCallParams {
            lat: Some(lat.to_string()),
            lon: Some(lon.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let query = validate_onecall_params(&params("48.8566", "2.3522")).unwrap();
        assert_eq!(query.lat, 48.8566);
        assert_eq!(query.lon, 2.3522);
        assert_eq!(query.units, Units::Metric);
        assert_eq!(query.lang, "en");
        assert!(query.exclude.is_empty());
        assert!(!query.include_raw);
    }

    #[test]
    fn test_missing_lat_and_lon_both_reported() {
        let errors = validate_onecall_params(&OneCallParams::default()).unwrap_err();
        assert_eq!(errors.get("lat"), Some("lat is required"));
        assert_eq!(errors.get("lon"), Some("lon is required"));
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let errors = validate_onecall_params(&params("91.0", "-180.5")).unwrap_err();
        assert_eq!(errors.get("lat"), Some("lat must be between -90 and 90"));
        assert_eq!(errors.get("lon"), Some("lon must be between -180 and 180"));
    }

    #[test]
    fn test_boundaries_are_valid() {
        assert!(validate_onecall_params(&params("90", "-180")).is_ok());
        assert!(validate_onecall_params(&params("-90", "180")).is_ok());
    }

    #[test]
    fn test_non_numeric_coordinates() {
        let errors = validate_onecall_params(&params("north", "NaN")).unwrap_err();
        assert_eq!(errors.get("lat"), Some("lat must be a float"));
        assert_eq!(errors.get("lon"), Some("lon must be a float"));
    }

    #[test]
    fn test_every_invalid_field_is_listed() {
        let errors = validate_onecall_params(&OneCallParams {
            lat: Some("100".to_string()),
            lon: Some("abc".to_string()),
            units: Some("kelvin".to_string()),
            lang: Some(String::new()),
            exclude: Some("alerts,weekly".to_string()),
            raw: Some("yes".to_string()),
        })
        .unwrap_err();

        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["exclude", "lang", "lat", "lon", "raw", "units"]);
    }

    #[test]
    fn test_exclude_is_case_insensitive_and_deduplicated() {
        let query = validate_onecall_params(&OneCallParams {
            exclude: Some(" Hourly,ALERTS,,hourly ".to_string()),
            ..params("1", "2")
        })
        .unwrap();

        assert_eq!(query.exclude.len(), 2);
        assert_eq!(query.exclude_csv(), "alerts,hourly");
    }

    #[test]
    fn test_raw_flag_values() {
        for (raw, expected) in [("1", true), ("true", true), ("0", false), ("FALSE", false)] {
            let query = validate_onecall_params(&OneCallParams {
                raw: Some(raw.to_string()),
                ..params("1", "2")
            })
            .unwrap();
            assert_eq!(query.include_raw, expected, "raw={}", raw);
        }
    }

    #[test]
    fn test_units_are_case_sensitive() {
        let errors = validate_onecall_params(&OneCallParams {
            units: Some("Imperial".to_string()),
            ..params("1", "2")
        })
        .unwrap_err();
        assert!(errors.get("units").is_some());
    }

    #[test]
    fn test_errors_serialize_as_flat_map() {
        let errors = validate_onecall_params(&params("", "2")).unwrap_err();
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"lat": "lat is required"}));
    }
}
