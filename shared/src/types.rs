//! Query types shared by the validator, the cache key builder and the backend

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unit system requested from the upstream provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub const ALLOWED: &'static [&'static str] = &["metric", "imperial", "standard"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }
}

impl FromStr for Units {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response blocks the caller may ask the provider to leave out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExcludeBlock {
    Current,
    Minutely,
    Hourly,
    Daily,
    Alerts,
}

impl ExcludeBlock {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcludeBlock::Current => "current",
            ExcludeBlock::Minutely => "minutely",
            ExcludeBlock::Hourly => "hourly",
            ExcludeBlock::Daily => "daily",
            ExcludeBlock::Alerts => "alerts",
        }
    }
}

impl FromStr for ExcludeBlock {
    type Err = ();

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "current" => Ok(ExcludeBlock::Current),
            "minutely" => Ok(ExcludeBlock::Minutely),
            "hourly" => Ok(ExcludeBlock::Hourly),
            "daily" => Ok(ExcludeBlock::Daily),
            "alerts" => Ok(ExcludeBlock::Alerts),
            _ => Err(()),
        }
    }
}

/// A validated geographic weather query.
///
/// Built once per request by [`crate::validate_onecall_params`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoQuery {
    pub lat: f64,
    pub lon: f64,
    pub units: Units,
    pub lang: String,
    pub exclude: BTreeSet<ExcludeBlock>,
    pub include_raw: bool,
}

impl GeoQuery {
    /// Exclude list as the provider and the cache key expect it:
    /// alphabetically sorted, comma separated.
    pub fn exclude_csv(&self) -> String {
        let mut names: Vec<&str> = self.exclude.iter().map(ExcludeBlock::as_str).collect();
        names.sort_unstable();
        names.join(",")
    }

    /// Cache key for this query at the given bucket size
    pub fn cache_key(&self, bucket_degrees: f64) -> String {
        let exclude: Vec<&str> = self.exclude.iter().map(ExcludeBlock::as_str).collect();
        crate::cache_key::build_cache_key(
            self.lat,
            self.lon,
            self.units.as_str(),
            &self.lang,
            &exclude,
            bucket_degrees,
        )
    }
}

/// Coordinates echoed back to the caller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl From<&GeoQuery> for Location {
    fn from(query: &GeoQuery) -> Self {
        Self {
            lat: query.lat,
            lon: query.lon,
        }
    }
}
