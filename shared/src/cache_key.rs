//! Cache key construction with geographic bucketing
//!
//! Nearby queries are folded onto the same grid point so they share a cache
//! entry. Keys have the layout
//! `weather:v1:lat=<5dp>:lon=<5dp>:units=<u>:lang=<l>:exclude=<csv>`.

/// Version tag prefixed to every key; bump when the cached payload shape changes
pub const CACHE_KEY_VERSION: &str = "weather:v1";

/// Default bucket size in degrees (about 5.5 km of latitude)
pub const DEFAULT_BUCKET_DEGREES: f64 = 0.05;

const ZERO_EPSILON: f64 = 0.000_000_1;

/// Round `value` to the nearest multiple of `bucket_degrees`.
///
/// Results within 1e-7 of zero collapse to exactly `0.0` so that `-0.0`
/// and float noise never produce two keys for the same bucket. A
/// non-positive bucket size leaves the value untouched.
pub fn bucket_coordinate(value: f64, bucket_degrees: f64) -> f64 {
    if bucket_degrees <= 0.0 {
        return value;
    }

    let bucketed = (value / bucket_degrees).round() * bucket_degrees;
    if bucketed.abs() < ZERO_EPSILON {
        0.0
    } else {
        bucketed
    }
}

/// Build the cache key for a query.
///
/// `exclude` entries are lower-cased, de-duplicated and sorted, so the
/// key does not depend on their order or case. Bucketed coordinates are
/// clamped back into the valid latitude/longitude range.
pub fn build_cache_key<S: AsRef<str>>(
    lat: f64,
    lon: f64,
    units: &str,
    lang: &str,
    exclude: &[S],
    bucket_degrees: f64,
) -> String {
    let bucket_lat = bucket_coordinate(lat, bucket_degrees).clamp(-90.0, 90.0);
    let bucket_lon = bucket_coordinate(lon, bucket_degrees).clamp(-180.0, 180.0);

    let mut exclude: Vec<String> = exclude
        .iter()
        .map(|e| e.as_ref().trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    exclude.sort();
    exclude.dedup();

    format!(
        "{}:lat={:.5}:lon={:.5}:units={}:lang={}:exclude={}",
        CACHE_KEY_VERSION,
        bucket_lat,
        bucket_lon,
        units,
        lang,
        exclude.join(",")
    )
}
