//! Business logic services for the weather gateway

pub mod cache;
pub mod normalizer;
pub mod rate_limiter;
pub mod weather;

pub use cache::{CacheEntry, CachePolicy, ResultCache};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use weather::{OneCallResponse, ResponseMeta, UpstreamPreview, WeatherService};
