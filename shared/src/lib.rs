//! Shared types and models for the weather gateway
//!
//! This crate holds the transport-free part of the domain: query types and
//! their validation, cache key construction, and the normalized weather
//! model served to callers and stored in the cache.

pub mod cache_key;
pub mod models;
pub mod types;
pub mod validation;

pub use cache_key::*;
pub use models::*;
pub use types::*;
pub use validation::*;
