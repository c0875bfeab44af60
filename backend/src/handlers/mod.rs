//! HTTP request handlers

pub mod health;
pub mod weather;

pub use health::{healthz, readyz};
pub use weather::{debug_upstream_onecall, get_onecall};
