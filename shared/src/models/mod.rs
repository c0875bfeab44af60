//! Domain models for the weather gateway

mod weather;

pub use weather::*;
