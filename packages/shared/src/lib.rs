//! Utilities shared between the Hiroba server binary and its library crates.

pub mod logger;
pub mod time;
