//! Infrastructure adapters for config, snapshot persistence, and built-in tools.

pub mod config;
pub mod store;
pub mod tools;
