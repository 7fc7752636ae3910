//! Application layer orchestrating domain logic and infrastructure.

pub mod gateway;
pub mod index;
pub mod outline;
pub mod session;
pub mod snapshot;
pub mod tools;
pub mod tree;
pub mod view;
pub mod workbench;
