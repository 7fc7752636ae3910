//! Command-line front end over the workbench.

pub mod cli;
pub mod render;
