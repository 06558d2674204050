//! CLI command implementations.

pub mod rotate;
