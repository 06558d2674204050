//! Domain layer: rotation models, provider ports and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;
