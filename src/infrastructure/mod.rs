//! Infrastructure layer: adapters for the provider, the local credentials
//! file, configuration and logging.

pub mod aws;
pub mod config;
pub mod credentials;
pub mod iam;
pub mod logging;
