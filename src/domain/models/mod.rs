//! Domain models for credential rotation.

pub mod config;
pub mod credentials;
pub mod rotation;

pub use config::{Config, LoggingConfig, RetryConfig, RotationConfig};
pub use credentials::{
    AccessKeyMetadata, Credentials, KeyStatus, OldCredentials, ProfileEntry, RotationContext,
};
pub use rotation::{ProfileReport, RotationOutcome, RotationState, RunReport};
