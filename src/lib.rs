//! IAM Key Rotator - rotates AWS IAM access keys stored in the shared
//! credentials file.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Rotation models, error taxonomy and the provider port
//! - **Service Layer** (`services`): Profile selection, rotation workflow and retry policy
//! - **Infrastructure Layer** (`infrastructure`): AWS SDK adapter, credentials file, config, logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use iam_key_rotator::{AwsConnector, KeyRotator, RotationSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let rotator = KeyRotator::new(
//!         Arc::new(AwsConnector::new("us-east-1")),
//!         "/home/operator/.aws/credentials",
//!         RotationSettings { apply: true, ..Default::default() },
//!     );
//!     let report = rotator.rotate_all(&["default".to_string()]).await;
//!     assert!(!report.has_failures());
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RotationError, RotationResult, StoreError};
pub use domain::models::{
    AccessKeyMetadata, Config, Credentials, KeyStatus, LoggingConfig, ProfileReport, RetryConfig,
    RotationConfig, RotationOutcome, RotationState, RunReport,
};
pub use domain::ports::{IamClient, IamConnector, ProviderError};
pub use infrastructure::aws::AwsConnector;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::credentials::CredentialsStore;
pub use infrastructure::iam::InMemoryIam;
pub use services::{enumerate_profiles, KeyRotator, RetryPolicy, RotationSettings};
