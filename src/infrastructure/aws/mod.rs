//! AWS IAM integration
//!
//! - `IamClient` / `IamConnector` over `aws-sdk-iam`
//! - SDK error classification into retryable and permanent failures

pub mod errors;
pub mod iam;

pub use iam::{AwsConnector, AwsIamClient};
