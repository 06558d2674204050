//! Port trait definitions (Hexagonal Architecture)
//!
//! The rotation service only talks to the identity provider through these
//! traits. The AWS SDK adapter implements them for production use and an
//! in-memory provider implements them for tests.

pub mod iam_client;

pub use iam_client::{IamClient, IamConnector, ProviderError};
