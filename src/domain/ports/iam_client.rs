use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::models::{AccessKeyMetadata, Credentials, KeyStatus};

/// Error reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The request was refused and repeating it will not help
    /// (permissions, quota, unknown entity).
    #[error("{operation} rejected ({code}): {message}")]
    Rejected {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// Throttling, service faults, network failures or credentials that
    /// have not propagated yet.
    #[error("{operation} failed transiently ({code}): {message}")]
    Transient {
        operation: &'static str,
        code: String,
        message: String,
    },
}

impl ProviderError {
    pub fn rejected(operation: &'static str, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transient(operation: &'static str, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Rejected { code, .. } | Self::Transient { code, .. } => code,
        }
    }
}

/// Access-key operations against the provider, bound to one set of credentials.
///
/// Every call is authenticated with the credentials the client was built from.
#[async_trait]
pub trait IamClient: Send + Sync {
    /// Name of the user the session is authenticated as.
    async fn current_user(&self) -> Result<String, ProviderError>;

    /// All access keys of `user_name`, following pagination until exhausted.
    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKeyMetadata>, ProviderError>;

    /// Create a new access key for `user_name`.
    async fn create_access_key(&self, user_name: &str) -> Result<Credentials, ProviderError>;

    /// Delete the access key `access_key_id` of `user_name`.
    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), ProviderError>;

    /// Change the status of an access key without deleting it.
    async fn update_access_key_status(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), ProviderError>;
}

/// Builds provider sessions from static credentials.
#[async_trait]
pub trait IamConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn IamClient>, ProviderError>;
}
