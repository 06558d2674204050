//! Domain errors for credential rotation.

use std::path::PathBuf;
use thiserror::Error;

use super::models::RotationState;
use super::ports::ProviderError;

/// Errors raised while enumerating or rotating profiles.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The local credentials store does not exist. Fatal for the whole run.
    #[error("Unable to locate credentials file at {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Profile '{0}' not found in credentials file")]
    ProfileNotFound(String),

    #[error("Could not find keys for profile '{0}'")]
    IncompleteProfile(String),

    #[error("{count} access keys found for profile '{profile}'; rerun with --force to delete the unused one")]
    MultipleKeysPresent { profile: String, count: usize },

    #[error("Multiple access keys found for profile '{profile}' but none differs from the key in use")]
    NoUnusedKey { profile: String },

    #[error("Provider rejected the request: {0}")]
    ProviderRejected(ProviderError),

    #[error("Provider request kept failing: {0}")]
    ProviderTransientFault(ProviderError),

    #[error("Credentials file error: {0}")]
    Store(StoreError),

    #[error("Invalid rotation state transition from {from} to {to}")]
    InvalidTransition { from: RotationState, to: RotationState },
}

impl From<ProviderError> for RotationError {
    fn from(err: ProviderError) -> Self {
        if err.is_transient() {
            Self::ProviderTransientFault(err)
        } else {
            Self::ProviderRejected(err)
        }
    }
}

impl From<StoreError> for RotationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => Self::ConfigNotFound(path),
            other => Self::Store(other),
        }
    }
}

/// Errors from reading or writing the local credentials store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credentials file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Section '{0}' not found")]
    MissingSection(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RotationResult<T> = Result<T, RotationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_maps_by_kind() {
        let transient = ProviderError::transient("DeleteAccessKey", "Throttling", "slow down");
        assert!(matches!(
            RotationError::from(transient),
            RotationError::ProviderTransientFault(_)
        ));

        let rejected = ProviderError::rejected("CreateAccessKey", "LimitExceeded", "too many keys");
        assert!(matches!(
            RotationError::from(rejected),
            RotationError::ProviderRejected(_)
        ));
    }

    #[test]
    fn test_missing_store_is_config_not_found() {
        let err: RotationError = StoreError::NotFound(PathBuf::from("/nope")).into();
        assert!(matches!(err, RotationError::ConfigNotFound(p) if p == PathBuf::from("/nope")));
    }

    #[test]
    fn test_missing_section_from_store_error() {
        let err: RotationError = StoreError::MissingSection("dev".to_string()).into();
        assert_eq!(err.to_string(), "Credentials file error: Section 'dev' not found");
    }
}
