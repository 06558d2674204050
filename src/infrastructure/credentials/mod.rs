//! Credentials management infrastructure
//!
//! Local shared-credentials file handling:
//! - Default location resolution
//! - Profile enumeration
//! - In-place key pair updates

pub mod store;

use std::path::PathBuf;

pub use store::{AtomicWriter, CredentialsStore, StoreWriter};

/// Environment variable overriding the credentials file location.
pub const CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Default credentials file: `$AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/credentials`.
pub fn default_credentials_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CREDENTIALS_FILE_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}
