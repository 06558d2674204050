//! Common test utilities for integration tests
//!
//! Provides shared fixtures for rotation tests: a temporary credentials
//! file, a seeded in-memory provider and fast rotation settings.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use iam_key_rotator::{Credentials, InMemoryIam, KeyStatus, RetryPolicy, RotationSettings};

pub const ORIGINAL_KEY_ID: &str = "AKIAORIGINAL00000001";
pub const ORIGINAL_SECRET: &str = "original/secret/key";
pub const USER: &str = "deploy-bot";

/// Credentials file with a comment, a rotatable profile and an unrelated one.
pub const CREDENTIALS_FIXTURE: &str = "\
# managed by hand
[default]
aws_access_key_id = AKIAORIGINAL00000001
aws_secret_access_key = original/secret/key
region = eu-west-1

[other]
aws_access_key_id=AKIAOTHER
aws_secret_access_key=other-secret
";

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write `contents` to a fresh credentials file.
pub fn temp_credentials(contents: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join("credentials");
    std::fs::write(&path, contents).expect("Failed to write credentials file");
    (dir, path)
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("Failed to read credentials file")
}

pub fn original_credentials() -> Credentials {
    Credentials::new(ORIGINAL_KEY_ID, ORIGINAL_SECRET)
}

/// Provider holding the `[default]` profile's key.
pub fn seeded_provider() -> InMemoryIam {
    let iam = InMemoryIam::new();
    iam.seed_key(USER, &original_credentials(), KeyStatus::Active);
    iam
}

/// Settings that never sleep for long.
pub fn fast_settings(apply: bool) -> RotationSettings {
    RotationSettings {
        force: false,
        safe: false,
        apply,
        settle_delay: Duration::ZERO,
        retry: RetryPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
            Duration::from_millis(200),
        ),
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
