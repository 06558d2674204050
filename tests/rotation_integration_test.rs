//! End-to-end rotation scenarios against the in-memory provider and a real
//! credentials file on disk.

mod common;

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use iam_key_rotator::infrastructure::credentials::{AtomicWriter, StoreWriter};
use iam_key_rotator::{
    enumerate_profiles, Credentials, InMemoryIam, KeyRotator, KeyStatus, ProviderError,
    RotationError, RotationOutcome, RotationSettings, RotationState,
};

fn rotator(iam: &InMemoryIam, path: &std::path::Path, settings: RotationSettings) -> KeyRotator<InMemoryIam> {
    KeyRotator::new(Arc::new(iam.clone()), path, settings)
}

/// Fails the first write, optionally cutting the file short first. Later
/// writes (the restore) go through `AtomicWriter` unless `fail_restore`.
#[derive(Default)]
struct BrokenWriter {
    truncate: bool,
    fail_restore: bool,
    writes: AtomicU32,
}

impl StoreWriter for BrokenWriter {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) == 0 {
            if self.truncate {
                std::fs::write(path, &contents[..contents.len().min(20)])?;
            }
            return Err(io::Error::other("No space left on device"));
        }
        if self.fail_restore {
            return Err(io::Error::other("No space left on device"));
        }
        AtomicWriter.write(path, contents)
    }
}

fn rotated_fixture(new_id: &str, new_secret: &str) -> String {
    CREDENTIALS_FIXTURE
        .replace(ORIGINAL_KEY_ID, new_id)
        .replace(ORIGINAL_SECRET, new_secret)
}

#[tokio::test]
async fn test_single_key_is_rotated() {
    setup_test_logging();
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();

    let report = rotator(&iam, &path, fast_settings(true))
        .rotate_profile("default")
        .await;

    assert_eq!(report.outcome, RotationOutcome::Rotated);
    assert_eq!(report.final_state, RotationState::OldKeyDeleted);
    assert_eq!(report.user_name.as_deref(), Some(USER));
    assert_eq!(report.old_key_id.as_deref(), Some(ORIGINAL_KEY_ID));

    let keys = iam.keys_for(USER);
    assert_eq!(keys.len(), 1);
    let new_id = report.new_key_id.expect("new key id");
    assert_eq!(keys[0].access_key_id, new_id);
    assert_ne!(new_id, ORIGINAL_KEY_ID);

    // Only the two key values changed; comments, region and [other] are untouched.
    assert_eq!(read(&path), rotated_fixture(&new_id, "fake-secret-1"));
}

#[tokio::test]
async fn test_old_key_removed_with_new_key() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();

    let report = rotator(&iam, &path, fast_settings(true))
        .rotate_profile("default")
        .await;
    let new_id = report.new_key_id.expect("new key id");

    let calls = iam.mutating_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].operation, "CreateAccessKey");
    assert_eq!(calls[0].authenticated_as, ORIGINAL_KEY_ID);
    assert_eq!(calls[1].operation, "DeleteAccessKey");
    assert_eq!(calls[1].authenticated_as, new_id);
    assert_eq!(calls[1].target.as_deref(), Some(ORIGINAL_KEY_ID));
}

#[tokio::test]
async fn test_two_keys_without_force_is_skipped() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    iam.seed_key(USER, &Credentials::new("AKIASPARE", "spare"), KeyStatus::Active);
    let rotator = rotator(&iam, &path, fast_settings(true));

    for _ in 0..2 {
        let report = rotator.rotate_profile("default").await;
        assert!(matches!(report.outcome, RotationOutcome::Skipped { .. }));
        assert_eq!(report.final_state, RotationState::Skipped);
        assert!(report.new_key_id.is_none());
    }

    assert!(iam.mutating_calls().is_empty());
    assert_eq!(iam.keys_for(USER).len(), 2);
    assert_eq!(read(&path), CREDENTIALS_FIXTURE);
}

#[tokio::test]
async fn test_force_deletes_unused_key_first() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    iam.seed_key(USER, &Credentials::new("AKIASPARE", "spare"), KeyStatus::Active);

    let settings = RotationSettings {
        force: true,
        ..fast_settings(true)
    };
    let report = rotator(&iam, &path, settings).rotate_profile("default").await;

    assert_eq!(report.outcome, RotationOutcome::Rotated);
    let calls = iam.mutating_calls();
    assert_eq!(calls[0].operation, "DeleteAccessKey");
    assert_eq!(calls[0].target.as_deref(), Some("AKIASPARE"));
    assert_eq!(calls[1].operation, "CreateAccessKey");

    let keys = iam.keys_for(USER);
    assert_eq!(keys.len(), 1);
    assert_eq!(Some(keys[0].access_key_id.clone()), report.new_key_id);
}

#[tokio::test]
async fn test_create_failure_leaves_file_untouched() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    iam.fail_creates(ProviderError::rejected(
        "CreateAccessKey",
        "AccessDenied",
        "not authorized to perform iam:CreateAccessKey",
    ));

    let report = rotator(&iam, &path, fast_settings(true))
        .rotate_profile("default")
        .await;

    assert!(report.outcome.is_failure());
    assert_eq!(report.final_state, RotationState::Failed);
    assert_eq!(std::fs::read(&path).unwrap(), CREDENTIALS_FIXTURE.as_bytes());
    assert_eq!(iam.keys_for(USER).len(), 1);
}

#[tokio::test]
async fn test_delete_exhaustion_is_degraded() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    iam.fail_deletes(
        ProviderError::transient("DeleteAccessKey", "Throttling", "Rate exceeded"),
        None,
    );

    let report = rotator(&iam, &path, fast_settings(true))
        .rotate_profile("default")
        .await;

    assert!(matches!(report.outcome, RotationOutcome::Degraded { .. }));
    assert!(!report.outcome.is_failure());
    assert_eq!(report.final_state, RotationState::LocalUpdated);

    let new_id = report.new_key_id.expect("new key id");
    assert_eq!(read(&path), rotated_fixture(&new_id, "fake-secret-1"));
    assert_eq!(iam.keys_for(USER).len(), 2);

    let attempts = iam
        .mutating_calls()
        .iter()
        .filter(|c| c.operation == "DeleteAccessKey")
        .count();
    assert!(attempts > 1, "expected retries, got {attempts} attempt(s)");
}

#[tokio::test]
async fn test_delete_recovers_after_transient_faults() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    iam.fail_deletes(
        ProviderError::transient("DeleteAccessKey", "InvalidClientTokenId", "not yet valid"),
        Some(2),
    );

    let report = rotator(&iam, &path, fast_settings(true))
        .rotate_profile("default")
        .await;

    assert_eq!(report.outcome, RotationOutcome::Rotated);
    assert_eq!(iam.keys_for(USER).len(), 1);
}

#[tokio::test]
async fn test_safe_mode_deactivates_old_key() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    let settings = RotationSettings {
        safe: true,
        ..fast_settings(true)
    };

    let report = rotator(&iam, &path, settings).rotate_profile("default").await;

    assert_eq!(report.outcome, RotationOutcome::Deactivated);
    assert_eq!(report.final_state, RotationState::OldKeyDeactivated);
    let keys = iam.keys_for(USER);
    assert_eq!(keys.len(), 2);
    let old = keys
        .iter()
        .find(|k| k.access_key_id == ORIGINAL_KEY_ID)
        .expect("old key kept");
    assert_eq!(old.status, KeyStatus::Inactive);
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();

    let report = rotator(&iam, &path, fast_settings(false))
        .rotate_profile("default")
        .await;

    assert!(matches!(report.outcome, RotationOutcome::Checked { .. }));
    assert_eq!(report.final_state, RotationState::PreconditionOk);
    assert!(iam.mutating_calls().is_empty());
    assert_eq!(read(&path), CREDENTIALS_FIXTURE);
}

#[tokio::test]
async fn test_unknown_key_fails_profile_and_run_continues() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    // [other] holds a key the provider has never seen.
    let iam = seeded_provider();

    let profiles = vec!["other".to_string(), "default".to_string()];
    let report = rotator(&iam, &path, fast_settings(true))
        .rotate_all(&profiles)
        .await;

    assert!(report.applied);
    assert_eq!(report.profiles.len(), 2);
    assert!(report.profiles[0].outcome.is_failure());
    assert_eq!(report.profiles[1].outcome, RotationOutcome::Rotated);
    assert!(report.has_failures());
    assert_eq!(report.count("rotated"), 1);
}

#[tokio::test]
async fn test_missing_profile_fails() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();

    let report = rotator(&iam, &path, fast_settings(true))
        .rotate_profile("staging")
        .await;

    assert!(report.outcome.is_failure());
    assert!(iam.calls().is_empty());
}

#[test]
fn test_missing_store_is_config_not_found() {
    let dir = temp_dir();
    let path = dir.path().join("nope");

    let err = enumerate_profiles(&path, None).unwrap_err();
    assert!(matches!(err, RotationError::ConfigNotFound(ref p) if *p == path));

    let err = enumerate_profiles(&path, Some("default")).unwrap_err();
    assert!(matches!(err, RotationError::ConfigNotFound(_)));
}

#[test]
fn test_enumerates_profiles_with_keys() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    assert_eq!(
        enumerate_profiles(&path, None).unwrap(),
        vec!["default".to_string(), "other".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_force_waits_for_settle_delay_before_creating() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    iam.seed_key(USER, &Credentials::new("AKIASPARE", "spare"), KeyStatus::Active);

    let settings = RotationSettings {
        force: true,
        settle_delay: Duration::from_secs(5),
        ..fast_settings(true)
    };
    let report = rotator(&iam, &path, settings).rotate_profile("default").await;
    assert_eq!(report.outcome, RotationOutcome::Rotated);

    let calls = iam.mutating_calls();
    let (delete, create) = (&calls[0], &calls[1]);
    assert_eq!(delete.operation, "DeleteAccessKey");
    assert_eq!(delete.target.as_deref(), Some("AKIASPARE"));
    assert_eq!(create.operation, "CreateAccessKey");
    assert!(create.at.duration_since(delete.at) >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_failed_write_removes_new_key_and_keeps_file() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    let writer = Arc::new(BrokenWriter::default());

    let report = rotator(&iam, &path, fast_settings(true))
        .with_writer(writer.clone())
        .rotate_profile("default")
        .await;

    assert!(report.outcome.is_failure());
    assert_eq!(report.final_state, RotationState::Failed);
    assert_eq!(writer.writes.load(Ordering::SeqCst), 1);
    assert_eq!(read(&path), CREDENTIALS_FIXTURE);

    let keys = iam.keys_for(USER);
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].access_key_id, ORIGINAL_KEY_ID);

    let new_id = report.new_key_id.expect("new key id");
    let calls = iam.mutating_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].operation, "DeleteAccessKey");
    assert_eq!(calls[1].target.as_deref(), Some(new_id.as_str()));
    assert_eq!(calls[1].authenticated_as, ORIGINAL_KEY_ID);
}

#[tokio::test]
async fn test_damaged_file_is_restored_before_rollback() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    let writer = Arc::new(BrokenWriter {
        truncate: true,
        ..Default::default()
    });

    let report = rotator(&iam, &path, fast_settings(true))
        .with_writer(writer.clone())
        .rotate_profile("default")
        .await;

    assert!(report.outcome.is_failure());
    assert_eq!(writer.writes.load(Ordering::SeqCst), 2);
    assert_eq!(read(&path), CREDENTIALS_FIXTURE);
    assert_eq!(iam.keys_for(USER).len(), 1);
}

#[tokio::test]
async fn test_unrecoverable_file_keeps_both_keys() {
    let (_dir, path) = temp_credentials(CREDENTIALS_FIXTURE);
    let iam = seeded_provider();
    let writer = Arc::new(BrokenWriter {
        truncate: true,
        fail_restore: true,
        ..Default::default()
    });

    let report = rotator(&iam, &path, fast_settings(true))
        .with_writer(writer)
        .rotate_profile("default")
        .await;

    assert!(report.outcome.is_failure());
    assert_eq!(read(&path), &CREDENTIALS_FIXTURE[..20]);

    // The original key must stay usable remotely.
    let keys = iam.keys_for(USER);
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().any(|k| k.access_key_id == ORIGINAL_KEY_ID && k.is_active()));
    assert!(iam
        .mutating_calls()
        .iter()
        .all(|c| c.operation == "CreateAccessKey"));
}
