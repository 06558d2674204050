//! Per-profile access key rotation.
//!
//! Each profile walks the `RotationState` machine on its own: inventory,
//! single-key precondition, key creation, local store update, then removal
//! of the old key with a session authenticated by the new one. Profiles are
//! processed one after another; a failure only ends the profile it hit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::retry::RetryPolicy;
use crate::domain::errors::{RotationError, RotationResult};
use crate::domain::models::{
    AccessKeyMetadata, Config, Credentials, KeyStatus, ProfileReport, RotationContext,
    RotationOutcome, RotationState, RunReport,
};
use crate::domain::ports::{IamClient, IamConnector};
use crate::infrastructure::credentials::{AtomicWriter, CredentialsStore, StoreWriter};

/// Flags and timings for a run.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    /// Delete the unused key when two keys exist.
    pub force: bool,
    /// Deactivate the old key instead of deleting it.
    pub safe: bool,
    /// Perform the rotation; otherwise only report what would happen.
    pub apply: bool,
    /// Wait after force-deleting an unused key.
    pub settle_delay: Duration,
    /// Policy for removing keys.
    pub retry: RetryPolicy,
}

impl RotationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            force: false,
            safe: false,
            apply: false,
            settle_delay: config.rotation.settle_delay(),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What has to happen before a new key can be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// At most one key exists.
    Ready,
    /// Two keys exist and `force` is set: this one goes first.
    RemoveUnused(AccessKeyMetadata),
}

/// Apply the single-key rule to a user's inventory.
///
/// With more than one key and no `force`, the profile must be skipped. With
/// `force`, the first key (in inventory order) that is not the session's own
/// key is chosen for deletion.
pub fn enforce_single_key(
    profile: &str,
    inventory: &[AccessKeyMetadata],
    current_key_id: &str,
    force: bool,
) -> RotationResult<Precondition> {
    if inventory.len() <= 1 {
        return Ok(Precondition::Ready);
    }
    if !force {
        return Err(RotationError::MultipleKeysPresent {
            profile: profile.to_string(),
            count: inventory.len(),
        });
    }
    inventory
        .iter()
        .find(|key| key.access_key_id != current_key_id)
        .cloned()
        .map(Precondition::RemoveUnused)
        .ok_or_else(|| RotationError::NoUnusedKey {
            profile: profile.to_string(),
        })
}

/// Whether the file at `path` carries `expected` for `profile`.
fn store_holds(path: &Path, profile: &str, expected: &Credentials) -> bool {
    CredentialsStore::open(path)
        .ok()
        .and_then(|store| store.profile(profile))
        .and_then(|entry| entry.credentials())
        .is_some_and(|found| {
            found.access_key_id == expected.access_key_id
                && found.secret_access_key == expected.secret_access_key
        })
}

/// Progress of one profile through the state machine.
#[derive(Debug)]
struct Tracker {
    profile: String,
    state: RotationState,
    user_name: Option<String>,
    old_key_id: Option<String>,
    new_key_id: Option<String>,
}

impl Tracker {
    fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            state: RotationState::Start,
            user_name: None,
            old_key_id: None,
            new_key_id: None,
        }
    }

    fn advance(&mut self, next: RotationState) -> RotationResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(RotationError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(profile = %self.profile, from = %self.state, to = %next, "rotation state change");
        self.state = next;
        Ok(())
    }

    fn finish(self, outcome: RotationOutcome) -> ProfileReport {
        ProfileReport {
            profile: self.profile,
            user_name: self.user_name,
            final_state: self.state,
            outcome,
            old_key_id: self.old_key_id,
            new_key_id: self.new_key_id,
        }
    }
}

/// Rotates access keys for profiles of one credentials file.
pub struct KeyRotator<C: IamConnector> {
    connector: Arc<C>,
    store_path: PathBuf,
    settings: RotationSettings,
    writer: Arc<dyn StoreWriter>,
}

impl<C: IamConnector> KeyRotator<C> {
    pub fn new(connector: Arc<C>, store_path: impl Into<PathBuf>, settings: RotationSettings) -> Self {
        Self {
            connector,
            store_path: store_path.into(),
            settings,
            writer: Arc::new(AtomicWriter),
        }
    }

    /// Replace how the credentials file is written.
    pub fn with_writer(mut self, writer: Arc<dyn StoreWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Rotate every profile in order. Each one completes before the next starts.
    pub async fn rotate_all(&self, profiles: &[String]) -> RunReport {
        info!("Rotating keys for profile(s) {}", profiles.join(" "));

        let mut report = RunReport {
            applied: self.settings.apply,
            profiles: Vec::with_capacity(profiles.len()),
        };
        for profile in profiles {
            report.profiles.push(self.rotate_profile(profile).await);
        }
        report
    }

    /// Rotate a single profile. Never returns an error: failures are part of
    /// the report.
    #[instrument(skip(self), fields(apply = self.settings.apply, force = self.settings.force))]
    pub async fn rotate_profile(&self, profile: &str) -> ProfileReport {
        info!("Rotating keys for {profile}");
        let mut tracker = Tracker::new(profile);

        let outcome = match self.drive(&mut tracker).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(state = %tracker.state, error = %err, "rotation failed");
                if tracker.state.can_transition_to(RotationState::Failed) {
                    tracker.state = RotationState::Failed;
                }
                RotationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        match &outcome {
            RotationOutcome::Rotated | RotationOutcome::Deactivated => {
                info!(outcome = outcome.label(), "rotation complete");
            }
            RotationOutcome::Checked { planned } => info!(%planned, "check complete"),
            RotationOutcome::Degraded { reason } | RotationOutcome::Skipped { reason } => {
                warn!(outcome = outcome.label(), %reason, "rotation incomplete");
            }
            RotationOutcome::Failed { .. } => {}
        }
        tracker.finish(outcome)
    }

    async fn drive(&self, tracker: &mut Tracker) -> RotationResult<RotationOutcome> {
        let mut store = CredentialsStore::open(&self.store_path)?;
        let current = store
            .profile(&tracker.profile)
            .ok_or_else(|| RotationError::ProfileNotFound(tracker.profile.clone()))?
            .credentials()
            .ok_or_else(|| RotationError::IncompleteProfile(tracker.profile.clone()))?;
        tracker.old_key_id = Some(current.access_key_id.clone());

        info!("Gathering {} credentials", tracker.profile);
        let session = self.connector.connect(&current).await?;
        let user_name = session.current_user().await?;
        tracker.user_name = Some(user_name.clone());
        let mut ctx = RotationContext::new(&tracker.profile, user_name, current);

        tracker.advance(RotationState::Inventory)?;
        let inventory = session.list_access_keys(ctx.user_name()).await?;
        info!(user = ctx.user_name(), keys = inventory.len(), "listed access keys");

        let precondition = match enforce_single_key(
            &ctx.profile,
            &inventory,
            ctx.old_key_id(),
            self.settings.force,
        ) {
            Ok(precondition) => precondition,
            Err(err @ RotationError::MultipleKeysPresent { .. }) => {
                tracker.advance(RotationState::Skipped)?;
                return Ok(RotationOutcome::Skipped {
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        if !self.settings.apply {
            tracker.advance(RotationState::PreconditionOk)?;
            return Ok(RotationOutcome::Checked {
                planned: self.plan(&ctx, &precondition),
            });
        }

        if let Precondition::RemoveUnused(unused) = &precondition {
            info!(
                key_id = %unused.access_key_id,
                "Multiple access keys found, force flag is set. Deleting unused access key"
            );
            self.settings
                .retry
                .execute("DeleteAccessKey", || {
                    session.delete_access_key(ctx.user_name(), &unused.access_key_id)
                })
                .await?;
            info!(
                delay = ?self.settings.settle_delay,
                "IAM is eventually consistent, waiting for the deletion to propagate"
            );
            tokio::time::sleep(self.settings.settle_delay).await;
        }
        tracker.advance(RotationState::PreconditionOk)?;

        info!("Creating new access key");
        let created = session
            .create_access_key(ctx.user_name())
            .await
            .map_err(|err| {
                error!(error = %err, "There was an error creating the new access key");
                RotationError::ProviderRejected(err)
            })?;
        info!(new_key_id = %created.access_key_id, "created access key");
        ctx.new = Some(created.clone());
        tracker.new_key_id = ctx.new_key_id().map(str::to_string);
        tracker.advance(RotationState::KeyCreated)?;

        let original = store.contents().to_string();
        if let Err(err) = store
            .set_credentials(&ctx.profile, &created)
            .and_then(|()| store.save_with(self.writer.as_ref()))
        {
            error!(error = %err, "could not write the new key to the credentials file");
            if self.restore_store(store.path(), &original, &ctx) {
                self.discard_new_key(session.as_ref(), &ctx, &created).await;
            } else {
                error!(
                    new_key_id = %created.access_key_id,
                    old_key_id = ctx.old_key_id(),
                    "credentials file no longer holds the old key, keeping both keys on the provider"
                );
            }
            return Err(err.into());
        }
        info!(path = %store.path().display(), "credentials file updated");
        tracker.advance(RotationState::LocalUpdated)?;

        Ok(self.retire_old_key(tracker, &ctx, &created).await)
    }

    fn plan(&self, ctx: &RotationContext, precondition: &Precondition) -> String {
        let retire = if self.settings.safe { "deactivate" } else { "delete" };
        let rotate = format!(
            "create a new key for {} and {retire} {}",
            ctx.user_name(),
            ctx.old_key_id()
        );
        match precondition {
            Precondition::Ready => format!("would {rotate}"),
            Precondition::RemoveUnused(unused) => {
                format!("would delete unused key {} then {rotate}", unused.access_key_id)
            }
        }
    }

    /// Make sure the file on disk still carries the old key after a failed
    /// write, rewriting `original` when it does not. Returns whether the old
    /// key is known to be on disk.
    fn restore_store(&self, path: &Path, original: &str, ctx: &RotationContext) -> bool {
        if store_holds(path, &ctx.profile, &ctx.old.credentials) {
            return true;
        }
        warn!(path = %path.display(), "credentials file was damaged by the failed write, restoring it");
        if let Err(err) = self.writer.write(path, original) {
            error!(path = %path.display(), error = %err, "could not restore the credentials file");
            return false;
        }
        store_holds(path, &ctx.profile, &ctx.old.credentials)
    }

    /// Undo a key creation whose local write failed, so the profile keeps
    /// exactly its old key.
    async fn discard_new_key(&self, session: &dyn IamClient, ctx: &RotationContext, created: &Credentials) {
        let result = self
            .settings
            .retry
            .execute("DeleteAccessKey", || {
                session.delete_access_key(ctx.user_name(), &created.access_key_id)
            })
            .await;
        match result {
            Ok(()) => warn!(key_id = %created.access_key_id, "removed the unsaved access key"),
            Err(err) => error!(
                key_id = %created.access_key_id,
                error = %err,
                "could not remove the unsaved access key, delete it manually"
            ),
        }
    }

    /// Delete (or deactivate) the old key using the new key.
    ///
    /// Failure here leaves two usable keys, which is reported as degraded
    /// rather than failed: the new key is already saved.
    async fn retire_old_key(
        &self,
        tracker: &mut Tracker,
        ctx: &RotationContext,
        created: &Credentials,
    ) -> RotationOutcome {
        let old_key_id = ctx.old_key_id();
        let session = match self.connector.connect(created).await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "could not open a session with the new key");
                return RotationOutcome::Degraded {
                    reason: format!("old key {old_key_id} still present: {err}"),
                };
            }
        };
        debug!("Using session with access key {}", created.access_key_id);

        let (result, next, outcome) = if self.settings.safe {
            info!(old_key_id, "Deactivating old IAM credentials");
            let result = self
                .settings
                .retry
                .execute("UpdateAccessKey", || {
                    session.update_access_key_status(ctx.user_name(), old_key_id, KeyStatus::Inactive)
                })
                .await;
            (result, RotationState::OldKeyDeactivated, RotationOutcome::Deactivated)
        } else {
            info!(old_key_id, "Deleting old IAM credentials");
            let result = self
                .settings
                .retry
                .execute("DeleteAccessKey", || {
                    session.delete_access_key(ctx.user_name(), old_key_id)
                })
                .await;
            (result, RotationState::OldKeyDeleted, RotationOutcome::Rotated)
        };

        if let Err(err) = result {
            warn!(old_key_id, error = %err, "old access key could not be removed, both keys remain active");
            return RotationOutcome::Degraded {
                reason: format!("old key {old_key_id} still present: {err}"),
            };
        }
        match tracker.advance(next) {
            Ok(()) => outcome,
            Err(err) => RotationOutcome::Degraded {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn key(id: &str) -> AccessKeyMetadata {
        AccessKeyMetadata {
            access_key_id: id.to_string(),
            user_name: "alice".to_string(),
            status: KeyStatus::Active,
            created_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_single_key_is_ready() {
        let inventory = [key("AKIA1")];
        assert_eq!(
            enforce_single_key("dev", &inventory, "AKIA1", false).unwrap(),
            Precondition::Ready
        );
        assert_eq!(enforce_single_key("dev", &[], "AKIA1", false).unwrap(), Precondition::Ready);
    }

    #[test]
    fn test_two_keys_without_force_refuses() {
        let inventory = [key("AKIA1"), key("AKIA2")];
        let err = enforce_single_key("dev", &inventory, "AKIA1", false).unwrap_err();
        assert!(matches!(
            err,
            RotationError::MultipleKeysPresent { ref profile, count: 2 } if profile == "dev"
        ));
    }

    #[test]
    fn test_force_picks_key_not_in_use() {
        let inventory = [key("AKIA1"), key("AKIA2")];
        assert_eq!(
            enforce_single_key("dev", &inventory, "AKIA1", true).unwrap(),
            Precondition::RemoveUnused(inventory[1].clone())
        );
    }

    #[test]
    fn test_force_tie_break_is_inventory_order() {
        let inventory = [key("AKIA1"), key("AKIA2"), key("AKIA3")];
        match enforce_single_key("dev", &inventory, "AKIA3", true).unwrap() {
            Precondition::RemoveUnused(k) => assert_eq!(k.access_key_id, "AKIA1"),
            Precondition::Ready => panic!("expected a key to remove"),
        }
    }

    #[test]
    fn test_force_without_unused_key() {
        let inventory = [key("AKIA1"), key("AKIA1")];
        let err = enforce_single_key("dev", &inventory, "AKIA1", true).unwrap_err();
        assert!(matches!(err, RotationError::NoUnusedKey { .. }));
    }

    #[test]
    fn test_tracker_rejects_illegal_transition() {
        let mut tracker = Tracker::new("dev");
        let err = tracker.advance(RotationState::KeyCreated).unwrap_err();
        assert!(matches!(
            err,
            RotationError::InvalidTransition {
                from: RotationState::Start,
                to: RotationState::KeyCreated
            }
        ));
        assert_eq!(tracker.state, RotationState::Start);
    }
}
