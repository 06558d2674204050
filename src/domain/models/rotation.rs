use serde::{Deserialize, Serialize};
use std::fmt;

/// States of a single profile's rotation.
///
/// ```text
/// Start -> Inventory -> PreconditionOk -> KeyCreated -> LocalUpdated -> OldKeyDeleted
///                    \-> Skipped                                     \-> OldKeyDeactivated
/// ```
///
/// `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationState {
    Start,
    Inventory,
    PreconditionOk,
    Skipped,
    KeyCreated,
    LocalUpdated,
    OldKeyDeleted,
    OldKeyDeactivated,
    Failed,
}

impl RotationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Inventory => "inventory",
            Self::PreconditionOk => "precondition_ok",
            Self::Skipped => "skipped",
            Self::KeyCreated => "key_created",
            Self::LocalUpdated => "local_updated",
            Self::OldKeyDeleted => "old_key_deleted",
            Self::OldKeyDeactivated => "old_key_deactivated",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::OldKeyDeleted | Self::OldKeyDeactivated | Self::Failed
        )
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<RotationState> {
        match self {
            Self::Start => vec![Self::Inventory, Self::Failed],
            Self::Inventory => vec![Self::PreconditionOk, Self::Skipped, Self::Failed],
            Self::PreconditionOk => vec![Self::KeyCreated, Self::Failed],
            Self::KeyCreated => vec![Self::LocalUpdated, Self::Failed],
            Self::LocalUpdated => vec![Self::OldKeyDeleted, Self::OldKeyDeactivated],
            Self::Skipped | Self::OldKeyDeleted | Self::OldKeyDeactivated | Self::Failed => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a profile's rotation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RotationOutcome {
    /// New key persisted and the old key deleted.
    Rotated,
    /// New key persisted and the old key left inactive (safe mode).
    Deactivated,
    /// New key persisted but the old key could not be removed.
    Degraded { reason: String },
    Skipped { reason: String },
    Failed { reason: String },
    /// Dry run: nothing was changed.
    Checked { planned: String },
}

impl RotationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rotated => "rotated",
            Self::Deactivated => "deactivated",
            Self::Degraded { .. } => "degraded",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
            Self::Checked { .. } => "checked",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Rotated | Self::Deactivated => None,
            Self::Degraded { reason } | Self::Skipped { reason } | Self::Failed { reason } => {
                Some(reason)
            }
            Self::Checked { planned } => Some(planned),
        }
    }
}

/// Result of rotating (or checking) one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub profile: String,
    pub user_name: Option<String>,
    pub final_state: RotationState,
    #[serde(flatten)]
    pub outcome: RotationOutcome,
    pub old_key_id: Option<String>,
    pub new_key_id: Option<String>,
}

/// Ordered results of a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub applied: bool,
    pub profiles: Vec<ProfileReport>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.profiles.iter().any(|p| p.outcome.is_failure())
    }

    pub fn count(&self, label: &str) -> usize {
        self.profiles
            .iter()
            .filter(|p| p.outcome.label() == label)
            .count()
    }
}
