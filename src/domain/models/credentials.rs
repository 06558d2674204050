use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An access key id / secret pair, optionally with a session token.
///
/// `Debug` never prints the secret or the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A named entry of the local credentials store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub name: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl ProfileEntry {
    /// Whether the section carries a non-empty access key id.
    pub fn has_access_key(&self) -> bool {
        self.access_key_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Static credentials for this profile, if both halves of the key pair are present.
    pub fn credentials(&self) -> Option<Credentials> {
        let id = self.access_key_id.as_deref().filter(|v| !v.is_empty())?;
        let secret = self.secret_access_key.as_deref().filter(|v| !v.is_empty())?;
        let creds = Credentials::new(id, secret);
        Some(match self.session_token.as_deref().filter(|v| !v.is_empty()) {
            Some(token) => creds.with_session_token(token),
            None => creds,
        })
    }
}

/// Status of a remote access key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Inactive,
    Unknown(String),
}

impl KeyStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-side record describing one access key of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyMetadata {
    pub access_key_id: String,
    pub user_name: String,
    pub status: KeyStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl AccessKeyMetadata {
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// The key being replaced.
#[derive(Debug, Clone)]
pub struct OldCredentials {
    pub user_name: String,
    pub credentials: Credentials,
}

/// Transient state for one profile's rotation.
///
/// Holds at most one old key and one new key.
#[derive(Debug)]
pub struct RotationContext {
    pub profile: String,
    pub old: OldCredentials,
    pub new: Option<Credentials>,
}

impl RotationContext {
    pub fn new(profile: impl Into<String>, user_name: impl Into<String>, current: Credentials) -> Self {
        Self {
            profile: profile.into(),
            old: OldCredentials {
                user_name: user_name.into(),
                credentials: current,
            },
            new: None,
        }
    }

    pub fn user_name(&self) -> &str {
        &self.old.user_name
    }

    pub fn old_key_id(&self) -> &str {
        &self.old.credentials.access_key_id
    }

    pub fn new_key_id(&self) -> Option<&str> {
        self.new.as_ref().map(|c| c.access_key_id.as_str())
    }
}
