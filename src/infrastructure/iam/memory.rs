//! In-memory identity provider for testing

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::domain::models::{AccessKeyMetadata, Credentials, KeyStatus};
use crate::domain::ports::{IamClient, IamConnector, ProviderError};

/// Keys per user the provider accepts before refusing to create more.
pub const MAX_KEYS_PER_USER: usize = 2;

/// One provider call, as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: &'static str,
    /// Key id the call was authenticated with.
    pub authenticated_as: String,
    /// Key id the call acted on, when any.
    pub target: Option<String>,
    /// Runtime clock at the time of the call (follows a paused clock).
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct StoredKey {
    metadata: AccessKeyMetadata,
    secret: String,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    error: ProviderError,
    /// `None` fails every call.
    remaining: Option<u32>,
}

impl InjectedFailure {
    fn fire(slot: &mut Option<Self>) -> Option<ProviderError> {
        let failure = slot.as_mut()?;
        if failure.remaining == Some(0) {
            *slot = None;
            return None;
        }
        if let Some(n) = failure.remaining.as_mut() {
            *n -= 1;
        }
        Some(failure.error.clone())
    }
}

#[derive(Debug, Default)]
struct State {
    keys: Vec<StoredKey>,
    next_id: u32,
    create_failure: Option<InjectedFailure>,
    delete_failure: Option<InjectedFailure>,
    calls: Vec<RecordedCall>,
}

impl State {
    fn owner_of(&self, access_key_id: &str, secret: &str) -> Option<&StoredKey> {
        self.keys.iter().find(|k| {
            k.metadata.access_key_id == access_key_id && k.secret == secret && k.metadata.is_active()
        })
    }

    fn record(&mut self, operation: &'static str, authenticated_as: &str, target: Option<&str>) {
        self.calls.push(RecordedCall {
            operation,
            authenticated_as: authenticated_as.to_string(),
            target: target.map(str::to_string),
            at: Instant::now(),
        });
    }
}

/// Shared fake provider. Every session built from it sees the same keys.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIam {
    state: Arc<Mutex<State>>,
}

impl InMemoryIam {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an existing key.
    pub fn seed_key(&self, user_name: &str, credentials: &Credentials, status: KeyStatus) {
        self.lock().keys.push(StoredKey {
            metadata: AccessKeyMetadata {
                access_key_id: credentials.access_key_id.clone(),
                user_name: user_name.to_string(),
                status,
                created_at: Some(Utc::now()),
            },
            secret: credentials.secret_access_key.clone(),
        });
    }

    /// Make `create_access_key` fail with `error`.
    pub fn fail_creates(&self, error: ProviderError) {
        self.lock().create_failure = Some(InjectedFailure { error, remaining: None });
    }

    /// Make `delete_access_key` and `update_access_key_status` fail with
    /// `error`, `times` times or forever.
    pub fn fail_deletes(&self, error: ProviderError, times: Option<u32>) {
        self.lock().delete_failure = Some(InjectedFailure { error, remaining: times });
    }

    /// Current keys of `user_name`, in creation order.
    pub fn keys_for(&self, user_name: &str) -> Vec<AccessKeyMetadata> {
        self.lock()
            .keys
            .iter()
            .filter(|k| k.metadata.user_name == user_name)
            .map(|k| k.metadata.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Calls that changed provider state.
    pub fn mutating_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(c.operation, "CreateAccessKey" | "DeleteAccessKey" | "UpdateAccessKey")
            })
            .collect()
    }
}

#[async_trait]
impl IamConnector for InMemoryIam {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn IamClient>, ProviderError> {
        Ok(Arc::new(InMemorySession {
            provider: self.clone(),
            credentials: credentials.clone(),
        }))
    }
}

/// A session authenticated with one key pair.
#[derive(Debug)]
pub struct InMemorySession {
    provider: InMemoryIam,
    credentials: Credentials,
}

impl InMemorySession {
    /// Authenticate and record the call; returns the caller's user name.
    fn authenticate(
        &self,
        state: &mut State,
        operation: &'static str,
        target: Option<&str>,
    ) -> Result<String, ProviderError> {
        let caller = &self.credentials.access_key_id;
        state.record(operation, caller, target);
        state
            .owner_of(caller, &self.credentials.secret_access_key)
            .map(|k| k.metadata.user_name.clone())
            .ok_or_else(|| {
                ProviderError::transient(
                    operation,
                    "InvalidClientTokenId",
                    "The security token included in the request is invalid.",
                )
            })
    }

    fn no_such_key(operation: &'static str, access_key_id: &str) -> ProviderError {
        ProviderError::rejected(
            operation,
            "NoSuchEntity",
            format!("The Access Key with id {access_key_id} cannot be found."),
        )
    }
}

#[async_trait]
impl IamClient for InMemorySession {
    async fn current_user(&self) -> Result<String, ProviderError> {
        let mut state = self.provider.lock();
        self.authenticate(&mut state, "GetUser", None)
    }

    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKeyMetadata>, ProviderError> {
        let mut state = self.provider.lock();
        self.authenticate(&mut state, "ListAccessKeys", None)?;
        Ok(state
            .keys
            .iter()
            .filter(|k| k.metadata.user_name == user_name)
            .map(|k| k.metadata.clone())
            .collect())
    }

    async fn create_access_key(&self, user_name: &str) -> Result<Credentials, ProviderError> {
        let mut state = self.provider.lock();
        self.authenticate(&mut state, "CreateAccessKey", None)?;
        if let Some(err) = InjectedFailure::fire(&mut state.create_failure) {
            return Err(err);
        }

        let existing = state
            .keys
            .iter()
            .filter(|k| k.metadata.user_name == user_name)
            .count();
        if existing >= MAX_KEYS_PER_USER {
            return Err(ProviderError::rejected(
                "CreateAccessKey",
                "LimitExceeded",
                format!("Cannot exceed quota for AccessKeysPerUser: {MAX_KEYS_PER_USER}"),
            ));
        }

        state.next_id += 1;
        let created = Credentials::new(
            format!("AKIAFAKE{:012}", state.next_id),
            format!("fake-secret-{}", state.next_id),
        );
        state.keys.push(StoredKey {
            metadata: AccessKeyMetadata {
                access_key_id: created.access_key_id.clone(),
                user_name: user_name.to_string(),
                status: KeyStatus::Active,
                created_at: Some(Utc::now()),
            },
            secret: created.secret_access_key.clone(),
        });
        Ok(created)
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), ProviderError> {
        let mut state = self.provider.lock();
        self.authenticate(&mut state, "DeleteAccessKey", Some(access_key_id))?;
        if let Some(err) = InjectedFailure::fire(&mut state.delete_failure) {
            return Err(err);
        }

        let before = state.keys.len();
        state.keys.retain(|k| {
            !(k.metadata.access_key_id == access_key_id && k.metadata.user_name == user_name)
        });
        if state.keys.len() == before {
            return Err(Self::no_such_key("DeleteAccessKey", access_key_id));
        }
        Ok(())
    }

    async fn update_access_key_status(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), ProviderError> {
        let mut state = self.provider.lock();
        self.authenticate(&mut state, "UpdateAccessKey", Some(access_key_id))?;
        if let Some(err) = InjectedFailure::fire(&mut state.delete_failure) {
            return Err(err);
        }

        let key = state
            .keys
            .iter_mut()
            .find(|k| k.metadata.access_key_id == access_key_id && k.metadata.user_name == user_name)
            .ok_or_else(|| Self::no_such_key("UpdateAccessKey", access_key_id))?;
        key.metadata.status = status;
        Ok(())
    }
}
