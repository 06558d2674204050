//! `IamClient` implementation backed by the AWS SDK.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_iam::types::StatusType;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::errors::classify;
use crate::domain::models::{AccessKeyMetadata, Credentials, KeyStatus};
use crate::domain::ports::{IamClient, IamConnector, ProviderError};

/// Name reported to the SDK as the source of the static credentials.
const PROVIDER_NAME: &str = "iam-key-rotator";

/// Collect every item of a marker-paginated listing.
///
/// `fetch` receives the marker of the page to request (`None` for the first
/// page) and returns that page's items plus the marker of the next page.
pub async fn collect_pages<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), E>>,
{
    let mut items = Vec::new();
    let mut marker = None;
    loop {
        let (page, next) = fetch(marker.take()).await?;
        items.extend(page);
        match next {
            Some(next) => marker = Some(next),
            None => return Ok(items),
        }
    }
}

fn to_key_status(status: Option<&StatusType>) -> KeyStatus {
    match status {
        Some(StatusType::Active) => KeyStatus::Active,
        Some(StatusType::Inactive) => KeyStatus::Inactive,
        Some(other) => KeyStatus::Unknown(other.as_str().to_string()),
        None => KeyStatus::Unknown(String::new()),
    }
}

fn to_status_type(status: &KeyStatus) -> StatusType {
    match status {
        KeyStatus::Active => StatusType::Active,
        KeyStatus::Inactive => StatusType::Inactive,
        KeyStatus::Unknown(raw) => StatusType::from(raw.as_str()),
    }
}

fn to_metadata(key: &aws_sdk_iam::types::AccessKeyMetadata) -> AccessKeyMetadata {
    AccessKeyMetadata {
        access_key_id: key.access_key_id().unwrap_or_default().to_string(),
        user_name: key.user_name().unwrap_or_default().to_string(),
        status: to_key_status(key.status()),
        created_at: key
            .create_date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.secs(), d.subsec_nanos())),
    }
}

/// IAM client authenticated with one set of static credentials.
#[derive(Debug, Clone)]
pub struct AwsIamClient {
    client: aws_sdk_iam::Client,
}

impl AwsIamClient {
    pub fn new(client: aws_sdk_iam::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IamClient for AwsIamClient {
    async fn current_user(&self) -> Result<String, ProviderError> {
        let output = self
            .client
            .get_user()
            .send()
            .await
            .map_err(|e| classify("GetUser", &e))?;

        output
            .user()
            .map(|user| user.user_name().to_string())
            .ok_or_else(|| ProviderError::rejected("GetUser", "MissingUser", "response did not include a user"))
    }

    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKeyMetadata>, ProviderError> {
        collect_pages(|marker| async move {
            let page = self
                .client
                .list_access_keys()
                .user_name(user_name)
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| classify("ListAccessKeys", &e))?;

            let keys = page.access_key_metadata().iter().map(to_metadata).collect();
            let next = if page.is_truncated() {
                page.marker().map(str::to_string)
            } else {
                None
            };
            debug!(user = user_name, truncated = page.is_truncated(), "fetched access key page");
            Ok((keys, next))
        })
        .await
    }

    async fn create_access_key(&self, user_name: &str) -> Result<Credentials, ProviderError> {
        let output = self
            .client
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| classify("CreateAccessKey", &e))?;

        output
            .access_key()
            .map(|key| Credentials::new(key.access_key_id(), key.secret_access_key()))
            .ok_or_else(|| {
                ProviderError::rejected("CreateAccessKey", "MissingAccessKey", "response did not include an access key")
            })
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), ProviderError> {
        self.client
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| classify("DeleteAccessKey", &e))?;
        Ok(())
    }

    async fn update_access_key_status(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), ProviderError> {
        self.client
            .update_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .status(to_status_type(&status))
            .send()
            .await
            .map_err(|e| classify("UpdateAccessKey", &e))?;
        Ok(())
    }
}

/// Builds `AwsIamClient`s for a fixed region.
#[derive(Debug, Clone)]
pub struct AwsConnector {
    region: String,
}

impl AwsConnector {
    pub fn new(region: impl Into<String>) -> Self {
        Self { region: region.into() }
    }
}

#[async_trait]
impl IamConnector for AwsConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn IamClient>, ProviderError> {
        let provider = aws_credential_types::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            PROVIDER_NAME,
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(provider)
            .load()
            .await;

        debug!(access_key_id = %credentials.access_key_id, region = %self.region, "built IAM session");
        Ok(Arc::new(AwsIamClient::new(aws_sdk_iam::Client::new(&config))))
    }
}
