// Azure Blob/Queue REST adapter for the TaskHubStore port

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, trace};
use url::Url;

use durascaler_core::domain::{AccountInfo, Credential};
use durascaler_core::port::task_hub_store::{QueueDepth, StorageError, TaskHubStore};

use crate::auth::{
    canonical_resource, request_date, shared_key_lite_header, string_to_sign,
    ManagedIdentityTokens, STORAGE_API_VERSION,
};

const APPROXIMATE_COUNT_HEADER: &str = "x-ms-approximate-messages-count";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only Azure Storage client: one blob read for hub metadata, one
/// queue-metadata read per backlog probe. No retries - the autoscaling
/// controller's poll cadence is the retry loop.
pub struct AzureTaskHubStore {
    http: reqwest::Client,
    identity: ManagedIdentityTokens,
}

impl AzureTaskHubStore {
    pub fn new() -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Transport(format!("HTTP client init failed: {e}")))?;
        let identity = ManagedIdentityTokens::new(http.clone());
        Ok(Self { http, identity })
    }

    /// Issue an authenticated GET. `comp` is both a query parameter and
    /// part of the shared-key canonicalized resource.
    async fn authorized_get(
        &self,
        account: &AccountInfo,
        mut url: Url,
        comp: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        if let Some(comp) = comp {
            url.set_query(Some(&format!("comp={comp}")));
        }

        let date = request_date();
        let mut authorization = None;
        match &account.credential {
            Credential::SharedKey { key } => {
                let resource = canonical_resource(&account.account_name, url.path(), comp);
                let to_sign = string_to_sign(&date, &resource);
                authorization = Some(shared_key_lite_header(&account.account_name, key, &to_sign)?);
            }
            Credential::Sas { token } => {
                merge_sas_token(&mut url, token);
            }
            Credential::ManagedIdentity => {
                let token = self.identity.token().await?;
                authorization = Some(format!("Bearer {token}"));
            }
        }

        trace!(path = url.path(), "storage GET");
        let mut request = self
            .http
            .get(url)
            .header("x-ms-date", date)
            .header("x-ms-version", STORAGE_API_VERSION);
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))
    }
}

#[async_trait]
impl TaskHubStore for AzureTaskHubStore {
    async fn read_metadata_record(
        &self,
        account: &AccountInfo,
        container: &str,
        blob: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let url = url_under(&account.blob_endpoint, &[container, blob])?;
        let response = self.authorized_get(account, url, None).await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(container, blob, "metadata record does not exist");
                Ok(None)
            }
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StorageError::Transport(e.to_string()))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(service_error(status, response).await),
        }
    }

    async fn queue_depth(
        &self,
        account: &AccountInfo,
        queue: &str,
    ) -> Result<QueueDepth, StorageError> {
        let url = url_under(&account.queue_endpoint, &[queue])?;
        let response = self.authorized_get(account, url, Some("metadata")).await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(queue, "queue does not exist");
                Ok(QueueDepth::Missing)
            }
            status if status.is_success() => {
                let raw = response
                    .headers()
                    .get(APPROXIMATE_COUNT_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| StorageError::Service {
                        status: status.as_u16(),
                        message: format!("missing {APPROXIMATE_COUNT_HEADER} header"),
                    })?;
                let count = raw.parse::<u64>().map_err(|_| StorageError::Service {
                    status: status.as_u16(),
                    message: format!("unparseable {APPROXIMATE_COUNT_HEADER}: {raw:?}"),
                })?;
                Ok(QueueDepth::Messages(count))
            }
            status => Err(service_error(status, response).await),
        }
    }
}

/// Append path segments under an endpoint, preserving any base path the
/// endpoint already carries (emulator endpoints embed the account name).
fn url_under(endpoint: &Url, segments: &[&str]) -> Result<Url, StorageError> {
    let mut url = endpoint.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            StorageError::Transport(format!("endpoint {endpoint} cannot carry a path"))
        })?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

/// Merge a SAS token's parameters into the request query string.
fn merge_sas_token(url: &mut Url, token: &str) {
    let merged = match url.query() {
        Some(existing) => format!("{existing}&{token}"),
        None => token.to_string(),
    };
    url.set_query(Some(&merged));
}

async fn service_error(status: StatusCode, response: reqwest::Response) -> StorageError {
    let mut message = response.text().await.unwrap_or_default();
    message.truncate(200);
    StorageError::Service {
        status: status.as_u16(),
        message,
    }
}
