// Request authentication: shared-key-lite signing and managed identity tokens

use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use durascaler_core::port::task_hub_store::StorageError;

/// Storage service version sent with every request. Required for bearer
/// auth and pinned for shared-key signing stability.
pub const STORAGE_API_VERSION: &str = "2020-10-02";

/// Instance-metadata token endpoint and the scope storage tokens need.
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const STORAGE_RESOURCE: &str = "https://storage.azure.com/";

/// Refresh a cached token once it is this close to expiry.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 120;

/// Current timestamp in the RFC 1123 form the storage service expects in
/// `x-ms-date`.
pub fn request_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Shared-key-lite string-to-sign for a GET request that carries
/// `x-ms-date` and `x-ms-version` headers and no body.
pub fn string_to_sign(date: &str, canonical_resource: &str) -> String {
    format!(
        "GET\n\n\n\nx-ms-date:{date}\nx-ms-version:{STORAGE_API_VERSION}\n{canonical_resource}"
    )
}

/// Canonicalized resource in the lite form: `/{account}{path}`, plus the
/// `comp` parameter when present (the only query parameter lite signing
/// includes).
pub fn canonical_resource(account: &str, path: &str, comp: Option<&str>) -> String {
    match comp {
        Some(comp) => format!("/{account}{path}?comp={comp}"),
        None => format!("/{account}{path}"),
    }
}

/// Produce the `Authorization` header value for a shared-key account.
pub fn shared_key_lite_header(
    account: &str,
    key_base64: &str,
    string_to_sign: &str,
) -> Result<String, StorageError> {
    let key = BASE64
        .decode(key_base64)
        .map_err(|e| StorageError::Auth(format!("account key is not valid base64: {e}")))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| StorageError::Auth(format!("account key rejected by HMAC: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKeyLite {account}:{signature}"))
}

#[derive(Debug, Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
    /// IMDS reports the expiry as a stringified unix timestamp.
    expires_on: serde_json::Value,
}

struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Bearer tokens for managed-identity accounts, fetched from the instance
/// metadata service and cached until close to expiry.
pub struct ManagedIdentityTokens {
    http: reqwest::Client,
    endpoint: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ManagedIdentityTokens {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoint(http, IMDS_TOKEN_URL.to_string())
    }

    /// Endpoint override used by tests.
    pub fn with_endpoint(http: reqwest::Client, endpoint: String) -> Self {
        Self {
            http,
            endpoint,
            cache: Mutex::new(None),
        }
    }

    /// Current bearer token, refreshing through IMDS when the cached one
    /// is missing or about to expire.
    pub async fn token(&self) -> Result<String, StorageError> {
        let now = Utc::now().timestamp();
        {
            let cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at - TOKEN_REFRESH_MARGIN_SECS > now {
                    return Ok(cached.token.clone());
                }
            }
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("api-version", IMDS_API_VERSION),
                ("resource", STORAGE_RESOURCE),
            ])
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("identity endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Auth(format!(
                "identity endpoint returned {status}"
            )));
        }

        let body: ImdsTokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("malformed identity token response: {e}")))?;
        let expires_at = parse_expiry(&body.expires_on)?;

        debug!(expires_at, "refreshed managed identity token");
        let mut cache = self.cache.lock().unwrap();
        *cache = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at,
        });
        Ok(body.access_token)
    }
}

fn parse_expiry(raw: &serde_json::Value) -> Result<i64, StorageError> {
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        StorageError::Auth(format!("identity token expiry is not a timestamp: {raw}"))
    })
}
