// Storage Account Identity - resolved endpoints + credential, used as cache key

use std::fmt;

use url::Url;

use crate::domain::metadata::ScalerMetadata;
use crate::error::{Result, ScalerError};

/// How requests against the account are authenticated.
///
/// Part of the cache-key identity: the same physical account reached with a
/// different auth mode is a different `AccountInfo`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Credential {
    /// Account key from a connection string; requests are HMAC-signed.
    SharedKey { key: String },
    /// Pre-signed SAS token appended to each request.
    Sas { token: String },
    /// Ambient managed identity; requests carry a bearer token.
    ManagedIdentity,
}

impl fmt::Debug for Credential {
    // Key material and SAS tokens must never reach logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey { .. } => write!(f, "SharedKey(..)"),
            Credential::Sas { .. } => write!(f, "Sas(..)"),
            Credential::ManagedIdentity => write!(f, "ManagedIdentity"),
        }
    }
}

/// Resolved, comparable identity of a storage account.
///
/// Derived deterministically from `ScalerMetadata` plus the process
/// environment. Two values are equal iff they denote the same physical
/// account and auth mode, which makes this usable as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountInfo {
    pub account_name: String,
    pub blob_endpoint: Url,
    pub queue_endpoint: Url,
    pub credential: Credential,
}

impl AccountInfo {
    /// Build an identity-authenticated account from a name and cloud suffix.
    pub fn for_managed_identity(account_name: &str, endpoint_suffix: &str) -> Result<Self> {
        Ok(Self {
            account_name: account_name.to_string(),
            blob_endpoint: service_endpoint(account_name, "blob", endpoint_suffix)?,
            queue_endpoint: service_endpoint(account_name, "queue", endpoint_suffix)?,
            credential: Credential::ManagedIdentity,
        })
    }

    /// Build an account from a parsed connection string, using the given
    /// cloud suffix when the connection string carries no suffix of its own.
    pub fn from_connection_string(conn: &ConnectionString, default_suffix: &str) -> Result<Self> {
        let suffix = conn.endpoint_suffix.as_deref().unwrap_or(default_suffix);
        let blob_endpoint = match &conn.blob_endpoint {
            Some(url) => url.clone(),
            None => service_endpoint(&conn.account_name, "blob", suffix)?,
        };
        let queue_endpoint = match &conn.queue_endpoint {
            Some(url) => url.clone(),
            None => service_endpoint(&conn.account_name, "queue", suffix)?,
        };
        let credential = match (&conn.account_key, &conn.sas_token) {
            (Some(key), None) => Credential::SharedKey { key: key.clone() },
            (None, Some(token)) => Credential::Sas {
                token: token.clone(),
            },
            _ => {
                return Err(ScalerError::Validation(
                    "connection string must carry exactly one of AccountKey and \
                     SharedAccessSignature"
                        .to_string(),
                ))
            }
        };
        Ok(Self {
            account_name: conn.account_name.clone(),
            blob_endpoint,
            queue_endpoint,
            credential,
        })
    }
}

fn service_endpoint(account: &str, service: &str, suffix: &str) -> Result<Url> {
    let raw = format!("https://{account}.{service}.{suffix}");
    Url::parse(&raw)
        .map_err(|e| ScalerError::Validation(format!("invalid storage endpoint {raw:?}: {e}")))
}

/// Parsed `Key=Value;...` storage connection string.
#[derive(Debug, Clone, Default)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub endpoint_suffix: Option<String>,
    pub blob_endpoint: Option<Url>,
    pub queue_endpoint: Option<Url>,
}

impl ConnectionString {
    /// Parse a connection string of the `AccountName=...;AccountKey=...`
    /// form. Unknown keys are ignored (connection strings routinely carry
    /// table/file endpoints this scaler never touches).
    pub fn parse(raw: &str) -> Result<Self> {
        let mut conn = ConnectionString::default();
        for pair in raw.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ScalerError::Validation(format!("malformed connection string segment {pair:?}"))
            })?;
            match key {
                "AccountName" => conn.account_name = value.to_string(),
                "AccountKey" => conn.account_key = Some(value.to_string()),
                "SharedAccessSignature" => {
                    conn.sas_token = Some(value.trim_start_matches('?').to_string())
                }
                "EndpointSuffix" => conn.endpoint_suffix = Some(value.to_string()),
                "BlobEndpoint" => conn.blob_endpoint = Some(parse_endpoint(value)?),
                "QueueEndpoint" => conn.queue_endpoint = Some(parse_endpoint(value)?),
                _ => {}
            }
        }
        if conn.account_name.is_empty() {
            return Err(ScalerError::Validation(
                "connection string is missing AccountName".to_string(),
            ));
        }
        Ok(conn)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    Url::parse(raw)
        .map_err(|e| ScalerError::Validation(format!("invalid endpoint URL {raw:?}: {e}")))
}

/// Resolve the metadata's account identity against a connection-string
/// lookup (the process environment in production).
///
/// Pure and deterministic given the metadata and the lookup result.
pub fn resolve_account(
    metadata: &ScalerMetadata,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Result<AccountInfo> {
    if metadata.use_managed_identity {
        // Validated upstream: managed identity implies account_name is set.
        let account_name = metadata.account_name.as_deref().ok_or_else(|| {
            ScalerError::Validation("accountName is required for managed identity".to_string())
        })?;
        return AccountInfo::for_managed_identity(account_name, metadata.cloud.endpoint_suffix());
    }

    let env_key = metadata.connection_from_env.as_deref().ok_or_else(|| {
        ScalerError::Validation("connectionFromEnv is required".to_string())
    })?;
    let raw = lookup_env(env_key).ok_or_else(|| {
        ScalerError::Validation(format!(
            "environment variable {env_key:?} named by connectionFromEnv is not set"
        ))
    })?;
    let conn = ConnectionString::parse(&raw)?;
    AccountInfo::from_connection_string(&conn, metadata.cloud.endpoint_suffix())
}
