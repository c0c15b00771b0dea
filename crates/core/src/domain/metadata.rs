// Scale Target Metadata - validated per-request configuration

use std::collections::HashMap;

use crate::error::{Result, ScalerError};

/// Metadata keys as they appear in the controller's key/value map.
const KEY_TASK_HUB_NAME: &str = "taskHubName";
const KEY_ACCOUNT_NAME: &str = "accountName";
const KEY_CONNECTION_FROM_ENV: &str = "connectionFromEnv";
const KEY_CLOUD: &str = "cloud";
const KEY_ENDPOINT_SUFFIX: &str = "endpointSuffix";
const KEY_MAX_ORCHESTRATIONS: &str = "maxOrchestrationsPerWorker";
const KEY_MAX_ACTIVITIES: &str = "maxActivitiesPerWorker";
const KEY_USE_MANAGED_IDENTITY: &str = "useManagedIdentity";

const DEFAULT_MAX_ORCHESTRATIONS_PER_WORKER: u32 = 5;
const DEFAULT_MAX_ACTIVITIES_PER_WORKER: u32 = 10;

/// Task hub names become queue-name prefixes; Azure queue names cap out at
/// 63 characters and the longest generated suffix is "-control-NN".
const MAX_TASK_HUB_NAME_LEN: usize = 45;

/// Which cloud the storage account lives in. Determines the default
/// endpoint suffix used when building service URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CloudEnvironment {
    AzurePublic,
    AzureChina,
    AzureUsGov,
    /// Sovereign / on-prem deployment with an explicit endpoint suffix.
    Private { endpoint_suffix: String },
}

impl CloudEnvironment {
    /// DNS suffix for storage service endpoints in this cloud.
    pub fn endpoint_suffix(&self) -> &str {
        match self {
            CloudEnvironment::AzurePublic => "core.windows.net",
            CloudEnvironment::AzureChina => "core.chinacloudapi.cn",
            CloudEnvironment::AzureUsGov => "core.usgovcloudapi.net",
            CloudEnvironment::Private { endpoint_suffix } => endpoint_suffix,
        }
    }
}

/// Validated configuration for one scale target.
///
/// Built from the untyped metadata map carried by each RPC request.
/// Immutable once validated; validation failure is terminal for the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalerMetadata {
    pub task_hub_name: String,
    /// Set iff `use_managed_identity` - the storage account addressed by
    /// name, authenticated with ambient identity.
    pub account_name: Option<String>,
    /// Set iff NOT `use_managed_identity` - the name of a process env var
    /// holding a storage connection string.
    pub connection_from_env: Option<String>,
    pub cloud: CloudEnvironment,
    pub max_orchestrations_per_worker: u32,
    pub max_activities_per_worker: u32,
    pub use_managed_identity: bool,
}

impl ScalerMetadata {
    /// Validate the untyped metadata map into a typed configuration.
    ///
    /// # Errors
    /// `ScalerError::Validation` on any malformed, missing, or
    /// contradictory field. No storage work happens before this succeeds.
    pub fn from_map(metadata: &HashMap<String, String>) -> Result<Self> {
        let task_hub_name = required(metadata, KEY_TASK_HUB_NAME)?;
        validate_task_hub_name(&task_hub_name)?;

        let account_name = optional(metadata, KEY_ACCOUNT_NAME);
        let connection_from_env = optional(metadata, KEY_CONNECTION_FROM_ENV);
        let use_managed_identity = parse_bool(metadata, KEY_USE_MANAGED_IDENTITY, false)?;

        // Account identity is mutually constrained: identity-based auth
        // addresses the account by name, connection-based auth by env
        // reference. Exactly one of the two must be present.
        if account_name.is_some() && connection_from_env.is_some() {
            return Err(ScalerError::Validation(format!(
                "{KEY_ACCOUNT_NAME} and {KEY_CONNECTION_FROM_ENV} are mutually exclusive"
            )));
        }
        if use_managed_identity && account_name.is_none() {
            return Err(ScalerError::Validation(format!(
                "{KEY_ACCOUNT_NAME} is required when {KEY_USE_MANAGED_IDENTITY} is true"
            )));
        }
        if !use_managed_identity && connection_from_env.is_none() {
            return Err(ScalerError::Validation(format!(
                "{KEY_CONNECTION_FROM_ENV} is required unless {KEY_USE_MANAGED_IDENTITY} is true"
            )));
        }

        let cloud = parse_cloud(metadata)?;

        let max_orchestrations_per_worker = parse_capacity(
            metadata,
            KEY_MAX_ORCHESTRATIONS,
            DEFAULT_MAX_ORCHESTRATIONS_PER_WORKER,
        )?;
        let max_activities_per_worker =
            parse_capacity(metadata, KEY_MAX_ACTIVITIES, DEFAULT_MAX_ACTIVITIES_PER_WORKER)?;

        Ok(Self {
            task_hub_name,
            account_name,
            connection_from_env,
            cloud,
            max_orchestrations_per_worker,
            max_activities_per_worker,
            use_managed_identity,
        })
    }
}

fn required(metadata: &HashMap<String, String>, key: &str) -> Result<String> {
    optional(metadata, key)
        .ok_or_else(|| ScalerError::Validation(format!("{key} is required and must not be empty")))
}

fn optional(metadata: &HashMap<String, String>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_task_hub_name(name: &str) -> Result<()> {
    if name.len() > MAX_TASK_HUB_NAME_LEN {
        return Err(ScalerError::Validation(format!(
            "{KEY_TASK_HUB_NAME} is too long ({} chars, max {MAX_TASK_HUB_NAME_LEN})",
            name.len()
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ScalerError::Validation(format!(
            "{KEY_TASK_HUB_NAME} must be alphanumeric, got {name:?}"
        )));
    }
    Ok(())
}

fn parse_bool(metadata: &HashMap<String, String>, key: &str, default: bool) -> Result<bool> {
    match optional(metadata, key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ScalerError::Validation(format!(
                "{key} must be true or false, got {raw:?}"
            ))),
        },
    }
}

fn parse_capacity(metadata: &HashMap<String, String>, key: &str, default: u32) -> Result<u32> {
    match optional(metadata, key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(n),
            Ok(n) => Err(ScalerError::Validation(format!(
                "{key} must be at least 1, got {n}"
            ))),
            Err(_) => Err(ScalerError::Validation(format!(
                "{key} must be a positive integer, got {raw:?}"
            ))),
        },
    }
}

fn parse_cloud(metadata: &HashMap<String, String>) -> Result<CloudEnvironment> {
    let raw = match optional(metadata, KEY_CLOUD) {
        None => return Ok(CloudEnvironment::AzurePublic),
        Some(raw) => raw,
    };
    match raw.to_ascii_lowercase().as_str() {
        "azurepubliccloud" => Ok(CloudEnvironment::AzurePublic),
        "azurechinacloud" => Ok(CloudEnvironment::AzureChina),
        "azureusgovernmentcloud" => Ok(CloudEnvironment::AzureUsGov),
        "private" => {
            let endpoint_suffix = required(metadata, KEY_ENDPOINT_SUFFIX)?;
            Ok(CloudEnvironment::Private { endpoint_suffix })
        }
        _ => Err(ScalerError::Validation(format!(
            "unknown {KEY_CLOUD} value {raw:?}"
        ))),
    }
}
