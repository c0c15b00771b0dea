// Account Resolver Port (for deterministic testing)

use crate::domain::{resolve_account, AccountInfo, ScalerMetadata};
use crate::error::Result;

/// Resolves validated metadata to a storage-account identity.
///
/// Pure and deterministic given the metadata and the process environment;
/// failures are validation errors, never storage faults.
pub trait AccountResolver: Send + Sync {
    fn resolve(&self, metadata: &ScalerMetadata) -> Result<AccountInfo>;
}

/// Production resolver backed by process environment variables.
pub struct EnvAccountResolver;

impl AccountResolver for EnvAccountResolver {
    fn resolve(&self, metadata: &ScalerMetadata) -> Result<AccountInfo> {
        resolve_account(metadata, |key| std::env::var(key).ok())
    }
}
