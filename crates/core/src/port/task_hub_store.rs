// Task Hub Store Port (Interface)
// Read-only storage access: one metadata record read, one queue depth read

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AccountInfo;

/// Storage-layer failure. Always transient from the scaler's point of view:
/// the autoscaling controller retries on its own poll cadence, so nothing
/// here is retried locally.
///
/// `Clone` because a single in-flight discovery fans its outcome out to
/// every concurrent waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Request never produced a service response (DNS, TLS, timeout, ...).
    #[error("Storage transport error: {0}")]
    Transport(String),

    /// Credential material could not be applied or refreshed.
    #[error("Storage auth error: {0}")]
    Auth(String),

    /// The service answered with an unexpected status.
    #[error("Storage service error ({status}): {message}")]
    Service { status: u16, message: String },
}

/// Approximate depth of one queue.
///
/// A queue the service definitively reports as absent is distinct from an
/// error: the hub's metadata may exist before all of its queues do, and a
/// missing queue simply holds no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDepth {
    Messages(u64),
    Missing,
}

impl QueueDepth {
    pub fn message_count(self) -> u64 {
        match self {
            QueueDepth::Messages(count) => count,
            QueueDepth::Missing => 0,
        }
    }
}

/// Read-only storage port used by discovery and usage measurement.
///
/// Implementations perform no retries and need no write/delete capability.
#[async_trait]
pub trait TaskHubStore: Send + Sync {
    /// Read a named metadata record (a blob). `Ok(None)` when the record
    /// does not exist.
    async fn read_metadata_record(
        &self,
        account: &AccountInfo,
        container: &str,
        blob: &str,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Read the approximate message count of a named queue.
    async fn queue_depth(
        &self,
        account: &AccountInfo,
        queue: &str,
    ) -> Result<QueueDepth, StorageError>;
}
