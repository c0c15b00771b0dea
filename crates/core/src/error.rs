// Central Error Type for the Scaler Core

use thiserror::Error;

use crate::port::task_hub_store::StorageError;

/// Application-level error type.
///
/// A missing task hub is deliberately NOT an error: discovery reports it as
/// an explicit `HubNotFound` outcome and the service layer maps it to
/// "inactive / zero load". Only request-rejections and storage faults reach
/// this type.
#[derive(Error, Debug)]
pub enum ScalerError {
    /// Malformed, missing, or contradictory scale-target metadata.
    /// Surfaced to the caller as a request rejection; never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Underlying storage or network failure. Surfaced as an RPC failure so
    /// the autoscaling controller retries on its own poll cadence; never
    /// silently treated as zero backlog.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias using ScalerError
pub type Result<T> = std::result::Result<T, ScalerError>;
