//! RPC Error Types
//!
//! Maps scaler errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;

use durascaler_core::error::ScalerError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const STORAGE_ERROR: i32 = 5001;
}

/// Convert ScalerError to a JSON-RPC ErrorObject.
///
/// Validation failures are request rejections; storage failures signal the
/// controller to keep its current scale and retry on its next poll. An
/// unprovisioned hub never reaches this mapping - the service reports it
/// as inactive / zero load instead of an error.
pub fn to_rpc_error(err: ScalerError) -> ErrorObjectOwned {
    match err {
        ScalerError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        ScalerError::Storage(e) => {
            ErrorObjectOwned::owned(code::STORAGE_ERROR, e.to_string(), None::<()>)
        }
    }
}
