//! JSON-RPC API Layer
//!
//! Exposes the scaler protocol (activity check, metric spec, metric value)
//! over JSON-RPC 2.0.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
