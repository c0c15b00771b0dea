// Port Layer - Interfaces for external dependencies

pub mod account_resolver;
pub mod task_hub_store;

// Re-exports
pub use account_resolver::{AccountResolver, EnvAccountResolver};
pub use task_hub_store::{QueueDepth, StorageError, TaskHubStore};
