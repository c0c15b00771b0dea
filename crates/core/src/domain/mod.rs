// Domain Layer - Pure scaling logic and entities

pub mod account;
pub mod allocator;
pub mod metadata;
pub mod task_hub;
pub mod usage;

// Re-exports
pub use account::{resolve_account, AccountInfo, ConnectionString, Credential};
pub use allocator::required_workers;
pub use metadata::{CloudEnvironment, ScalerMetadata};
pub use task_hub::{TaskHubInfo, TaskHubNames, TASK_HUB_METADATA_BLOB};
pub use usage::QueueUsageSnapshot;
