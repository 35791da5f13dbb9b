pub mod coordinator;
pub mod scheduler;
pub mod service;

pub use coordinator::{ClusterFetchCoordinator, FetchCompletion, FetchOutcome, FetchRequest, FetchResult};
pub use scheduler::{Gate, RequestScheduler};
pub use service::{ClusterQuery, ClusterService, HttpClusterService, ServiceStats};
