pub mod config;
pub mod constants;
pub mod geo;
pub mod subscription;
pub mod viewport;

pub use config::{PipelineConfig, SchedulerConfig, ServiceConfig, SyncProfile};
pub use geo::{LatLng, Point};
pub use subscription::{Listeners, Subscription};
pub use viewport::{Camera, Viewport};
