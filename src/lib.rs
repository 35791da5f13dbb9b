//! # Clusterlet
//!
//! Keeps a map's clustered point layer in sync with a remote clustering
//! service while the user pans, zooms and drills into clusters.
//!
//! The crate is host-agnostic: the embedding application feeds camera
//! events and a clock into a [`ClusterPipeline`], and the pipeline answers
//! by pushing feature data and layer visibility into a [`MapSurface`].

pub mod background;
pub mod core;
pub mod data;
pub mod input;
pub mod layers;
pub mod pipeline;
pub mod prelude;
pub mod runtime;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{PipelineConfig, SchedulerConfig, ServiceConfig, SyncProfile},
    geo::LatLng,
    viewport::{Camera, Viewport},
};

pub use data::{
    filters::{FilterCatalogue, FilterSet, FilterState, FilterValue},
    geojson::{Feature, FeatureCollection},
};

pub use input::{
    drill_down::{CameraCommand, DrillDownController},
    events::MapEvent,
    tracker::ViewportTracker,
};

pub use background::{
    coordinator::{ClusterFetchCoordinator, FetchOutcome, FetchRequest},
    scheduler::RequestScheduler,
    service::ClusterService,
};

#[cfg(not(target_arch = "wasm32"))]
pub use background::service::HttpClusterService;

pub use layers::{definitions::LayerSelection, render_sync::RenderSync};

pub use pipeline::{ClusterPipeline, PipelineStatus};

pub use traits::MapSurface;

use std::time::Duration;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid viewport: {0}")]
    InvalidViewport(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Why a single cluster fetch did not produce features.
///
/// Cloneable so one failure can be both logged and surfaced to listeners.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Network(String),

    #[error("service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no response within {0:?}")]
    TimedOut(Duration),

    #[error("request task ended without a result")]
    Abandoned,

    #[error("{0}")]
    Service(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

/// Error type alias for convenience
pub type Error = MapError;

/// Installs `env_logger` (default level `info`, overridable via `RUST_LOG`).
/// Calling it more than once is harmless.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
