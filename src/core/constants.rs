//! Reference values for the cluster synchronization pipeline.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers;
//! the pipeline itself only ever reads them through [`PipelineConfig`](super::config::PipelineConfig).

/// Below this (rounded) zoom level no fetch is issued and the "zoom in" notice is shown.
pub const MIN_FETCH_ZOOM: u8 = 2;

/// Highest zoom the clustering service builds clusters for.
pub const DEFAULT_MAX_ZOOM: u8 = 16;

/// Zoom levels added on a cluster click when the service gave no expansion hint.
pub const DRILL_DOWN_STEP: u8 = 2;

/// Quiet period after the last interaction end-event before the map counts as idle.
pub const IDLE_DELAY_MS: u64 = 500;

/// Minimum spacing between fetches during continuous interaction.
pub const FETCH_THROTTLE_MS: u64 = 2_000;

/// Trailing-edge quiet period for the fetch pipeline.
pub const FETCH_DEBOUNCE_MS: u64 = 800;

/// Trailing-edge quiet period for lightweight UI debouncing (no throttle).
pub const UI_DEBOUNCE_MS: u64 = 300;

/// In-flight requests older than this are treated as failed.
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Feature source the clustering results are written to.
pub const CLUSTER_SOURCE_ID: &str = "clusters";

/// Web Mercator tile size in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Web Mercator projection.
pub const MAX_LATITUDE: f64 = 85.0511287798;
