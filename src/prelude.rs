//! Prelude module for common clusterlet types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use clusterlet::prelude::*;`

pub use crate::core::{
    config::{PipelineConfig, SchedulerConfig, ServiceConfig, SyncProfile},
    geo::{LatLng, Point},
    subscription::{Listeners, Subscription},
    viewport::{Camera, Viewport},
};

pub use crate::data::{
    filters::{FilterCatalogue, FilterKind, FilterSet, FilterState, FilterValue},
    geojson::{ClusterFeature, Feature, FeatureCollection, PointFeature, PropertyValue},
};

pub use crate::input::{
    drill_down::{CameraCommand, DetailRequest, DrillDownController, DrillDownState},
    events::{InteractionEdge, InteractionKind, MapEvent},
    tracker::{InteractionPhase, ViewportSnapshot, ViewportTracker},
};

pub use crate::background::{
    coordinator::{ClusterFetchCoordinator, FetchCompletion, FetchOutcome, FetchRequest, FetchResult},
    scheduler::{Gate, RequestScheduler},
    service::{ClusterQuery, ClusterService, ServiceStats},
};

#[cfg(not(target_arch = "wasm32"))]
pub use crate::background::service::HttpClusterService;

pub use crate::layers::{
    definitions::{LayerDefinition, LayerKind, LayerSelection},
    render_sync::RenderSync,
};

pub use crate::pipeline::{ClusterPipeline, Notice, PipelineStatus};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::traits::MapSurface;

pub use crate::{Error as MapError, FetchError, Result};

pub use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

pub use instant::Instant;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
