//! Seams between the pipeline and the host's rendering engine.

use crate::core::geo::LatLng;
use crate::data::geojson::FeatureCollection;

/// The map surface the pipeline draws onto.
///
/// Implemented by the host on top of whatever renders the map (a WebGL style
/// engine, a native widget, or a recorder in tests). Calls are made from the
/// thread that drives the pipeline.
pub trait MapSurface {
    /// Replace the cluster source data wholesale
    fn set_source_data(&mut self, source_id: &str, features: &FeatureCollection);

    /// Show or hide one style layer
    fn set_layer_visibility(&mut self, layer_id: &str, visible: bool);

    /// Animate the camera; the surface emits `MoveStart`/`MoveEnd` around it
    fn ease_to(&mut self, center: LatLng, zoom: f64);
}

/// Surface that discards everything, for headless pipelines
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl MapSurface for NullSurface {
    fn set_source_data(&mut self, _source_id: &str, _features: &FeatureCollection) {}

    fn set_layer_visibility(&mut self, _layer_id: &str, _visible: bool) {}

    fn ease_to(&mut self, _center: LatLng, _zoom: f64) {}
}
