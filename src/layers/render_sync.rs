//! Pushes accepted feature collections and layer visibility to the surface.
//!
//! Features are always replaced wholesale: cluster ids are not stable across
//! zoom levels, so there is nothing meaningful to diff against.

use crate::core::constants::CLUSTER_SOURCE_ID;
use crate::data::geojson::{FeatureCollection, PointFeature};
use crate::layers::definitions::{standard_layers, LayerDefinition, LayerKind, LayerSelection};
use crate::traits::MapSurface;
use crate::{MapError, Result};

pub struct RenderSync {
    source_id: String,
    layers: Vec<LayerDefinition>,
    features: FeatureCollection,
    selection: LayerSelection,
    applied_sequence: Option<u64>,
}

impl RenderSync {
    pub fn new() -> Self {
        Self {
            source_id: CLUSTER_SOURCE_ID.to_string(),
            layers: standard_layers(),
            features: FeatureCollection::default(),
            selection: LayerSelection::default(),
            applied_sequence: None,
        }
    }

    /// Uses a custom layer set. Every selection must map to exactly one point layer.
    pub fn with_layers(source_id: impl Into<String>, layers: Vec<LayerDefinition>) -> Result<Self> {
        for selection in [LayerSelection::AllPoints, LayerSelection::FeaturedOnly] {
            let matching = layers
                .iter()
                .filter(|layer| layer.kind == LayerKind::Point && layer.selected_by == Some(selection))
                .count();
            if matching != 1 {
                return Err(MapError::Config(format!(
                    "{:?} must select exactly one point layer, found {}",
                    selection, matching
                )));
            }
        }
        Ok(Self {
            source_id: source_id.into(),
            layers,
            ..Self::new()
        })
    }

    /// Replaces the rendered collection
    pub fn apply(&mut self, sequence_id: u64, features: FeatureCollection, surface: &mut dyn MapSurface) {
        log::debug!(
            "rendering {} features from response #{} into `{}`",
            features.len(),
            sequence_id,
            self.source_id
        );
        self.features = features;
        self.applied_sequence = Some(sequence_id);
        surface.set_source_data(&self.source_id, &self.features);
    }

    /// Changes the exclusive point layer. Re-selecting the current one is a no-op.
    pub fn set_selection(&mut self, selection: LayerSelection, surface: &mut dyn MapSurface) -> bool {
        if selection == self.selection {
            return false;
        }
        log::debug!("layer selection {:?} -> {:?}", self.selection, selection);
        self.selection = selection;
        self.apply_layer_visibility(surface);
        true
    }

    /// Pushes the visibility of every layer for the current selection
    pub fn apply_layer_visibility(&self, surface: &mut dyn MapSurface) {
        for layer in &self.layers {
            surface.set_layer_visibility(&layer.id, layer.is_visible_for(self.selection));
        }
    }

    pub fn is_layer_visible(&self, layer_id: &str) -> Option<bool> {
        self.layers
            .iter()
            .find(|layer| layer.id == layer_id)
            .map(|layer| layer.is_visible_for(self.selection))
    }

    /// `(layer id, visible)` for every layer, in definition order
    pub fn visibility(&self) -> Vec<(&str, bool)> {
        self.layers
            .iter()
            .map(|layer| (layer.id.as_str(), layer.is_visible_for(self.selection)))
            .collect()
    }

    /// Points the visible point layer actually draws
    pub fn visible_points(&self) -> Vec<&PointFeature> {
        let Some(layer) = self
            .layers
            .iter()
            .find(|layer| layer.kind == LayerKind::Point && layer.is_visible_for(self.selection))
        else {
            return Vec::new();
        };
        self.features
            .points()
            .filter(|point| layer.draws_point(point))
            .collect()
    }

    pub fn features(&self) -> &FeatureCollection {
        &self.features
    }

    pub fn selection(&self) -> LayerSelection {
        self.selection
    }

    pub fn applied_sequence(&self) -> Option<u64> {
        self.applied_sequence
    }

    pub fn layers(&self) -> &[LayerDefinition] {
        &self.layers
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl Default for RenderSync {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;
    use crate::data::geojson::{ClusterFeature, Feature, PropertyBag, PropertyValue};
    use crate::layers::definitions::{
        CLUSTER_CIRCLES, CLUSTER_COUNTS, ENTREPRENEUR_POINTS, FEATURED_POINTS, GRADUATE_POINTS,
        UNCLUSTERED_POINTS,
    };
    use crate::prelude::HashMap;

    #[derive(Default)]
    struct RecordingSurface {
        data_pushes: usize,
        last_len: usize,
        visibility: HashMap<String, bool>,
    }

    impl MapSurface for RecordingSurface {
        fn set_source_data(&mut self, _source_id: &str, features: &FeatureCollection) {
            self.data_pushes += 1;
            self.last_len = features.len();
        }

        fn set_layer_visibility(&mut self, layer_id: &str, visible: bool) {
            self.visibility.insert(layer_id.to_string(), visible);
        }

        fn ease_to(&mut self, _center: LatLng, _zoom: f64) {}
    }

    fn collection() -> FeatureCollection {
        let mut features: Vec<Feature> = (0..3)
            .map(|i| {
                Feature::Cluster(ClusterFeature {
                    cluster_id: Some(i.to_string()),
                    coordinates: LatLng::new(i as f64, 0.0),
                    point_count: 10,
                    point_count_abbreviated: "10".to_string(),
                    expansion_zoom: Some(7),
                })
            })
            .collect();
        for featured in [true, false] {
            let mut properties = PropertyBag::default();
            properties.insert("is_featured".to_string(), PropertyValue::Bool(featured));
            features.push(Feature::Point(PointFeature {
                id: None,
                coordinates: LatLng::new(1.0, 1.0),
                properties,
            }));
        }
        FeatureCollection::new(features)
    }

    #[test]
    fn test_apply_replaces_collection() {
        let mut render = RenderSync::new();
        let mut surface = RecordingSurface::default();

        render.apply(1, collection(), &mut surface);
        assert_eq!(render.features().len(), 5);
        assert_eq!(surface.last_len, 5);

        render.apply(2, FeatureCollection::default(), &mut surface);
        assert!(render.features().is_empty());
        assert_eq!(surface.data_pushes, 2);
        assert_eq!(render.applied_sequence(), Some(2));
    }

    #[test]
    fn test_default_visibility() {
        let render = RenderSync::new();
        let mut surface = RecordingSurface::default();
        render.apply_layer_visibility(&mut surface);

        assert_eq!(surface.visibility[CLUSTER_CIRCLES], true);
        assert_eq!(surface.visibility[CLUSTER_COUNTS], true);
        assert_eq!(surface.visibility[UNCLUSTERED_POINTS], true);
        assert_eq!(surface.visibility[FEATURED_POINTS], false);
        assert_eq!(surface.visibility[GRADUATE_POINTS], false);
        assert_eq!(surface.visibility[ENTREPRENEUR_POINTS], false);
    }

    #[test]
    fn test_featured_selection() {
        let mut render = RenderSync::new();
        let mut surface = RecordingSurface::default();
        render.apply(1, collection(), &mut surface);

        assert!(render.set_selection(LayerSelection::FeaturedOnly, &mut surface));
        assert_eq!(surface.visibility[UNCLUSTERED_POINTS], false);
        assert_eq!(surface.visibility[FEATURED_POINTS], true);
        assert_eq!(surface.visibility[CLUSTER_CIRCLES], true);
        assert_eq!(render.visible_points().len(), 1);

        assert!(render.set_selection(LayerSelection::AllPoints, &mut surface));
        assert_eq!(render.visible_points().len(), 2);
    }

    #[test]
    fn test_reselecting_is_noop() {
        let mut render = RenderSync::new();
        let mut surface = RecordingSurface::default();

        assert!(!render.set_selection(LayerSelection::AllPoints, &mut surface));
        assert!(surface.visibility.is_empty());
    }

    #[test]
    fn test_custom_layers_must_be_exclusive() {
        let layers = vec![
            LayerDefinition::cluster("c"),
            LayerDefinition::point("a", None, Some(LayerSelection::AllPoints)),
            LayerDefinition::point("b", None, Some(LayerSelection::AllPoints)),
            LayerDefinition::point("f", Some("is_featured"), Some(LayerSelection::FeaturedOnly)),
        ];
        assert!(RenderSync::with_layers("src", layers).is_err());

        let layers = vec![
            LayerDefinition::point("a", None, Some(LayerSelection::AllPoints)),
            LayerDefinition::point("f", Some("is_featured"), Some(LayerSelection::FeaturedOnly)),
        ];
        let render = RenderSync::with_layers("src", layers).unwrap();
        assert_eq!(render.source_id(), "src");
        assert_eq!(render.is_layer_visible("a"), Some(true));
        assert_eq!(render.is_layer_visible("missing"), None);
    }
}
