//! Style layers drawn from the cluster source.

use crate::data::geojson::PointFeature;
use serde::{Deserialize, Serialize};

pub const CLUSTER_CIRCLES: &str = "clusters-circles";
pub const CLUSTER_COUNTS: &str = "cluster-counts";
pub const UNCLUSTERED_POINTS: &str = "unclustered-points";
pub const FEATURED_POINTS: &str = "featured-points";
pub const GRADUATE_POINTS: &str = "graduate-points";
pub const ENTREPRENEUR_POINTS: &str = "entrepreneur-points";

/// The user-selectable point layers; exactly one is visible at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayerSelection {
    #[default]
    AllPoints,
    FeaturedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Drawn from cluster features; always visible
    Cluster,
    /// Drawn from individual points; visibility follows the selection
    Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub id: String,
    pub kind: LayerKind,
    /// Only points whose property is truthy are drawn
    pub filter_field: Option<String>,
    /// Selection that shows this layer; `None` keeps a point layer hidden
    pub selected_by: Option<LayerSelection>,
}

impl LayerDefinition {
    pub fn cluster(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: LayerKind::Cluster,
            filter_field: None,
            selected_by: None,
        }
    }

    pub fn point(id: &str, filter_field: Option<&str>, selected_by: Option<LayerSelection>) -> Self {
        Self {
            id: id.to_string(),
            kind: LayerKind::Point,
            filter_field: filter_field.map(str::to_string),
            selected_by,
        }
    }

    pub fn is_visible_for(&self, selection: LayerSelection) -> bool {
        match self.kind {
            LayerKind::Cluster => true,
            LayerKind::Point => self.selected_by == Some(selection),
        }
    }

    pub fn draws_point(&self, point: &PointFeature) -> bool {
        self.kind == LayerKind::Point
            && self
                .filter_field
                .as_deref()
                .map_or(true, |field| point.flag(field))
    }
}

/// Cluster circles and counts, plus one point layer per category
pub fn standard_layers() -> Vec<LayerDefinition> {
    vec![
        LayerDefinition::cluster(CLUSTER_CIRCLES),
        LayerDefinition::cluster(CLUSTER_COUNTS),
        LayerDefinition::point(UNCLUSTERED_POINTS, None, Some(LayerSelection::AllPoints)),
        LayerDefinition::point(GRADUATE_POINTS, Some("is_graduate_learner"), None),
        LayerDefinition::point(ENTREPRENEUR_POINTS, Some("is_running_a_venture"), None),
        LayerDefinition::point(FEATURED_POINTS, Some("is_featured"), Some(LayerSelection::FeaturedOnly)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;
    use crate::data::geojson::{PropertyBag, PropertyValue};

    fn point(featured: bool) -> PointFeature {
        let mut properties = PropertyBag::default();
        properties.insert("is_featured".to_string(), PropertyValue::Bool(featured));
        PointFeature {
            id: None,
            coordinates: LatLng::new(0.0, 0.0),
            properties,
        }
    }

    #[test]
    fn test_featured_layer_filters_points() {
        let layers = standard_layers();
        let featured = layers.iter().find(|l| l.id == FEATURED_POINTS).unwrap();
        let all = layers.iter().find(|l| l.id == UNCLUSTERED_POINTS).unwrap();

        assert!(featured.draws_point(&point(true)));
        assert!(!featured.draws_point(&point(false)));
        assert!(all.draws_point(&point(false)));
    }

    #[test]
    fn test_every_selection_shows_one_point_layer() {
        let layers = standard_layers();
        for selection in [LayerSelection::AllPoints, LayerSelection::FeaturedOnly] {
            let visible_points = layers
                .iter()
                .filter(|l| l.kind == LayerKind::Point && l.is_visible_for(selection))
                .count();
            assert_eq!(visible_points, 1);
            assert!(layers
                .iter()
                .filter(|l| l.kind == LayerKind::Cluster)
                .all(|l| l.is_visible_for(selection)));
        }
    }
}
