//! Cluster click handling: zoom into the cluster, then refetch on arrival.

use crate::core::config::PipelineConfig;
use crate::core::geo::LatLng;
use crate::data::geojson::{ClusterFeature, PointFeature, PropertyBag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DrillDownState {
    Idle,
    /// A cluster was clicked; the camera move has not been issued yet
    ZoomRequested { target_zoom: f64 },
    /// The camera is animating towards the target
    Settling { target_zoom: f64 },
}

/// Camera move the host should animate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraCommand {
    pub center: LatLng,
    pub zoom: f64,
}

/// Flags the detail view uses to decide which panels to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFlags {
    pub story: bool,
    pub data: bool,
    pub is_featured_video: bool,
    pub is_featured: bool,
}

/// Emitted when an individual point is clicked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRequest {
    pub feature_id: Option<String>,
    pub coordinates: LatLng,
    pub flags: DetailFlags,
    pub properties: PropertyBag,
}

impl DetailRequest {
    pub fn from_point(point: &PointFeature) -> Self {
        Self {
            feature_id: point.id.clone(),
            coordinates: point.coordinates,
            flags: DetailFlags {
                story: point.flag("story"),
                data: point.flag("data"),
                is_featured_video: point.flag("is_featured_video"),
                is_featured: point.flag("is_featured"),
            },
            properties: point.properties.clone(),
        }
    }
}

pub struct DrillDownController {
    state: DrillDownState,
    max_zoom: u8,
    step: u8,
}

impl DrillDownController {
    pub fn new(max_zoom: u8, step: u8) -> Self {
        Self {
            state: DrillDownState::Idle,
            max_zoom,
            step,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_zoom, config.drill_down_step)
    }

    pub fn state(&self) -> DrillDownState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != DrillDownState::Idle
    }

    /// Zoom a click on `cluster` should land on, given the camera's zoom
    pub fn target_zoom(&self, cluster: &ClusterFeature, current_zoom: f64) -> f64 {
        let target = match cluster.expansion_zoom {
            Some(zoom) => f64::from(zoom),
            None => current_zoom + f64::from(self.step),
        };
        target.min(f64::from(self.max_zoom))
    }

    /// `Idle -> ZoomRequested`. A click during an ongoing drill-down restarts it.
    pub fn on_cluster_click(&mut self, cluster: &ClusterFeature, current_zoom: f64) -> CameraCommand {
        let target_zoom = self.target_zoom(cluster, current_zoom);
        log::debug!(
            "drill-down into cluster {:?} ({} points): zoom {:.2} -> {:.2}",
            cluster.cluster_id,
            cluster.point_count,
            current_zoom,
            target_zoom
        );
        self.state = DrillDownState::ZoomRequested { target_zoom };
        CameraCommand {
            center: cluster.coordinates,
            zoom: target_zoom,
        }
    }

    /// `ZoomRequested -> Settling`, once the camera move has been issued
    pub fn commanded(&mut self) {
        if let DrillDownState::ZoomRequested { target_zoom } = self.state {
            self.state = DrillDownState::Settling { target_zoom };
        }
    }

    /// `Settling -> Idle` on camera-move completion.
    ///
    /// Returns `true` when the move belonged to a drill-down, in which case the
    /// caller fetches right away instead of waiting for the idle debounce.
    pub fn on_move_end(&mut self) -> bool {
        match self.state {
            DrillDownState::Settling { target_zoom } | DrillDownState::ZoomRequested { target_zoom } => {
                log::debug!("drill-down settled at zoom {:.2}", target_zoom);
                self.state = DrillDownState::Idle;
                true
            }
            DrillDownState::Idle => false,
        }
    }

    /// Point clicks never touch the state machine
    pub fn on_point_click(&self, point: &PointFeature) -> DetailRequest {
        DetailRequest::from_point(point)
    }

    pub fn reset(&mut self) {
        self.state = DrillDownState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geojson::PropertyValue;

    fn cluster(expansion_zoom: Option<u8>) -> ClusterFeature {
        ClusterFeature {
            cluster_id: Some("7".to_string()),
            coordinates: LatLng::new(10.0, 20.0),
            point_count: 42,
            point_count_abbreviated: "42".to_string(),
            expansion_zoom,
        }
    }

    #[test]
    fn test_expansion_zoom_is_used() {
        let mut controller = DrillDownController::new(16, 2);
        let command = controller.on_cluster_click(&cluster(Some(9)), 6.0);

        assert_eq!(command.zoom, 9.0);
        assert_eq!(command.center, LatLng::new(10.0, 20.0));
        assert_eq!(controller.state(), DrillDownState::ZoomRequested { target_zoom: 9.0 });
    }

    #[test]
    fn test_default_step_and_clamp() {
        let controller = DrillDownController::new(16, 2);
        assert_eq!(controller.target_zoom(&cluster(None), 6.0), 8.0);
        assert_eq!(controller.target_zoom(&cluster(None), 15.5), 16.0);
        assert_eq!(controller.target_zoom(&cluster(Some(18)), 12.0), 16.0);
    }

    #[test]
    fn test_state_machine_round_trip() {
        let mut controller = DrillDownController::new(16, 2);
        assert!(!controller.on_move_end());

        controller.on_cluster_click(&cluster(None), 4.0);
        controller.commanded();
        assert_eq!(controller.state(), DrillDownState::Settling { target_zoom: 6.0 });

        assert!(controller.on_move_end());
        assert_eq!(controller.state(), DrillDownState::Idle);
        assert!(!controller.on_move_end());
    }

    #[test]
    fn test_point_click_builds_detail_request() {
        let controller = DrillDownController::new(16, 2);
        let mut properties = PropertyBag::default();
        properties.insert("story".to_string(), PropertyValue::Bool(true));
        properties.insert("is_featured_video".to_string(), PropertyValue::String("true".to_string()));
        let point = PointFeature {
            id: Some("1234".to_string()),
            coordinates: LatLng::new(1.0, 2.0),
            properties,
        };

        let request = controller.on_point_click(&point);

        assert_eq!(request.feature_id.as_deref(), Some("1234"));
        assert!(request.flags.story);
        assert!(request.flags.is_featured_video);
        assert!(!request.flags.data);
        assert_eq!(controller.state(), DrillDownState::Idle);
    }
}
