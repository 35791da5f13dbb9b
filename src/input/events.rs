use crate::core::viewport::Camera;
use crate::data::geojson::{ClusterFeature, PointFeature};
use serde::{Deserialize, Serialize};

/// Events the host forwards from its map engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapEvent {
    /// Camera moved (fires continuously during interaction)
    ViewChanged { camera: Camera },
    PointerDown,
    PointerUp,
    TouchStart,
    TouchEnd,
    DragStart,
    DragEnd,
    ZoomStart,
    ZoomEnd,
    PitchStart,
    PitchEnd,
    RotateStart,
    RotateEnd,
    MoveStart,
    MoveEnd,
    /// A rendered cluster was clicked
    ClusterClick { cluster: ClusterFeature },
    /// A rendered individual point was clicked
    PointClick { point: PointFeature },
}

/// Which gesture family an interaction event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    Pointer,
    Touch,
    Drag,
    Zoom,
    Pitch,
    Rotate,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionEdge {
    Start,
    End,
}

impl MapEvent {
    /// Classifies paired start/end events; `None` for everything else
    pub fn interaction(&self) -> Option<(InteractionKind, InteractionEdge)> {
        use InteractionEdge::{End, Start};
        use InteractionKind::*;

        let pair = match self {
            MapEvent::PointerDown => (Pointer, Start),
            MapEvent::PointerUp => (Pointer, End),
            MapEvent::TouchStart => (Touch, Start),
            MapEvent::TouchEnd => (Touch, End),
            MapEvent::DragStart => (Drag, Start),
            MapEvent::DragEnd => (Drag, End),
            MapEvent::ZoomStart => (Zoom, Start),
            MapEvent::ZoomEnd => (Zoom, End),
            MapEvent::PitchStart => (Pitch, Start),
            MapEvent::PitchEnd => (Pitch, End),
            MapEvent::RotateStart => (Rotate, Start),
            MapEvent::RotateEnd => (Rotate, End),
            MapEvent::MoveStart => (Move, Start),
            MapEvent::MoveEnd => (Move, End),
            MapEvent::ViewChanged { .. }
            | MapEvent::ClusterClick { .. }
            | MapEvent::PointClick { .. } => return None,
        };
        Some(pair)
    }

    pub fn is_interaction_start(&self) -> bool {
        matches!(self.interaction(), Some((_, InteractionEdge::Start)))
    }

    pub fn is_interaction_end(&self) -> bool {
        matches!(self.interaction(), Some((_, InteractionEdge::End)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_pairs() {
        assert_eq!(
            MapEvent::ZoomStart.interaction(),
            Some((InteractionKind::Zoom, InteractionEdge::Start))
        );
        assert_eq!(
            MapEvent::TouchEnd.interaction(),
            Some((InteractionKind::Touch, InteractionEdge::End))
        );
        assert!(MapEvent::PointerDown.is_interaction_start());
        assert!(MapEvent::MoveEnd.is_interaction_end());
    }

    #[test]
    fn test_non_interaction_events() {
        let view = MapEvent::ViewChanged {
            camera: Camera::default(),
        };
        assert_eq!(view.interaction(), None);
        assert!(!view.is_interaction_start());
        assert!(!view.is_interaction_end());
    }
}
