pub mod drill_down;
pub mod events;
pub mod tracker;

// Re-export the essential types
pub use drill_down::{CameraCommand, DetailFlags, DetailRequest, DrillDownController, DrillDownState};
pub use events::{InteractionEdge, InteractionKind, MapEvent};
pub use tracker::{InteractionPhase, ViewportSnapshot, ViewportTracker};
