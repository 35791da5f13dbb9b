pub mod definitions;
pub mod render_sync;

pub use definitions::{standard_layers, LayerDefinition, LayerKind, LayerSelection};
pub use render_sync::RenderSync;
