pub mod filters;
pub mod geojson;

pub use filters::{FilterCatalogue, FilterKind, FilterSet, FilterState, FilterValue};
pub use geojson::{ClusterFeature, Feature, FeatureCollection, PointFeature, PropertyBag, PropertyValue};
