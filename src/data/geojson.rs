//! Cluster/point features as returned by the clustering service.
//!
//! The service speaks GeoJSON: every feature is a `Point`, clusters carry
//! `point_count` in their properties and plain points carry arbitrary scalar
//! properties. Decoding is all-or-nothing; one bad feature rejects the payload.

use crate::core::geo::LatLng;
use crate::prelude::HashMap;
use crate::FetchError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Scalar property value of a point feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl PropertyValue {
    /// Interprets the loose truthiness the service uses for flags (`true`, `1`, `"1"`, `"true"`)
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Null => false,
            PropertyValue::Bool(flag) => *flag,
            PropertyValue::Number(n) => *n != 0.0,
            PropertyValue::String(s) => {
                let s = s.trim();
                s == "1" || s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes")
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(PropertyValue::Null),
            Value::Bool(b) => Some(PropertyValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(PropertyValue::Number),
            Value::String(s) => Some(PropertyValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Number(n) => json!(n),
            PropertyValue::String(s) => Value::String(s.clone()),
        }
    }
}

pub type PropertyBag = HashMap<String, PropertyValue>;

/// An aggregated group of points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterFeature {
    pub cluster_id: Option<String>,
    pub coordinates: LatLng,
    pub point_count: u64,
    pub point_count_abbreviated: String,
    /// Zoom at which the service expects this cluster to split
    pub expansion_zoom: Option<u8>,
}

/// An individual data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub id: Option<String>,
    pub coordinates: LatLng,
    pub properties: PropertyBag,
}

impl PointFeature {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// `true` when the property exists and is truthy
    pub fn flag(&self, key: &str) -> bool {
        self.property(key).map(PropertyValue::is_truthy).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Feature {
    Cluster(ClusterFeature),
    Point(PointFeature),
}

impl Feature {
    pub fn coordinates(&self) -> LatLng {
        match self {
            Feature::Cluster(cluster) => cluster.coordinates,
            Feature::Point(point) => point.coordinates,
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Feature::Cluster(_))
    }

    pub fn as_cluster(&self) -> Option<&ClusterFeature> {
        match self {
            Feature::Cluster(cluster) => Some(cluster),
            Feature::Point(_) => None,
        }
    }

    pub fn as_point(&self) -> Option<&PointFeature> {
        match self {
            Feature::Point(point) => Some(point),
            Feature::Cluster(_) => None,
        }
    }

    /// Decodes a single GeoJSON feature object
    pub fn from_geojson(value: &Value) -> Result<Self, FetchError> {
        let raw: RawFeature = serde_json::from_value(value.clone())
            .map_err(|e| FetchError::Malformed(format!("invalid feature: {e}")))?;

        let coordinates = match raw.geometry {
            Some(RawGeometry::Point { coordinates }) => {
                if coordinates.len() < 2 || !coordinates[0].is_finite() || !coordinates[1].is_finite() {
                    return Err(FetchError::Malformed(format!(
                        "point geometry needs two finite coordinates, got {coordinates:?}"
                    )));
                }
                let position = LatLng::from_lng_lat([coordinates[0], coordinates[1]]);
                if !position.is_valid() {
                    return Err(FetchError::Malformed(format!(
                        "coordinates out of range: {coordinates:?}"
                    )));
                }
                position
            }
            Some(RawGeometry::Other) => {
                return Err(FetchError::Malformed(
                    "only Point geometries are supported".to_string(),
                ))
            }
            None => return Err(FetchError::Malformed("feature without geometry".to_string())),
        };

        let properties = raw.properties.unwrap_or_default();
        if properties.contains_key("point_count") {
            decode_cluster(coordinates, &properties).map(Feature::Cluster)
        } else {
            Ok(Feature::Point(decode_point(coordinates, raw.id, &properties)))
        }
    }

    /// Encodes back to a GeoJSON feature object for a rendering surface
    pub fn to_geojson(&self) -> Value {
        match self {
            Feature::Cluster(cluster) => json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": cluster.coordinates.to_lng_lat() },
                "properties": {
                    "cluster": true,
                    "cluster_id": cluster.cluster_id,
                    "point_count": cluster.point_count,
                    "point_count_abbreviated": cluster.point_count_abbreviated,
                    "expansion_zoom": cluster.expansion_zoom,
                }
            }),
            Feature::Point(point) => {
                let properties: Map<String, Value> = point
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                json!({
                    "type": "Feature",
                    "id": point.id,
                    "geometry": { "type": "Point", "coordinates": point.coordinates.to_lng_lat() },
                    "properties": properties,
                })
            }
        }
    }
}

/// The whole set of features rendered for one viewport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Decodes a service response body (`{"features": [...]}`)
    pub fn from_response(body: &Value) -> Result<Self, FetchError> {
        let features = body
            .get("features")
            .ok_or_else(|| FetchError::Malformed("response has no `features`".to_string()))?
            .as_array()
            .ok_or_else(|| FetchError::Malformed("`features` is not an array".to_string()))?;

        features
            .iter()
            .map(Feature::from_geojson)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterFeature> {
        self.features.iter().filter_map(Feature::as_cluster)
    }

    pub fn points(&self) -> impl Iterator<Item = &PointFeature> {
        self.features.iter().filter_map(Feature::as_point)
    }

    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.features.iter().map(Feature::to_geojson).collect::<Vec<_>>(),
        })
    }
}

impl From<Vec<Feature>> for FeatureCollection {
    fn from(features: Vec<Feature>) -> Self {
        Self::new(features)
    }
}

/// Short label for a cluster count: `950`, `1.2k`, `15k`
pub fn abbreviate_count(count: u64) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round() as u64)
    } else if count >= 1_000 {
        let tenths = (count as f64 / 100.0).round() / 10.0;
        if tenths.fract() == 0.0 {
            format!("{}k", tenths as u64)
        } else {
            format!("{tenths:.1}k")
        }
    } else {
        count.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Point {
        coordinates: Vec<f64>,
    },
    #[serde(other)]
    Other,
}

fn decode_cluster(coordinates: LatLng, properties: &Map<String, Value>) -> Result<ClusterFeature, FetchError> {
    let point_count = properties
        .get("point_count")
        .and_then(|v| v.as_f64())
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
        .ok_or_else(|| FetchError::Malformed("cluster `point_count` is not a count".to_string()))?;

    let point_count_abbreviated = match properties.get("point_count_abbreviated") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => abbreviate_count(point_count),
    };

    let expansion_zoom = properties
        .get("expansion_zoom")
        .and_then(|v| v.as_f64())
        .filter(|z| z.is_finite())
        .map(|z| z.round().clamp(0.0, u8::MAX as f64) as u8);

    Ok(ClusterFeature {
        cluster_id: properties.get("cluster_id").and_then(id_string),
        coordinates,
        point_count,
        point_count_abbreviated,
        expansion_zoom,
    })
}

fn decode_point(coordinates: LatLng, id: Option<Value>, properties: &Map<String, Value>) -> PointFeature {
    let mut bag = PropertyBag::default();
    for (key, value) in properties {
        match PropertyValue::from_json(value) {
            Some(scalar) => {
                bag.insert(key.clone(), scalar);
            }
            None => log::debug!("dropping non-scalar property `{}` from point feature", key),
        }
    }

    let id = id
        .as_ref()
        .and_then(id_string)
        .or_else(|| properties.get("id").and_then(id_string));

    PointFeature {
        id,
        coordinates,
        properties: bag,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_json(count: u64, expansion_zoom: Value) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [12.0, 41.0] },
            "properties": {
                "cluster": true,
                "cluster_id": "77",
                "point_count": count,
                "point_count_abbreviated": count,
                "expansion_zoom": expansion_zoom
            }
        })
    }

    #[test]
    fn test_decode_cluster() {
        let feature = Feature::from_geojson(&cluster_json(42, json!(9))).unwrap();
        let cluster = feature.as_cluster().unwrap();

        assert_eq!(cluster.point_count, 42);
        assert_eq!(cluster.point_count_abbreviated, "42");
        assert_eq!(cluster.expansion_zoom, Some(9));
        assert_eq!(cluster.cluster_id.as_deref(), Some("77"));
        assert_eq!(cluster.coordinates, LatLng::new(41.0, 12.0));
    }

    #[test]
    fn test_decode_cluster_with_null_expansion_zoom() {
        let feature = Feature::from_geojson(&cluster_json(3, Value::Null)).unwrap();
        assert_eq!(feature.as_cluster().unwrap().expansion_zoom, None);
    }

    #[test]
    fn test_decode_point_keeps_scalars() {
        let raw = json!({
            "type": "Feature",
            "id": 1234,
            "geometry": { "type": "Point", "coordinates": [-0.12, 51.5] },
            "properties": {
                "full_name": "Ada",
                "is_featured": true,
                "story": 1,
                "tags": ["a", "b"]
            }
        });

        let feature = Feature::from_geojson(&raw).unwrap();
        let point = feature.as_point().unwrap();

        assert_eq!(point.id.as_deref(), Some("1234"));
        assert!(point.flag("is_featured"));
        assert!(point.flag("story"));
        assert!(!point.flag("data"));
        assert_eq!(point.property("full_name").and_then(PropertyValue::as_str), Some("Ada"));
        assert!(point.property("tags").is_none());
    }

    #[test]
    fn test_missing_features_is_malformed() {
        let err = FeatureCollection::from_response(&json!({ "clusters": [] })).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_one_bad_feature_rejects_payload() {
        let body = json!({
            "features": [
                cluster_json(5, json!(4)),
                { "type": "Feature", "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] }, "properties": {} }
            ]
        });
        assert!(FeatureCollection::from_response(&body).is_err());
    }

    #[test]
    fn test_out_of_range_coordinates_are_malformed() {
        let feature = json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [12.0, 95.0] },
            "properties": { "id": "p1" }
        });
        assert!(matches!(
            Feature::from_geojson(&feature),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_collection_split() {
        let body = json!({
            "features": [
                cluster_json(5, json!(4)),
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }, "properties": { "id": "p1" } }
            ]
        });
        let collection = FeatureCollection::from_response(&body).unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.clusters().count(), 1);
        assert_eq!(collection.points().count(), 1);
        assert_eq!(collection.to_geojson()["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_abbreviate_count() {
        assert_eq!(abbreviate_count(950), "950");
        assert_eq!(abbreviate_count(1_000), "1k");
        assert_eq!(abbreviate_count(1_240), "1.2k");
        assert_eq!(abbreviate_count(15_400), "15k");
    }
}
