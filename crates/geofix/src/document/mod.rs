//! Top-level document shapes: the GeoJSON object kinds plus the bare arrays
//! that hand-edited files often use instead of a FeatureCollection.

use serde_json::{Map, Value, json};
use strum::{Display, IntoStaticStr};
use tracing::warn;

use crate::types::GeometryType;

/// Members of a feature-like object that are not folded into its properties
const FEATURE_MEMBERS: [&str; 5] = ["type", "geometry", "properties", "id", "bbox"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum DocumentShape {
    Geometry,
    /// A `Feature`, or an untyped object carrying a `geometry` member
    Feature,
    FeatureCollection,
    /// Bare array whose elements carry a `geometry` member
    FeatureArray,
    /// Bare array whose elements carry a `type` tag
    GeometryArray,
    Unrecognized,
}

impl DocumentShape {
    pub fn classify(document: &Value) -> Self {
        match document {
            Value::Array(items) => {
                let Some(Value::Object(first)) = items.first() else {
                    return DocumentShape::Unrecognized;
                };
                if first.contains_key("geometry") {
                    DocumentShape::FeatureArray
                } else if first.get("type").is_some_and(Value::is_string) {
                    DocumentShape::GeometryArray
                } else {
                    DocumentShape::Unrecognized
                }
            }
            Value::Object(object) => match object.get("type").and_then(Value::as_str) {
                Some("Feature") => DocumentShape::Feature,
                Some("FeatureCollection") => DocumentShape::FeatureCollection,
                Some(tag) if GeometryType::from_tag(tag).is_some() => DocumentShape::Geometry,
                None if object.contains_key("geometry") => DocumentShape::Feature,
                _ => DocumentShape::Unrecognized,
            },
            _ => DocumentShape::Unrecognized,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, DocumentShape::FeatureArray | DocumentShape::GeometryArray)
    }
}

/// Whether a top-level document is encoded as an array or a single object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShapeClass {
    Array,
    Object,
    Scalar,
}

impl ShapeClass {
    pub fn of(document: &Value) -> Self {
        match document {
            Value::Array(_) => ShapeClass::Array,
            Value::Object(_) => ShapeClass::Object,
            _ => ShapeClass::Scalar,
        }
    }
}

/// Accept `output` only if it kept the shape class of `input`
pub fn preserve_shape(input: &Value, output: Value) -> Option<Value> {
    let (before, after) = (ShapeClass::of(input), ShapeClass::of(&output));
    if before == after {
        Some(output)
    } else {
        warn!(%before, %after, "Transform changed the document shape class, discarding result");
        None
    }
}

/// Promote a bare array of feature-like objects into a FeatureCollection.
///
/// Items already tagged `Feature` are kept as they are. Other items become
/// Features whose properties are the item's `properties` object, or failing
/// that every member other than the reserved GeoJSON ones.
pub fn promote_features(document: &Value) -> Option<Value> {
    if DocumentShape::classify(document) != DocumentShape::FeatureArray {
        return None;
    }
    let items = document.as_array()?;
    let features: Vec<Value> = items.iter().map(promote_item).collect();
    Some(json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

fn promote_item(item: &Value) -> Value {
    let Some(object) = item.as_object() else {
        return json!({"type": "Feature", "geometry": null, "properties": {}});
    };
    if object.get("type").and_then(Value::as_str) == Some("Feature") {
        return item.clone();
    }

    let properties = match object.get("properties") {
        Some(Value::Object(props)) => props.clone(),
        _ => object
            .iter()
            .filter(|(key, _)| !FEATURE_MEMBERS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Map<String, Value>>(),
    };

    let mut feature = Map::new();
    feature.insert("type".to_string(), json!("Feature"));
    if let Some(id) = object.get("id") {
        feature.insert("id".to_string(), id.clone());
    }
    feature.insert(
        "geometry".to_string(),
        object.get("geometry").cloned().unwrap_or(Value::Null),
    );
    feature.insert("properties".to_string(), Value::Object(properties));
    Value::Object(feature)
}

/// The geometries of a document, each paired with its top-level index.
///
/// Features without a geometry are skipped but keep their index, so the
/// index always matches the feature's position in the document.
pub fn top_level_geometries(document: &Value) -> Vec<(usize, Value)> {
    match DocumentShape::classify(document) {
        DocumentShape::Geometry => vec![(0, document.clone())],
        DocumentShape::Feature => feature_geometry(document)
            .map(|geometry| vec![(0, geometry)])
            .unwrap_or_default(),
        DocumentShape::FeatureCollection => collection_geometries(document),
        DocumentShape::FeatureArray => promote_features(document)
            .map(|collection| collection_geometries(&collection))
            .unwrap_or_default(),
        DocumentShape::GeometryArray => document
            .as_array()
            .map(|items| items.iter().cloned().enumerate().collect())
            .unwrap_or_default(),
        // An object with an unknown tag is still reported, so the user sees why
        DocumentShape::Unrecognized if document.get("type").is_some() => {
            vec![(0, document.clone())]
        }
        DocumentShape::Unrecognized => Vec::new(),
    }
}

fn feature_geometry(feature: &Value) -> Option<Value> {
    feature.get("geometry").filter(|g| !g.is_null()).cloned()
}

fn collection_geometries(collection: &Value) -> Vec<(usize, Value)> {
    collection
        .get("features")
        .and_then(Value::as_array)
        .map(|features| {
            features
                .iter()
                .enumerate()
                .filter_map(|(i, feature)| feature_geometry(feature).map(|g| (i, g)))
                .collect()
        })
        .unwrap_or_default()
}
