use serde_json::Value;
use tracing::debug;

use crate::{
    config::{Config, MIN_RING_POSITIONS},
    coords::position_xy,
    document::{self, DocumentShape},
    types::{Diagnostic, Outcome},
};

/// What happened to a single ring
#[derive(Debug, Clone, PartialEq)]
pub enum RingClosure {
    /// Endpoints already coincide, ring left untouched
    Closed,
    /// A copy of the first position was appended
    Appended(Vec<Value>),
    /// Too short or malformed to close
    NotClosable(String),
}

/// Close a ring by appending a copy of its first position.
///
/// Rings shorter than [`MIN_RING_POSITIONS`] are never closed. Endpoints are
/// equal when they differ by at most `tolerance` on both axes.
pub fn close_ring(ring: &Value, tolerance: f64) -> RingClosure {
    let Some(positions) = ring.as_array() else {
        return RingClosure::NotClosable("ring is not a list of positions".to_string());
    };
    if positions.len() < MIN_RING_POSITIONS {
        return RingClosure::NotClosable(format!(
            "ring has {} positions, minimum {} points required",
            positions.len(),
            MIN_RING_POSITIONS
        ));
    }

    let first = &positions[0];
    let last = &positions[positions.len() - 1];
    let (Some(a), Some(b)) = (position_xy(first), position_xy(last)) else {
        return RingClosure::NotClosable("ring endpoints are not numeric positions".to_string());
    };

    if (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance {
        return RingClosure::Closed;
    }

    let mut closed = positions.clone();
    closed.push(first.clone());
    RingClosure::Appended(closed)
}

/// Closes unclosed polygon rings anywhere in a document
#[derive(Debug, Clone)]
pub struct RingNormalizer {
    pub tolerance: f64,
}

impl Default for RingNormalizer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Default)]
struct Pass {
    modified: bool,
    diagnostics: Vec<Diagnostic>,
}

impl RingNormalizer {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.closure_tolerance)
    }

    /// Close every ring that needs it.
    ///
    /// When nothing was appended the returned document is the input as-is and
    /// `modified` is false. Rings that could not be closed are reported as
    /// diagnostics either way.
    pub fn normalize(&self, document: &Value) -> Outcome {
        let mut pass = Pass::default();

        let normalized = match DocumentShape::classify(document) {
            DocumentShape::Unrecognized => return Outcome::unchanged(document.clone()),
            shape if shape.is_array() => {
                let items = document.as_array().map(Vec::as_slice).unwrap_or_default();
                Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.normalize_node(item, &format!("[{i}]"), &mut pass))
                        .collect(),
                )
            }
            _ => self.normalize_node(document, "$", &mut pass),
        };

        if !pass.modified {
            return Outcome {
                document: document.clone(),
                diagnostics: pass.diagnostics,
                modified: false,
            };
        }

        match document::preserve_shape(document, normalized) {
            Some(normalized) => Outcome {
                document: normalized,
                diagnostics: pass.diagnostics,
                modified: true,
            },
            None => Outcome::unchanged(document.clone()),
        }
    }

    fn normalize_node(&self, node: &Value, location: &str, pass: &mut Pass) -> Value {
        let Some(object) = node.as_object() else {
            return node.clone();
        };
        let mut result = object.clone();

        match object.get("type").and_then(Value::as_str) {
            Some("Feature") | None => {
                if let Some(geometry) = object.get("geometry") {
                    let location = format!("{location}.geometry");
                    result.insert(
                        "geometry".to_string(),
                        self.normalize_node(geometry, &location, pass),
                    );
                }
            }
            Some("FeatureCollection") => {
                if let Some(Value::Array(features)) = object.get("features") {
                    let features = features
                        .iter()
                        .enumerate()
                        .map(|(i, f)| self.normalize_node(f, &format!("{location}.features[{i}]"), pass))
                        .collect();
                    result.insert("features".to_string(), Value::Array(features));
                }
            }
            Some("GeometryCollection") => {
                if let Some(Value::Array(members)) = object.get("geometries") {
                    let members = members
                        .iter()
                        .enumerate()
                        .map(|(i, g)| self.normalize_node(g, &format!("{location}.geometries[{i}]"), pass))
                        .collect();
                    result.insert("geometries".to_string(), Value::Array(members));
                }
            }
            Some("Polygon") => {
                if let Some(Value::Array(rings)) = object.get("coordinates") {
                    let rings = self.close_rings(rings, location, pass);
                    result.insert("coordinates".to_string(), Value::Array(rings));
                }
            }
            Some("MultiPolygon") => {
                if let Some(Value::Array(polygons)) = object.get("coordinates") {
                    let polygons = polygons
                        .iter()
                        .enumerate()
                        .map(|(i, polygon)| match polygon.as_array() {
                            Some(rings) => Value::Array(self.close_rings(
                                rings,
                                &format!("{location}.coordinates[{i}]"),
                                pass,
                            )),
                            None => polygon.clone(),
                        })
                        .collect();
                    result.insert("coordinates".to_string(), Value::Array(polygons));
                }
            }
            _ => return node.clone(),
        }

        Value::Object(result)
    }

    fn close_rings(&self, rings: &[Value], location: &str, pass: &mut Pass) -> Vec<Value> {
        rings
            .iter()
            .enumerate()
            .map(|(i, ring)| match close_ring(ring, self.tolerance) {
                RingClosure::Closed => ring.clone(),
                RingClosure::Appended(closed) => {
                    debug!(location, ring = i, "Closed ring");
                    pass.modified = true;
                    Value::Array(closed)
                }
                RingClosure::NotClosable(reason) => {
                    debug!(location, ring = i, %reason, "Ring left open");
                    pass.diagnostics.push(Diagnostic::new(format!(
                        "Ring {i} at {location} cannot be closed: {reason}"
                    )));
                    ring.clone()
                }
            })
            .collect()
    }
}

/// Close rings across a whole document using the configured tolerance
pub fn normalize_value(document: &Value, config: &Config) -> Outcome {
    RingNormalizer::from_config(config).normalize(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_close_ring_appends_first_position() {
        let ring = json!([[0, 0], [1, 0], [1, 1], [0, 1]]);
        match close_ring(&ring, 1e-10) {
            RingClosure::Appended(closed) => {
                assert_eq!(closed.len(), 5);
                assert_eq!(closed.first(), closed.last());
            }
            other => panic!("Expected appended ring, got {other:?}"),
        }
    }

    #[test]
    fn test_close_ring_within_tolerance_is_closed() {
        let ring = json!([[0, 0], [1, 0], [1, 1], [1e-12, -1e-12]]);
        assert_eq!(close_ring(&ring, 1e-10), RingClosure::Closed);
    }

    #[test]
    fn test_close_ring_keeps_z() {
        let ring = json!([[0, 0, 9], [1, 0, 9], [1, 1, 9], [0, 1, 9]]);
        let RingClosure::Appended(closed) = close_ring(&ring, 1e-10) else {
            panic!("Expected appended ring");
        };
        assert_eq!(closed[4], json!([0, 0, 9]));
    }

    #[test]
    fn test_short_ring_not_closable() {
        let ring = json!([[0, 0], [1, 0], [1, 1]]);
        assert!(matches!(close_ring(&ring, 1e-10), RingClosure::NotClosable(_)));
        assert!(matches!(close_ring(&json!("ring"), 1e-10), RingClosure::NotClosable(_)));
    }

    #[test]
    fn test_normalize_polygon() {
        let document = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]});
        let outcome = RingNormalizer::default().normalize(&document);

        assert!(outcome.modified);
        assert_eq!(
            outcome.document,
            json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]})
        );
    }

    #[test]
    fn test_normalize_nested_collections() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "x"},
                "geometry": {
                    "type": "GeometryCollection",
                    "geometries": [{
                        "type": "MultiPolygon",
                        "coordinates": [[[[0, 0], [2, 0], [2, 2], [0, 2]]]]
                    }]
                }
            }]
        });
        let outcome = RingNormalizer::default().normalize(&document);
        assert!(outcome.modified);

        let ring = &outcome.document["features"][0]["geometry"]["geometries"][0]["coordinates"][0][0];
        assert_eq!(ring.as_array().map(Vec::len), Some(5));
        assert_eq!(outcome.document["features"][0]["properties"], json!({"name": "x"}));
    }

    #[test]
    fn test_normalize_reports_short_ring_without_modifying() {
        let document = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1]]]});
        let outcome = RingNormalizer::default().normalize(&document);

        assert!(!outcome.modified);
        assert_eq!(outcome.document, document);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].message.contains("minimum 4 points required"));
    }

    #[test]
    fn test_normalize_feature_array_stays_array() {
        let document = json!([
            {"geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]}}
        ]);
        let outcome = RingNormalizer::default().normalize(&document);
        assert!(outcome.modified);
        assert!(outcome.document.is_array());
        assert_eq!(outcome.document[0]["geometry"]["coordinates"][0][4], json!([0, 0]));
    }

    #[test]
    fn test_other_geometries_untouched() {
        let document = json!({"type": "LineString", "coordinates": [[0, 0], [1, 1], [2, 0], [3, 3]]});
        let outcome = RingNormalizer::default().normalize(&document);
        assert!(!outcome.modified);
        assert_eq!(outcome.document, document);
    }
}
