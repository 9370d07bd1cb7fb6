use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::{
    config::{Config, SIMPLIFY_DECIMALS},
    coords,
    document::{self, DocumentShape},
    traits::GeometryKernel,
    types::{Diagnostic, GeometryType, Outcome},
};

/// Largest magnitude below which every integral f64 fits an i64 exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Round to [`SIMPLIFY_DECIMALS`] digits, halves away from zero.
/// Magnitudes too large to scale have no fractional digits and are returned as is.
pub fn round_component(value: f64) -> f64 {
    let factor = 10f64.powi(SIMPLIFY_DECIMALS);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// JSON number with one spelling per value: integral values become integers
fn canonical_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// Number of positions in a coordinate tree
fn position_count(tree: &Value) -> usize {
    match tree {
        Value::Array(items) if items.first().is_some_and(Value::is_number) => 1,
        Value::Array(items) => items.iter().map(position_count).sum(),
        _ => 0,
    }
}

/// Round every number in a coordinate tree, leaving anything else as is
pub fn round_coordinates(tree: &Value) -> Value {
    match tree {
        Value::Number(n) => match n.as_f64() {
            Some(v) => canonical_number(round_component(v)),
            None => tree.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(round_coordinates).collect()),
        _ => tree.clone(),
    }
}

/// Fixed-precision simplifier.
///
/// Non-point geometries go through the kernel and are rounded, repeatedly,
/// until the coordinates stop changing; so simplifying an already
/// simplified document returns it unchanged.
pub struct Simplifier<'a> {
    kernel: Option<&'a dyn GeometryKernel>,
    tolerance: f64,
}

#[derive(Default)]
struct Pass {
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Simplifier<'a> {
    pub fn new(kernel: Option<&'a dyn GeometryKernel>, tolerance: f64) -> Self {
        Self { kernel, tolerance }
    }

    pub fn from_config(kernel: Option<&'a dyn GeometryKernel>, config: &Config) -> Self {
        Self::new(kernel, config.simplify_tolerance)
    }

    /// Simplify and round a whole document.
    ///
    /// `modified` is set when the result differs from rounding alone, so a
    /// document that only needed its precision trimmed is not reported as
    /// simplified.
    pub fn simplify(&self, document: &Value) -> Outcome {
        if DocumentShape::classify(document) == DocumentShape::Unrecognized {
            return Outcome::unchanged(document.clone());
        }

        let mut pass = Pass::default();
        let simplified = self.walk(document, self.kernel, &mut pass);
        let Some(simplified) = document::preserve_shape(document, simplified) else {
            return Outcome::unchanged(document.clone());
        };

        let rounded = self.walk(document, None, &mut Pass::default());
        let modified = simplified != rounded;
        debug!(modified, "Simplified document");

        Outcome {
            document: simplified,
            diagnostics: pass.diagnostics,
            modified,
        }
    }

    /// The document with its coordinates rounded and nothing else changed
    pub fn round_only(&self, document: &Value) -> Value {
        self.walk(document, None, &mut Pass::default())
    }

    fn walk(&self, node: &Value, kernel: Option<&dyn GeometryKernel>, pass: &mut Pass) -> Value {
        if let Value::Array(items) = node {
            return Value::Array(items.iter().map(|item| self.walk(item, kernel, pass)).collect());
        }
        let Some(object) = node.as_object() else {
            return node.clone();
        };
        let mut result = object.clone();

        match object.get("type").and_then(Value::as_str) {
            Some("Feature") | None => {
                if let Some(geometry) = object.get("geometry") {
                    result.insert("geometry".to_string(), self.walk(geometry, kernel, pass));
                }
            }
            Some("FeatureCollection") => {
                if let Some(features) = object.get("features") {
                    result.insert("features".to_string(), self.walk(features, kernel, pass));
                }
            }
            Some("GeometryCollection") => {
                if let Some(geometries) = object.get("geometries") {
                    result.insert("geometries".to_string(), self.walk(geometries, kernel, pass));
                }
            }
            Some(tag) => {
                let Some(geometry_type) = GeometryType::from_tag(tag) else {
                    return node.clone();
                };
                if let Some(coordinates) = object.get("coordinates") {
                    let simplified = match (geometry_type, kernel) {
                        (GeometryType::Point, _) | (_, None) => round_coordinates(coordinates),
                        (_, Some(kernel)) => self.reduce(node, kernel, pass),
                    };
                    result.insert("coordinates".to_string(), simplified);
                }
            }
        }

        Value::Object(result)
    }

    /// Kernel simplification followed by rounding, to a fixed point.
    ///
    /// Every pass after the first must drop positions to continue. A kernel
    /// that rewrites positions without dropping any stops the loop with a
    /// warning, keeping its last output.
    fn reduce(&self, geometry: &Value, kernel: &dyn GeometryKernel, pass: &mut Pass) -> Value {
        let tag = geometry.get("type").cloned().unwrap_or(Value::Null);
        let mut current = round_coordinates(geometry.get("coordinates").unwrap_or(&Value::Null));

        loop {
            let candidate = serde_json::json!({"type": tag, "coordinates": current});
            let decoded = match coords::decode_geometry(&candidate) {
                Ok(decoded) => decoded,
                Err(reason) => {
                    debug!(%reason, "Geometry cannot be simplified, rounding only");
                    return current;
                }
            };
            let reduced = match kernel.simplify(&decoded, self.tolerance) {
                Ok(reduced) => reduced,
                Err(e) => {
                    warn!(error = %e, "Simplification kernel failed, rounding only");
                    pass.diagnostics.push(Diagnostic::new(format!(
                        "Simplification fell back to rounding: {e}"
                    )));
                    return current;
                }
            };
            let next = match serde_json::to_value(&reduced) {
                Ok(json) => round_coordinates(json.get("coordinates").unwrap_or(&Value::Null)),
                Err(e) => {
                    warn!(error = %e, "Could not encode simplified geometry, rounding only");
                    return current;
                }
            };
            if next == current {
                return current;
            }
            if position_count(&next) >= position_count(&current) {
                warn!("Simplification kernel did not settle, keeping last pass");
                return next;
            }
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::GeoKernel;
    use crate::traits::OracleError;
    use geojson::Geometry;
    use serde_json::json;

    struct BrokenKernel;

    impl GeometryKernel for BrokenKernel {
        fn simplify(&self, _: &Geometry, _: f64) -> Result<Geometry, OracleError> {
            Err(OracleError::Unavailable)
        }
    }

    fn simplifier() -> Simplifier<'static> {
        Simplifier::new(Some(&GeoKernel), 0.001)
    }

    #[test]
    fn test_round_component() {
        assert_eq!(round_component(1.23456), 1.235);
        assert_eq!(round_component(-1.2345), -1.235);
        assert_eq!(round_component(0.0005), 0.001);
        assert_eq!(round_component(2.0), 2.0);
    }

    #[test]
    fn test_huge_components_are_kept() {
        assert_eq!(round_component(1e306), 1e306);
        assert_eq!(round_component(-f64::MAX), -f64::MAX);
        assert_eq!(round_coordinates(&json!([1e306, 2.00049])), json!([1e306, 2]));

        let document = json!({"type": "Point", "coordinates": [1e306, 2]});
        let outcome = simplifier().simplify(&document);
        assert_eq!(outcome.document["coordinates"], json!([1e306, 2]));
        assert!(!outcome.modified);
    }

    #[test]
    fn test_position_count() {
        assert_eq!(position_count(&json!([1, 2])), 1);
        assert_eq!(position_count(&json!([[[0, 0], [1, 0]], [[2, 2]]])), 3);
        assert_eq!(position_count(&json!([])), 0);
    }

    #[test]
    fn test_integral_values_are_integers() {
        assert_eq!(round_coordinates(&json!([1.0001, 2.5])), json!([1, 2.5]));
        assert_eq!(round_coordinates(&json!([-0.0001, 0])), json!([0, 0]));
    }

    #[test]
    fn test_duplicate_vertex_collapses() {
        let document = json!({"type": "LineString", "coordinates": [[0, 0], [0, 0], [1, 1]]});
        let outcome = simplifier().simplify(&document);

        assert!(outcome.modified);
        assert_eq!(outcome.document["coordinates"], json!([[0, 0], [1, 1]]));

        let again = simplifier().simplify(&outcome.document);
        assert!(!again.modified);
        assert_eq!(again.document, outcome.document);
    }

    #[test]
    fn test_points_are_only_rounded() {
        let document = json!({"type": "Point", "coordinates": [1.23456, 2.00049, 7.1239]});
        let outcome = simplifier().simplify(&document);
        assert_eq!(outcome.document["coordinates"], json!([1.235, 2, 7.124]));
        assert!(!outcome.modified);
    }

    #[test]
    fn test_feature_members_survive() {
        let document = json!({
            "type": "Feature",
            "id": 7,
            "properties": {"height": 12.34567},
            "geometry": {"type": "LineString", "coordinates": [[0, 0], [0.5, 0.0000001], [1, 0]]}
        });
        let outcome = simplifier().simplify(&document);

        assert!(outcome.modified);
        assert_eq!(outcome.document["geometry"]["coordinates"], json!([[0, 0], [1, 0]]));
        assert_eq!(outcome.document["properties"]["height"], json!(12.34567));
        assert_eq!(outcome.document["id"], json!(7));
    }

    /// Shifts every position without dropping any
    struct DriftingKernel;

    impl GeometryKernel for DriftingKernel {
        fn simplify(&self, geometry: &Geometry, _: f64) -> Result<Geometry, OracleError> {
            let shift = |p: &Vec<f64>| vec![p[0] + 1.0, p[1]];
            let value = match &geometry.value {
                geojson::Value::LineString(line) => geojson::Value::LineString(line.iter().map(shift).collect()),
                other => other.clone(),
            };
            Ok(Geometry::new(value))
        }
    }

    #[test]
    fn test_multi_pass_reduction_settles() {
        let document = json!({"type": "LineString", "coordinates": [
            [0, 0], [1, 0.0004], [2, 0], [3, 0.0004], [4, 0], [4, 0], [5, 1]
        ]});
        let once = simplifier().simplify(&document);
        let twice = simplifier().simplify(&once.document);
        assert_eq!(once.document, twice.document);
        assert!(!twice.modified);
    }

    #[test]
    fn test_kernel_that_never_settles_stops() {
        let document = json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]});
        let outcome = Simplifier::new(Some(&DriftingKernel), 0.001).simplify(&document);
        assert_eq!(outcome.document["coordinates"], json!([[1, 0], [2, 1]]));
        assert!(outcome.modified);
    }

    #[test]
    fn test_broken_kernel_falls_back_to_rounding() {
        let document = json!({"type": "LineString", "coordinates": [[0.00011, 0], [0, 0], [1, 1]]});
        let outcome = Simplifier::new(Some(&BrokenKernel), 0.001).simplify(&document);

        assert_eq!(outcome.document["coordinates"], json!([[0, 0], [0, 0], [1, 1]]));
        assert!(!outcome.modified);
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn test_geometry_array_stays_array() {
        let document = json!([
            {"type": "Point", "coordinates": [0.12345, 0]},
            {"type": "MultiPoint", "coordinates": [[1, 1], [1, 1]]}
        ]);
        let outcome = simplifier().simplify(&document);
        assert!(outcome.document.is_array());
        assert_eq!(outcome.document[0]["coordinates"], json!([0.123, 0]));
    }

    #[test]
    fn test_unrecognized_document_untouched() {
        let document = json!({"type": "Topology", "objects": {}});
        let outcome = simplifier().simplify(&document);
        assert_eq!(outcome, Outcome::unchanged(document));
    }
}
