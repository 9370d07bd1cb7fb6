//! Helpers for reading coordinate trees out of raw and typed GeoJSON.

use geo_types::Coord;
use geojson::{Geometry, Position, Value as GeoValue};
use serde_json::Value;

/// Read a position as an XY coordinate. Extra components are ignored.
pub fn position_xy(position: &Value) -> Option<Coord<f64>> {
    let items = position.as_array()?;
    if items.len() < 2 {
        return None;
    }
    let x = items[0].as_f64()?;
    let y = items[1].as_f64()?;
    (x.is_finite() && y.is_finite()).then_some(Coord { x, y })
}

/// Flatten every numeric position found anywhere in a raw coordinate tree
pub fn flatten_raw(tree: &Value) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    collect_raw(tree, &mut out);
    out
}

fn collect_raw(tree: &Value, out: &mut Vec<Coord<f64>>) {
    let Some(items) = tree.as_array() else {
        return;
    };
    if items.first().is_some_and(Value::is_number) {
        if let Some(coord) = position_xy(tree) {
            out.push(coord);
        }
        return;
    }
    for item in items {
        collect_raw(item, out);
    }
}

/// Flatten every position of a typed geometry, collections included
pub fn flatten_typed(geometry: &Geometry) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    collect_typed(&geometry.value, &mut out);
    out
}

fn collect_typed(value: &GeoValue, out: &mut Vec<Coord<f64>>) {
    let mut push = |p: &Position| {
        if p.len() >= 2 {
            out.push(Coord { x: p[0], y: p[1] });
        }
    };
    match value {
        GeoValue::Point(p) => push(p),
        GeoValue::MultiPoint(ps) | GeoValue::LineString(ps) => ps.iter().for_each(push),
        GeoValue::MultiLineString(lines) | GeoValue::Polygon(lines) => {
            lines.iter().flatten().for_each(push)
        }
        GeoValue::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(push),
        GeoValue::GeometryCollection(members) => {
            for member in members {
                collect_typed(&member.value, out);
            }
        }
    }
}

/// Diagonal of the axis-aligned bounding box, `None` when it is empty or degenerate
pub fn bbox_diagonal(coords: &[Coord<f64>]) -> Option<f64> {
    let first = coords.first()?;
    let (mut min, mut max) = (*first, *first);
    for c in coords {
        min.x = min.x.min(c.x);
        min.y = min.y.min(c.y);
        max.x = max.x.max(c.x);
        max.y = max.y.max(c.y);
    }
    let diagonal = (max.x - min.x).hypot(max.y - min.y);
    (diagonal.is_finite() && diagonal > 0.0).then_some(diagonal)
}

/// Decode a raw geometry object into a typed geometry.
///
/// Fails on nesting that does not match the type tag, on positions with
/// fewer than two components and on non-finite numbers.
pub fn decode_geometry(raw: &Value) -> Result<Geometry, String> {
    let geometry = Geometry::from_json_value(raw.clone()).map_err(|e| e.to_string())?;
    check_positions(&geometry.value)?;
    Ok(geometry)
}

fn check_positions(value: &GeoValue) -> Result<(), String> {
    let check = |p: &Position| -> Result<(), String> {
        if p.len() < 2 || p.len() > 3 {
            return Err(format!("position has {} components, expected 2 or 3", p.len()));
        }
        if p.iter().any(|c| !c.is_finite()) {
            return Err("position has a non-finite component".to_string());
        }
        Ok(())
    };
    match value {
        GeoValue::Point(p) => check(p),
        GeoValue::MultiPoint(ps) | GeoValue::LineString(ps) => ps.iter().try_for_each(check),
        GeoValue::MultiLineString(lines) | GeoValue::Polygon(lines) => {
            lines.iter().flatten().try_for_each(check)
        }
        GeoValue::MultiPolygon(polys) => polys.iter().flatten().flatten().try_for_each(check),
        GeoValue::GeometryCollection(members) => {
            members.iter().try_for_each(|m| check_positions(&m.value))
        }
    }
}

/// Apply `f` to every position of a typed geometry
pub fn map_positions<F>(value: &GeoValue, f: &F) -> GeoValue
where
    F: Fn(&Position) -> Position,
{
    match value {
        GeoValue::Point(p) => GeoValue::Point(f(p)),
        GeoValue::MultiPoint(ps) => GeoValue::MultiPoint(ps.iter().map(f).collect()),
        GeoValue::LineString(ps) => GeoValue::LineString(ps.iter().map(f).collect()),
        GeoValue::MultiLineString(lines) => GeoValue::MultiLineString(
            lines.iter().map(|l| l.iter().map(f).collect()).collect(),
        ),
        GeoValue::Polygon(rings) => {
            GeoValue::Polygon(rings.iter().map(|r| r.iter().map(f).collect()).collect())
        }
        GeoValue::MultiPolygon(polys) => GeoValue::MultiPolygon(
            polys
                .iter()
                .map(|p| p.iter().map(|r| r.iter().map(f).collect()).collect())
                .collect(),
        ),
        GeoValue::GeometryCollection(members) => GeoValue::GeometryCollection(
            members
                .iter()
                .map(|m| Geometry::new(map_positions(&m.value, f)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_raw_skips_garbage() {
        let tree = json!([[[0, 0], [1, "x"], [2, 2]], "nope", [[3, 3]]]);
        let coords = flatten_raw(&tree);
        assert_eq!(coords, vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 2.0, y: 2.0 }, Coord { x: 3.0, y: 3.0 }]);
    }

    #[test]
    fn test_bbox_diagonal() {
        let coords = [Coord { x: 0.0, y: 0.0 }, Coord { x: 3.0, y: 4.0 }];
        assert_eq!(bbox_diagonal(&coords), Some(5.0));
        assert_eq!(bbox_diagonal(&coords[..1]), None);
        assert_eq!(bbox_diagonal(&[]), None);
    }

    #[test]
    fn test_decode_rejects_short_positions() {
        let raw = json!({"type": "LineString", "coordinates": [[0, 0], [1]]});
        assert!(decode_geometry(&raw).is_err());

        let raw = json!({"type": "Polygon", "coordinates": [0, 0]});
        assert!(decode_geometry(&raw).is_err());

        let raw = json!({"type": "LineString", "coordinates": [[0, 0, 5], [1, 1, 5]]});
        assert!(decode_geometry(&raw).is_ok());
    }
}
