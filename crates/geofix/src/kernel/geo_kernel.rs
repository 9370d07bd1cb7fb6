use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Area, SimplifyIdx};
use geo_types::{Coord, Line, LineString, Polygon};
use geojson::{Geometry, Position, Value as GeoValue};

use crate::{
    config::MIN_RING_POSITIONS,
    traits::{GeometryKernel, OracleError, ValidationError, ValidityOracle},
};

/// Validity oracle and simplification kernel built on the `geo` crate.
///
/// Validity follows the simple-features rules the diagnostics care about:
/// closed rings of at least four positions, no self-intersections, no
/// zero-area rings, interior rings not crossing the exterior, lines with two
/// distinct points. Segment tests are pairwise, which is plenty for
/// hand-edited documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoKernel;

impl ValidityOracle for GeoKernel {
    fn is_valid(&self, geometry: &Geometry) -> Result<bool, OracleError> {
        Ok(self.validation_error(geometry)?.is_none())
    }

    fn is_simple(&self, geometry: &Geometry) -> Result<bool, OracleError> {
        simple(&geometry.value)
    }

    fn validation_error(&self, geometry: &Geometry) -> Result<Option<ValidationError>, OracleError> {
        first_violation(&geometry.value)
    }

    fn find_self_intersections(&self, geometry: &Geometry) -> Result<Vec<Coord<f64>>, OracleError> {
        let mut found = Vec::new();
        collect_intersections(&geometry.value, &mut found)?;
        dedup_in_order(&mut found);
        Ok(found)
    }
}

impl GeometryKernel for GeoKernel {
    fn simplify(&self, geometry: &Geometry, tolerance: f64) -> Result<Geometry, OracleError> {
        let value = match &geometry.value {
            GeoValue::Point(_) | GeoValue::MultiPoint(_) => geometry.value.clone(),
            GeoValue::LineString(line) => GeoValue::LineString(simplify_line(line, tolerance, false)?),
            GeoValue::MultiLineString(lines) => GeoValue::MultiLineString(
                lines
                    .iter()
                    .map(|l| simplify_line(l, tolerance, false))
                    .collect::<Result<_, _>>()?,
            ),
            GeoValue::Polygon(rings) => GeoValue::Polygon(simplify_rings(rings, tolerance)?),
            GeoValue::MultiPolygon(polygons) => GeoValue::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| simplify_rings(rings, tolerance))
                    .collect::<Result<_, _>>()?,
            ),
            GeoValue::GeometryCollection(members) => GeoValue::GeometryCollection(
                members
                    .iter()
                    .map(|m| self.simplify(m, tolerance))
                    .collect::<Result<_, _>>()?,
            ),
        };
        Ok(Geometry {
            bbox: geometry.bbox.clone(),
            value,
            foreign_members: geometry.foreign_members.clone(),
        })
    }
}

fn to_coords(positions: &[Position]) -> Result<Vec<Coord<f64>>, OracleError> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(OracleError::Malformed(format!("unusable position {p:?}"))),
        })
        .collect()
}

fn dedup_in_order(coords: &mut Vec<Coord<f64>>) {
    let mut seen: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    coords.retain(|c| {
        if seen.contains(c) {
            false
        } else {
            seen.push(*c);
            true
        }
    });
}

/// Segments of a path, with zero-length segments from repeated positions removed
fn segments(coords: &[Coord<f64>]) -> Vec<Line<f64>> {
    let mut path = coords.to_vec();
    path.dedup();
    path.windows(2).map(|w| Line::new(w[0], w[1])).collect()
}

fn is_closed(coords: &[Coord<f64>]) -> bool {
    coords.len() > 1 && coords.first() == coords.last()
}

/// Points where a path crosses or touches itself away from shared vertices
fn path_intersections(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let segments = segments(coords);
    let closed = is_closed(coords) && segments.len() > 2;
    let n = segments.len();
    let mut found = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (closed && i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                Some(LineIntersection::Collinear { intersection }) => {
                    // adjacent segments always share a vertex; only a fold back counts
                    if !adjacent || intersection.start != intersection.end {
                        found.push(intersection.start);
                    }
                }
                Some(LineIntersection::SinglePoint { intersection, .. }) if !adjacent => {
                    found.push(intersection);
                }
                _ => {}
            }
        }
    }

    dedup_in_order(&mut found);
    found
}

/// Proper crossings between two different rings
fn ring_crossings(a: &[Coord<f64>], b: &[Coord<f64>]) -> Option<Coord<f64>> {
    let (a, b) = (segments(a), segments(b));
    a.iter().find_map(|sa| {
        b.iter().find_map(|sb| match line_intersection(*sa, *sb) {
            Some(LineIntersection::SinglePoint { intersection, is_proper: true }) => Some(intersection),
            Some(LineIntersection::Collinear { intersection }) if intersection.start != intersection.end => {
                Some(intersection.start)
            }
            _ => None,
        })
    })
}

fn violation(message: &str, coordinate: Option<Coord<f64>>) -> Option<ValidationError> {
    Some(ValidationError {
        message: message.to_string(),
        coordinate,
    })
}

fn ring_violation(ring: &[Position]) -> Result<Option<ValidationError>, OracleError> {
    let coords = to_coords(ring)?;
    let first = coords.first().copied();
    if coords.len() < MIN_RING_POSITIONS {
        return Ok(violation("Too few points in ring", first));
    }
    if !is_closed(&coords) {
        return Ok(violation("Ring is not closed", first));
    }
    if let Some(point) = path_intersections(&coords).first() {
        return Ok(violation("Ring self-intersection", Some(*point)));
    }
    let area = Polygon::new(LineString::new(coords), vec![]).unsigned_area();
    if area == 0.0 {
        return Ok(violation("Ring has zero area", first));
    }
    Ok(None)
}

fn polygon_violation(rings: &[Vec<Position>]) -> Result<Option<ValidationError>, OracleError> {
    for ring in rings {
        if let Some(found) = ring_violation(ring)? {
            return Ok(Some(found));
        }
    }
    let Some((exterior, interiors)) = rings.split_first() else {
        return Ok(violation("Polygon has no rings", None));
    };
    let exterior = to_coords(exterior)?;
    for interior in interiors {
        if let Some(point) = ring_crossings(&exterior, &to_coords(interior)?) {
            return Ok(violation("Interior ring crosses exterior ring", Some(point)));
        }
    }
    Ok(None)
}

fn line_violation(line: &[Position]) -> Result<Option<ValidationError>, OracleError> {
    let mut coords = to_coords(line)?;
    let first = coords.first().copied();
    coords.dedup();
    if coords.len() < 2 {
        return Ok(violation("LineString needs at least 2 distinct points", first));
    }
    Ok(None)
}

fn first_violation(value: &GeoValue) -> Result<Option<ValidationError>, OracleError> {
    match value {
        GeoValue::Point(p) => to_coords(std::slice::from_ref(p)).map(|_| None),
        GeoValue::MultiPoint(points) => to_coords(points).map(|_| None),
        GeoValue::LineString(line) => line_violation(line),
        GeoValue::MultiLineString(lines) => {
            for line in lines {
                if let Some(found) = line_violation(line)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        }
        GeoValue::Polygon(rings) => polygon_violation(rings),
        GeoValue::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(found) = polygon_violation(rings)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        }
        GeoValue::GeometryCollection(members) => {
            for member in members {
                if let Some(found) = first_violation(&member.value)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        }
    }
}

fn simple(value: &GeoValue) -> Result<bool, OracleError> {
    let mut found = Vec::new();
    collect_intersections(value, &mut found)?;
    if !found.is_empty() {
        return Ok(false);
    }
    if let GeoValue::MultiPoint(points) = value {
        let mut coords = to_coords(points)?;
        let before = coords.len();
        dedup_in_order(&mut coords);
        return Ok(coords.len() == before);
    }
    Ok(true)
}

fn collect_intersections(value: &GeoValue, found: &mut Vec<Coord<f64>>) -> Result<(), OracleError> {
    match value {
        GeoValue::Point(_) | GeoValue::MultiPoint(_) => {}
        GeoValue::LineString(line) => found.extend(path_intersections(&to_coords(line)?)),
        GeoValue::MultiLineString(paths) | GeoValue::Polygon(paths) => {
            for path in paths {
                found.extend(path_intersections(&to_coords(path)?));
            }
        }
        GeoValue::MultiPolygon(polygons) => {
            for path in polygons.iter().flatten() {
                found.extend(path_intersections(&to_coords(path)?));
            }
        }
        GeoValue::GeometryCollection(members) => {
            for member in members {
                collect_intersections(&member.value, found)?;
            }
        }
    }
    Ok(())
}

/// Simplify each ring on its own, then refuse any reduction that makes a hole
/// cross the exterior where it did not before.
fn simplify_rings(rings: &[Vec<Position>], tolerance: f64) -> Result<Vec<Vec<Position>>, OracleError> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Ok(Vec::new());
    };
    let holes = interiors
        .iter()
        .map(|r| to_coords(r))
        .collect::<Result<Vec<_>, _>>()?;

    let mut outer = simplify_line(exterior, tolerance, true)?;
    if crossed_holes(&to_coords(&outer)?, &holes) > crossed_holes(&to_coords(exterior)?, &holes) {
        outer = exterior.clone();
    }
    let outer_coords = to_coords(&outer)?;

    let mut simplified = vec![outer];
    for (interior, hole) in interiors.iter().zip(&holes) {
        let reduced = simplify_line(interior, tolerance, true)?;
        let crosses_now = ring_crossings(&outer_coords, &to_coords(&reduced)?).is_some();
        if crosses_now && ring_crossings(&outer_coords, hole).is_none() {
            simplified.push(interior.clone());
        } else {
            simplified.push(reduced);
        }
    }
    Ok(simplified)
}

fn crossed_holes(exterior: &[Coord<f64>], holes: &[Vec<Coord<f64>>]) -> usize {
    holes
        .iter()
        .filter(|hole| ring_crossings(exterior, hole).is_some())
        .count()
}

/// Douglas-Peucker by index, so dropped vertices never disturb the kept
/// positions (Z included). Reductions that would break a ring or introduce a
/// self-intersection are refused and the path is returned unchanged.
fn simplify_line(path: &[Position], tolerance: f64, ring: bool) -> Result<Vec<Position>, OracleError> {
    if path.len() < 3 {
        return Ok(path.to_vec());
    }
    let coords = to_coords(path)?;
    let keep = LineString::new(coords.clone()).simplify_idx(&tolerance);

    if keep.len() == path.len() || (ring && keep.len() < MIN_RING_POSITIONS) {
        return Ok(path.to_vec());
    }

    let reduced: Vec<Coord<f64>> = keep.iter().map(|&i| coords[i]).collect();
    if path_intersections(&reduced).len() > path_intersections(&coords).len() {
        return Ok(path.to_vec());
    }

    Ok(keep.iter().map(|&i| path[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn geometry(raw: serde_json::Value) -> Geometry {
        Geometry::from_json_value(raw).expect("Should decode test geometry")
    }

    fn close_to(c: Coord<f64>, x: f64, y: f64) -> bool {
        (c.x - x).abs() < 1e-9 && (c.y - y).abs() < 1e-9
    }

    #[test]
    fn test_square_is_valid_and_simple() {
        let square = geometry(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]}));
        assert_eq!(GeoKernel.is_valid(&square), Ok(true));
        assert_eq!(GeoKernel.is_simple(&square), Ok(true));
        assert_eq!(GeoKernel.find_self_intersections(&square), Ok(vec![]));
    }

    #[test]
    fn test_bowtie() {
        let bowtie = geometry(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [1, 0], [0, 1], [0, 0]]]}));
        assert_eq!(GeoKernel.is_valid(&bowtie), Ok(false));
        assert_eq!(GeoKernel.is_simple(&bowtie), Ok(false));

        let error = GeoKernel.validation_error(&bowtie).unwrap().expect("Should report an error");
        assert_eq!(error.message, "Ring self-intersection");
        assert!(close_to(error.coordinate.unwrap(), 0.5, 0.5));

        let points = GeoKernel.find_self_intersections(&bowtie).unwrap();
        assert_eq!(points.len(), 1);
        assert!(close_to(points[0], 0.5, 0.5));
    }

    #[test]
    fn test_unclosed_and_short_rings() {
        let open = geometry(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]}));
        let error = GeoKernel.validation_error(&open).unwrap().unwrap();
        assert_eq!(error.message, "Ring is not closed");

        let short = geometry(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [0, 0]]]}));
        let error = GeoKernel.validation_error(&short).unwrap().unwrap();
        assert_eq!(error.message, "Too few points in ring");
    }

    #[test]
    fn test_hole_crossing_exterior() {
        let polygon = geometry(json!({"type": "Polygon", "coordinates": [
            [[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]],
            [[1, 1], [6, 1], [6, 2], [1, 2], [1, 1]]
        ]}));
        let error = GeoKernel.validation_error(&polygon).unwrap().unwrap();
        assert_eq!(error.message, "Interior ring crosses exterior ring");
        assert!(close_to(error.coordinate.unwrap(), 4.0, 1.0));
    }

    #[test]
    fn test_line_validity() {
        let degenerate = geometry(json!({"type": "LineString", "coordinates": [[1, 1], [1, 1]]}));
        assert_eq!(GeoKernel.is_valid(&degenerate), Ok(false));

        let crossing = geometry(json!({"type": "LineString", "coordinates": [[0, 0], [2, 2], [2, 0], [0, 2]]}));
        assert_eq!(GeoKernel.is_valid(&crossing), Ok(true));
        assert_eq!(GeoKernel.is_simple(&crossing), Ok(false));
    }

    #[test]
    fn test_multipoint_duplicates_not_simple() {
        let points = geometry(json!({"type": "MultiPoint", "coordinates": [[0, 0], [1, 1], [0, 0]]}));
        assert_eq!(GeoKernel.is_simple(&points), Ok(false));
    }

    #[test]
    fn test_simplify_drops_collinear_and_duplicate_vertices() {
        let line = geometry(json!({"type": "LineString", "coordinates": [[0, 0], [0, 0], [1, 1]]}));
        let simplified = GeoKernel.simplify(&line, 0.001).unwrap();
        assert_eq!(simplified.value, GeoValue::LineString(vec![vec![0.0, 0.0], vec![1.0, 1.0]]));

        let ring = geometry(json!({"type": "Polygon", "coordinates": [[[0, 0, 5], [1, 0, 5], [2, 0, 5], [2, 2, 5], [0, 2, 5], [0, 0, 5]]]}));
        let simplified = GeoKernel.simplify(&ring, 0.001).unwrap();
        let GeoValue::Polygon(rings) = simplified.value else {
            panic!("Expected polygon");
        };
        assert_eq!(rings[0].len(), 5);
        assert!(rings[0].iter().all(|p| p.len() == 3));
    }

    #[test]
    fn test_simplify_keeps_minimal_ring() {
        let sliver = geometry(json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [2, 0.0001], [0, 0]]]}));
        let simplified = GeoKernel.simplify(&sliver, 0.001).unwrap();
        assert_eq!(simplified.value, sliver.value);
    }

    #[test]
    fn test_simplify_keeps_hole_off_the_exterior() {
        let exterior = json!([[0, 0], [10, 0], [10, 10], [5.0001, 10], [5, 5.0002], [4.9999, 10], [0, 10], [0, 0]]);
        let hole = json!([[4, 5.0004], [5, 5], [6, 5.0004], [6, 1], [4, 1], [4, 5.0004]]);

        let GeoValue::LineString(hole_path) = geometry(json!({"type": "LineString", "coordinates": hole.clone()})).value else {
            panic!("Expected line");
        };
        let reduced = simplify_line(&hole_path, 0.001, true).unwrap();
        assert_eq!(reduced.len(), 5);

        let polygon = geometry(json!({"type": "Polygon", "coordinates": [exterior, hole]}));
        let simplified = GeoKernel.simplify(&polygon, 0.001).unwrap();
        let GeoValue::Polygon(rings) = simplified.value else {
            panic!("Expected polygon");
        };
        assert_eq!(rings[1], hole_path);
        let crossing = ring_crossings(&to_coords(&rings[0]).unwrap(), &to_coords(&rings[1]).unwrap());
        assert_eq!(crossing, None);
    }

    #[test]
    fn test_malformed_position_is_an_error() {
        let line = Geometry::new(GeoValue::LineString(vec![vec![0.0, 0.0], vec![1.0]]));
        assert!(matches!(GeoKernel.is_valid(&line), Err(OracleError::Malformed(_))));
    }
}
