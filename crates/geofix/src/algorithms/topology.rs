use geo_types::Coord;
use geojson::Geometry;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    algorithms::{
        resolver::{self, CoordinateResolver},
        structure,
    },
    config::{Config, MIN_RING_POSITIONS},
    coords::{self, position_xy},
    traits::{Crs, Projection, ValidityOracle},
    types::{Diagnostic, GeometryType, Validity},
};

/// Verdict for one geometry node
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyReport {
    pub validity: Validity,
    pub diagnostics: Vec<Diagnostic>,
}

impl TopologyReport {
    fn invalid(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            validity: Validity::Invalid,
            diagnostics,
        }
    }
}

/// Closure and minimum-length problems of a single raw ring
pub fn ring_problems(ring: &Value, tolerance: f64) -> Vec<String> {
    let Some(positions) = ring.as_array() else {
        return vec!["ring is not a list of positions".to_string()];
    };
    let mut problems = Vec::new();
    if positions.len() < MIN_RING_POSITIONS {
        problems.push(format!(
            "ring has {} points, minimum {} points required",
            positions.len(),
            MIN_RING_POSITIONS
        ));
    }
    match (
        positions.first().and_then(position_xy),
        positions.last().and_then(position_xy),
    ) {
        (Some(a), Some(b)) => {
            if (a.x - b.x).abs() > tolerance || (a.y - b.y).abs() > tolerance {
                problems.push("ring is not closed".to_string());
            }
        }
        _ if positions.is_empty() => {}
        _ => problems.push("ring endpoints are not numeric positions".to_string()),
    }
    problems
}

/// Runs structural and topology checks on geometry nodes and turns oracle
/// findings into diagnostics pinned to EPSG:4326 coordinates.
pub struct TopologyDiagnostics<'a> {
    oracle: Option<&'a dyn ValidityOracle>,
    projection: &'a dyn Projection,
    resolver: CoordinateResolver,
    closure_tolerance: f64,
    projected_frame: Crs,
    working_frame: Option<Crs>,
}

impl<'a> TopologyDiagnostics<'a> {
    pub fn new(
        oracle: Option<&'a dyn ValidityOracle>,
        projection: &'a dyn Projection,
        config: &Config,
    ) -> Self {
        Self {
            oracle,
            projection,
            resolver: CoordinateResolver::from_config(config),
            closure_tolerance: config.closure_tolerance,
            projected_frame: config.projected_frame,
            working_frame: config.working_frame,
        }
    }

    /// Diagnose one raw geometry object
    pub fn diagnose(&self, raw: &Value) -> TopologyReport {
        let violations = structure::validate(raw);
        if !violations.is_empty() {
            return TopologyReport::invalid(violations.into_iter().map(Diagnostic::new).collect());
        }

        let geometry = match coords::decode_geometry(raw) {
            Ok(geometry) => geometry,
            Err(reason) => {
                let tag = raw.get("type").and_then(Value::as_str).unwrap_or("geometry");
                debug!(tag, %reason, "Malformed coordinates");
                return TopologyReport::invalid(vec![Diagnostic::new(format!(
                    "malformed coordinates for {tag}: {reason}"
                ))]);
            }
        };

        let Some(oracle) = self.oracle else {
            return self.unknown(raw, "no validity oracle configured");
        };

        let primary = coords::flatten_typed(&geometry);
        let working = self.to_working_frame(&geometry);
        let alternate = working.as_ref().map(coords::flatten_typed);
        let subject = working.as_ref().unwrap_or(&geometry);

        match oracle.is_valid(subject) {
            Ok(true) => TopologyReport {
                validity: Validity::Valid,
                diagnostics: Vec::new(),
            },
            Ok(false) => {
                self.invalid_report(oracle, raw, subject, &primary, alternate.as_deref())
            }
            Err(e) => {
                warn!(error = %e, "Validity oracle failed");
                self.unknown(raw, &e.to_string())
            }
        }
    }

    fn invalid_report(
        &self,
        oracle: &dyn ValidityOracle,
        raw: &Value,
        subject: &Geometry,
        primary: &[Coord<f64>],
        alternate: Option<&[Coord<f64>]>,
    ) -> TopologyReport {
        let mut diagnostics = Vec::new();

        match oracle.validation_error(subject) {
            Ok(Some(error)) => diagnostics.push(match error.coordinate {
                Some(c) => Diagnostic::at(error.message, self.locate(c, primary, alternate)),
                None => Diagnostic::new(error.message),
            }),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "validation_error unavailable"),
        }

        match oracle.is_simple(subject) {
            Ok(false) => match oracle.find_self_intersections(subject) {
                Ok(points) => {
                    for point in points {
                        let finding =
                            Diagnostic::at("Self-intersection", self.locate(point, primary, alternate));
                        if !diagnostics.iter().any(|d| d.coordinate == finding.coordinate) {
                            diagnostics.push(finding);
                        }
                    }
                }
                Err(e) => debug!(error = %e, "find_self_intersections unavailable"),
            },
            Ok(true) => {}
            Err(e) => debug!(error = %e, "is_simple unavailable"),
        }

        if diagnostics.is_empty() {
            diagnostics = self.heuristics(raw);
        }
        if diagnostics.is_empty() {
            diagnostics.push(Diagnostic::new("Geometry is not topologically valid"));
        }
        TopologyReport::invalid(diagnostics)
    }

    fn unknown(&self, raw: &Value, reason: &str) -> TopologyReport {
        let mut diagnostics = vec![Diagnostic::new(format!("Validity not checked: {reason}"))];
        diagnostics.extend(self.heuristics(raw));
        TopologyReport {
            validity: Validity::Unknown,
            diagnostics,
        }
    }

    /// Snap an oracle coordinate to a real vertex and express it in EPSG:4326
    fn locate(&self, raw: Coord<f64>, primary: &[Coord<f64>], alternate: Option<&[Coord<f64>]>) -> Coord<f64> {
        let resolved = self.resolver.resolve(raw, primary, alternate);
        resolver::canonicalize(resolved, self.projection, self.projected_frame)
    }

    fn vertex(&self, position: Option<&Value>) -> Option<Coord<f64>> {
        position
            .and_then(position_xy)
            .map(|c| resolver::canonicalize(c, self.projection, self.projected_frame))
    }

    /// Ring problems pinned to the ring's first vertex
    pub fn ring_findings(&self, ring: &Value, prefix: &str) -> Vec<Diagnostic> {
        let first = self.vertex(ring.as_array().and_then(|r| r.first()));
        ring_problems(ring, self.closure_tolerance)
            .into_iter()
            .map(|problem| {
                let message = format!("{prefix}{problem}");
                match first {
                    Some(c) => Diagnostic::at(message, c),
                    None => Diagnostic::new(message),
                }
            })
            .collect()
    }

    fn ring_heuristics(&self, rings: &Value, prefix: &str, out: &mut Vec<Diagnostic>) {
        let Some(rings) = rings.as_array() else {
            return;
        };
        for (i, ring) in rings.iter().enumerate() {
            out.extend(self.ring_findings(ring, &format!("{prefix}ring {i}: ")));
        }
    }

    fn line_heuristics(&self, line: &Value, prefix: &str, out: &mut Vec<Diagnostic>) {
        let positions = line.as_array().map(Vec::as_slice).unwrap_or_default();
        let mut distinct: Vec<Coord<f64>> = positions.iter().filter_map(position_xy).collect();
        distinct.dedup();
        if distinct.len() < 2 {
            let message = format!("{prefix}line needs at least 2 distinct points");
            out.push(match self.vertex(positions.first()) {
                Some(c) => Diagnostic::at(message, c),
                None => Diagnostic::new(message),
            });
        }
    }

    /// Type-specific structural checks used when the oracle gives no reason
    pub fn heuristics(&self, raw: &Value) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        self.collect_heuristics(raw, "", &mut out);
        out
    }

    fn collect_heuristics(&self, raw: &Value, prefix: &str, out: &mut Vec<Diagnostic>) {
        let Some(geometry_type) = raw.get("type").and_then(Value::as_str).and_then(GeometryType::from_tag)
        else {
            return;
        };
        let coordinates = raw.get("coordinates").unwrap_or(&Value::Null);
        let members = coordinates.as_array().map(Vec::as_slice).unwrap_or_default();

        match geometry_type {
            GeometryType::Point | GeometryType::MultiPoint => {}
            GeometryType::LineString => self.line_heuristics(coordinates, prefix, out),
            GeometryType::MultiLineString => {
                for (i, line) in members.iter().enumerate() {
                    self.line_heuristics(line, &format!("{prefix}line {i}: "), out);
                }
            }
            GeometryType::Polygon => self.ring_heuristics(coordinates, prefix, out),
            GeometryType::MultiPolygon => {
                for (i, polygon) in members.iter().enumerate() {
                    self.ring_heuristics(polygon, &format!("{prefix}polygon {i} "), out);
                }
            }
            GeometryType::GeometryCollection => {
                let geometries = raw.get("geometries").and_then(Value::as_array);
                for (i, member) in geometries.into_iter().flatten().enumerate() {
                    self.collect_heuristics(member, &format!("{prefix}member {i}: "), out);
                }
            }
        }
    }

    /// Project a geometry into the working frame, if one is configured.
    ///
    /// Each position is read as geographic when it fits geographic bounds and
    /// as the projected frame otherwise. Any failed transform skips the
    /// projection and the oracle sees the source coordinates.
    fn to_working_frame(&self, geometry: &Geometry) -> Option<Geometry> {
        let target = self.working_frame?;
        let failed = std::cell::Cell::new(false);
        let value = coords::map_positions(&geometry.value, &|p: &Vec<f64>| {
            let source = Coord { x: p[0], y: p[1] };
            let from = if resolver::is_geographic(source) {
                Crs::Wgs84
            } else {
                self.projected_frame
            };
            match self.projection.transform(source, from, target) {
                Ok(c) => {
                    let mut out = p.clone();
                    out[0] = c.x;
                    out[1] = c.y;
                    out
                }
                Err(_) => {
                    failed.set(true);
                    p.clone()
                }
            }
        });
        if failed.get() {
            warn!(frame = %target, "Could not project geometry into working frame");
            return None;
        }
        Some(Geometry::new(value))
    }
}
