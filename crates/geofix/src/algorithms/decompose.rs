use serde_json::{Value, json};
use tracing::debug;

use crate::{
    algorithms::{structure, topology::TopologyDiagnostics},
    coords,
    types::{AnalysisNode, Detail, Diagnostic, GeometryType, NodeKind, Validity},
};

/// Breaks nested geometries into an addressable tree of analysis nodes.
///
/// Every geometry node is diagnosed on its own, so an invalid MultiPolygon
/// also tells which of its polygons is at fault. Ring nodes carry only their
/// own closure and length findings.
pub struct HierarchicalDecomposer<'a> {
    topology: &'a TopologyDiagnostics<'a>,
}

impl<'a> HierarchicalDecomposer<'a> {
    pub fn new(topology: &'a TopologyDiagnostics<'a>) -> Self {
        Self { topology }
    }

    /// Decompose one geometry. `path` is the node's absolute index path,
    /// usually just the geometry's top-level index.
    pub fn decompose(&self, geometry: &Value, path: Vec<usize>) -> AnalysisNode {
        self.node(geometry, None, path)
    }

    fn node(&self, raw: &Value, parent: Option<NodeKind>, path: Vec<usize>) -> AnalysisNode {
        let geometry_type = raw
            .get("type")
            .and_then(Value::as_str)
            .and_then(GeometryType::from_tag);

        let violations = structure::validate(raw);
        // A collection with a member list is still walked; its own report carries the violation
        let walkable = geometry_type == Some(GeometryType::GeometryCollection)
            && raw.get("geometries").is_some_and(Value::is_array);
        let Some(geometry_type) = geometry_type.filter(|_| violations.is_empty() || walkable) else {
            debug!(?path, "Broken geometry node");
            return broken(
                geometry_type.map_or(NodeKind::Unrecognized, NodeKind::from),
                parent,
                violations.into_iter().map(Diagnostic::new).collect(),
                path,
            );
        };

        let kind = NodeKind::from(geometry_type);
        let report = self.topology.diagnose(raw);

        // Members of a collection are walked even when a sibling is malformed
        if geometry_type != GeometryType::GeometryCollection && coords::decode_geometry(raw).is_err() {
            return broken(kind, parent, report.diagnostics, path);
        }

        let coordinates = raw.get("coordinates").and_then(Value::as_array);
        let members = coordinates.map(Vec::as_slice).unwrap_or_default();
        let child_path = |i: usize| {
            let mut child = path.clone();
            child.push(i);
            child
        };

        let (children, detail) = match geometry_type {
            GeometryType::Point => (Vec::new(), Detail { points: Some(1), ..Default::default() }),
            GeometryType::LineString => (
                Vec::new(),
                Detail { points: Some(members.len()), ..Default::default() },
            ),
            GeometryType::MultiPoint => {
                let children: Vec<AnalysisNode> = members
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let point = json!({"type": "Point", "coordinates": p});
                        self.node(&point, Some(kind), child_path(i))
                    })
                    .collect();
                let detail = Detail { points: Some(children.len()), ..Default::default() };
                (children, detail)
            }
            GeometryType::MultiLineString => {
                let children: Vec<AnalysisNode> = members
                    .iter()
                    .enumerate()
                    .map(|(i, line)| {
                        let line = json!({"type": "LineString", "coordinates": line});
                        self.node(&line, Some(kind), child_path(i))
                    })
                    .collect();
                let detail = Detail {
                    lines: Some(children.len()),
                    points: Some(sum(&children, |d| d.points)),
                    ..Default::default()
                };
                (children, detail)
            }
            GeometryType::Polygon => {
                let children: Vec<AnalysisNode> = members
                    .iter()
                    .enumerate()
                    .map(|(i, ring)| self.ring(ring, i, child_path(i)))
                    .collect();
                let detail = Detail {
                    rings: Some(children.len()),
                    points: Some(sum(&children, |d| d.points)),
                    ..Default::default()
                };
                (children, detail)
            }
            GeometryType::MultiPolygon => {
                let children: Vec<AnalysisNode> = members
                    .iter()
                    .enumerate()
                    .map(|(i, polygon)| {
                        let polygon = json!({"type": "Polygon", "coordinates": polygon});
                        self.node(&polygon, Some(kind), child_path(i))
                    })
                    .collect();
                let detail = Detail {
                    polygons: Some(children.len()),
                    rings: Some(sum(&children, |d| d.rings)),
                    points: Some(sum(&children, |d| d.points)),
                    ..Default::default()
                };
                (children, detail)
            }
            GeometryType::GeometryCollection => {
                let geometries = raw.get("geometries").and_then(Value::as_array);
                let children: Vec<AnalysisNode> = geometries
                    .into_iter()
                    .flatten()
                    .enumerate()
                    .map(|(i, member)| self.node(member, Some(kind), child_path(i)))
                    .collect();
                let detail = Detail { geometries: Some(children.len()), ..Default::default() };
                (children, detail)
            }
        };

        AnalysisNode {
            kind,
            parent,
            validity: Some(report.validity),
            diagnostics: report.diagnostics,
            detail,
            children,
            path,
        }
    }

    fn ring(&self, ring: &Value, index: usize, path: Vec<usize>) -> AnalysisNode {
        let kind = if index == 0 {
            NodeKind::ExteriorRing
        } else {
            NodeKind::InteriorRing
        };
        AnalysisNode {
            kind,
            parent: Some(NodeKind::Polygon),
            validity: None,
            diagnostics: self.topology.ring_findings(ring, ""),
            detail: Detail {
                points: Some(ring.as_array().map_or(0, Vec::len)),
                ..Default::default()
            },
            children: Vec::new(),
            path,
        }
    }
}

fn broken(kind: NodeKind, parent: Option<NodeKind>, diagnostics: Vec<Diagnostic>, path: Vec<usize>) -> AnalysisNode {
    AnalysisNode {
        kind,
        parent,
        validity: Some(Validity::Invalid),
        diagnostics,
        detail: Detail::default(),
        children: Vec::new(),
        path,
    }
}

fn sum(children: &[AnalysisNode], count: impl Fn(&Detail) -> Option<usize>) -> usize {
    children.iter().filter_map(|c| count(&c.detail)).sum()
}
