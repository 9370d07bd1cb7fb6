use geo_types::Coord;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use ts_rs::TS;

/// Geometry type tags from the GeoJSON vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema, TS,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Parse a `"type"` tag, `None` for anything outside the geometry vocabulary
    pub fn from_tag(tag: &str) -> Option<Self> {
        tag.parse().ok()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// What an analysis node stands for: a geometry, or one ring of a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, Display)]
pub enum NodeKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    #[serde(rename = "Exterior Ring")]
    #[strum(serialize = "Exterior Ring")]
    ExteriorRing,
    #[serde(rename = "Interior Ring")]
    #[strum(serialize = "Interior Ring")]
    InteriorRing,
    Unrecognized,
}

impl NodeKind {
    pub fn is_ring(&self) -> bool {
        matches!(self, NodeKind::ExteriorRing | NodeKind::InteriorRing)
    }
}

impl From<GeometryType> for NodeKind {
    fn from(value: GeometryType) -> Self {
        match value {
            GeometryType::Point => NodeKind::Point,
            GeometryType::LineString => NodeKind::LineString,
            GeometryType::Polygon => NodeKind::Polygon,
            GeometryType::MultiPoint => NodeKind::MultiPoint,
            GeometryType::MultiLineString => NodeKind::MultiLineString,
            GeometryType::MultiPolygon => NodeKind::MultiPolygon,
            GeometryType::GeometryCollection => NodeKind::GeometryCollection,
        }
    }
}

/// Tri-state topology verdict. `Unknown` means no oracle answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
pub enum Validity {
    Valid,
    Invalid,
    Unknown,
}

/// A single finding, optionally pinned to a coordinate in EPSG:4326
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<[f64; 2]>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            coordinate: None,
        }
    }

    pub fn at(message: impl Into<String>, coord: Coord<f64>) -> Self {
        Self {
            message: message.into(),
            coordinate: Some([coord.x, coord.y]),
        }
    }
}

/// Per-type counts. Only the counts meaningful for a node's kind are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
pub struct Detail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rings: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygons: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometries: Option<usize>,
}

/// One node of the decomposition tree.
///
/// `path` is the list of child indices leading to this node from the
/// document root; its first element is the index of the top-level geometry.
/// Ring nodes never carry a `validity` banner, only their own diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct AnalysisNode {
    pub kind: NodeKind,
    pub parent: Option<NodeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity: Option<Validity>,
    pub diagnostics: Vec<Diagnostic>,
    pub detail: Detail,
    pub children: Vec<AnalysisNode>,
    pub path: Vec<usize>,
}

impl AnalysisNode {
    /// Position of this node among its siblings
    pub fn index(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }

    /// Look up a descendant (or self) by its absolute index path
    pub fn find(&self, path: &[usize]) -> Option<&AnalysisNode> {
        let rest = path.strip_prefix(self.path.as_slice())?;
        let mut node = self;
        for &idx in rest {
            node = node.children.get(idx)?;
        }
        Some(node)
    }

    /// Pre-order walk over this node and all descendants
    pub fn walk(&self) -> Vec<&AnalysisNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Number of nodes in this subtree reported as invalid or carrying ring findings
    pub fn problem_count(&self) -> usize {
        self.walk()
            .into_iter()
            .filter(|node| {
                node.validity == Some(Validity::Invalid)
                    || (node.kind.is_ring() && !node.diagnostics.is_empty())
            })
            .count()
    }
}

/// Result of a document-level transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub document: serde_json::Value,
    pub diagnostics: Vec<Diagnostic>,
    pub modified: bool,
}

impl Outcome {
    pub fn unchanged(document: serde_json::Value) -> Self {
        Self {
            document,
            diagnostics: Vec::new(),
            modified: false,
        }
    }
}

/// Result of a transform over raw text. `text` is the input verbatim
/// unless the document actually changed.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutcome {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
    pub modified: bool,
}

impl TextOutcome {
    pub fn verbatim(text: &str) -> Self {
        Self {
            text: text.to_string(),
            diagnostics: Vec::new(),
            modified: false,
        }
    }
}
