use geo_types::Coord;
use geojson::Geometry;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Validity oracle is not available")]
    Unavailable,

    #[error("Geometry cannot be evaluated: {0}")]
    Malformed(String),

    #[error("Oracle failure: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Coordinate outside the domain of {0}")]
    OutOfDomain(Crs),
}

/// First reason a geometry fails validation, as reported by an oracle
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub message: String,
    pub coordinate: Option<Coord<f64>>,
}

/// Topology validity capability consumed by the diagnostics
pub trait ValidityOracle: Send + Sync {
    fn is_valid(&self, geometry: &Geometry) -> Result<bool, OracleError>;

    fn is_simple(&self, geometry: &Geometry) -> Result<bool, OracleError>;

    /// The first validation error, `None` if the geometry is valid
    fn validation_error(&self, geometry: &Geometry) -> Result<Option<ValidationError>, OracleError>;

    fn find_self_intersections(&self, geometry: &Geometry) -> Result<Vec<Coord<f64>>, OracleError>;
}

/// Topology-preserving vertex reduction capability used by the simplifier
pub trait GeometryKernel: Send + Sync {
    fn simplify(&self, geometry: &Geometry, tolerance: f64) -> Result<Geometry, OracleError>;
}

/// Coordinate reference frames known to the pipeline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
pub enum Crs {
    /// Geographic longitude/latitude in degrees, the canonical frame
    #[serde(rename = "EPSG:4326")]
    #[strum(serialize = "EPSG:4326")]
    Wgs84,
    /// Spherical (web) mercator metres
    #[serde(rename = "EPSG:3857")]
    #[strum(serialize = "EPSG:3857")]
    WebMercator,
}

/// Coordinate transform capability used to canonicalize reported coordinates
pub trait Projection: Send + Sync {
    fn transform(&self, coord: Coord<f64>, from: Crs, to: Crs) -> Result<Coord<f64>, ProjectionError>;
}
