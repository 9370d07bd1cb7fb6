use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{GeofixError, Result};
use crate::traits::Crs;

/// Minimum positions in a well-formed ring, closing duplicate included
pub const MIN_RING_POSITIONS: usize = 4;

/// Decimal digits kept by the simplifier
pub const SIMPLIFY_DECIMALS: i32 = 3;

/// Tunables shared by every pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct Config {
    #[schemars(description = "Per-axis tolerance under which ring endpoints count as equal")]
    pub closure_tolerance: f64,
    #[schemars(description = "Distance tolerance handed to the simplification kernel; 0.001 matches the 3-decimal rounding grid")]
    pub simplify_tolerance: f64,
    #[schemars(description = "Fraction of the bounding-box diagonal a reported coordinate may be snapped across")]
    pub snap_fraction: f64,
    #[schemars(description = "Snap distance used when the bounding-box diagonal cannot be computed")]
    pub snap_fallback: f64,
    #[schemars(description = "Frame assumed for coordinates outside geographic bounds")]
    pub projected_frame: Crs,
    #[schemars(description = "Frame geometries are projected into before topology checks")]
    pub working_frame: Option<Crs>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            closure_tolerance: 1e-10,
            simplify_tolerance: 0.001,
            snap_fraction: 0.01,
            snap_fallback: 1000.0,
            projected_frame: Crs::WebMercator,
            working_frame: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(GeofixError::UnsupportedFileFormat),
        }
    }

    /// JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Config)
    }
}
