//! # Geofix
//!
//! Repair, diagnostics and simplification for hand-edited GeoJSON.
//!
//! ## Core Features
//!
//! - **Ring closing**: append the missing closing position to polygon rings
//!   without touching anything else in the document
//! - **Diagnostics**: decompose nested geometries into an addressable tree
//!   and report topology problems with coordinates in EPSG:4326
//! - **Simplification**: idempotent fixed-precision vertex reduction
//! - **Capability injection**: bring your own validity oracle, simplification
//!   kernel or projection through the pipeline builder
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geofix::Pipeline;
//!
//! let pipeline = Pipeline::builder().build();
//!
//! let text = std::fs::read_to_string("parcels.geojson")?;
//! let fixed = pipeline.close_rings(&text);
//! if fixed.modified {
//!     std::fs::write("parcels.geojson", fixed.text)?;
//! }
//!
//! for tree in pipeline.diagnose(&text) {
//!     println!("{} problems in geometry {}", tree.problem_count(), tree.index());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod config;
pub mod coords;
pub mod document;
pub mod algorithms;
pub mod kernel;
pub mod pipeline;
pub mod command;

// Re-exports for convenience
pub use error::{GeofixError, Result};
pub use types::*;
pub use traits::*;
pub use config::Config;
pub use document::DocumentShape;
pub use kernel::{GeoKernel, LazyOracle, SphericalMercator};
pub use pipeline::{Pipeline, builder::PipelineBuilder};
pub use command::{CommandOutcome, GeofixCommand};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_basic() {
        let pipeline = Pipeline::builder().build();
        let text = r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2]]]}}"#;

        let closed = pipeline.close_rings(text);
        assert!(closed.modified, "Ring should have been closed");

        let trees = pipeline.diagnose(&closed.text);
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].validity, Some(Validity::Valid));
        assert_eq!(trees[0].detail.points, Some(5));
    }

    #[test]
    fn test_command_round_trip() {
        let pipeline = Pipeline::default();
        let command: GeofixCommand = serde_json::from_str(r#"{"type": "close_rings"}"#).unwrap();
        let CommandOutcome::Text(outcome) = pipeline.execute(&command, "[]") else {
            panic!("Expected a text outcome");
        };
        assert_eq!(outcome.text, "[]");
        assert!(!outcome.modified);
    }

    #[test]
    fn test_analysis_serializes_for_renderers() {
        let pipeline = Pipeline::default();
        let trees = pipeline.diagnose(r#"{"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1]]]}"#);
        let json = serde_json::to_value(&trees).unwrap();

        assert_eq!(json[0]["kind"], "Polygon");
        assert_eq!(json[0]["validity"], "Invalid");
        assert_eq!(json[0]["children"][0]["kind"], "Exterior Ring");
        assert!(json[0]["children"][0].get("validity").is_none());
    }
}
