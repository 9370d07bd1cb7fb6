use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::types::{AnalysisNode, TextOutcome};

#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
pub enum GeofixCommand {
    /// Close polygon rings whose first and last positions differ
    #[serde(rename = "close_rings")]
    CloseRings,

    /// Round coordinates and drop redundant vertices
    #[serde(rename = "simplify")]
    Simplify {
        /// Vertex reduction tolerance. Rounding stays at 3 decimals whatever
        /// the tolerance; the stated behavior (rounding within half a unit,
        /// byte-identical reruns) is pinned down for the 0.001 default.
        #[serde(default)]
        tolerance: Option<f64>,
    },

    /// Decompose geometries and report topology problems
    #[serde(rename = "diagnose")]
    Diagnose,
}

impl GeofixCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(GeofixCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    /// Get a description of the command
    pub fn description(&self) -> &'static str {
        match self {
            Self::CloseRings => "Close unclosed polygon rings, leaving already-correct text untouched",
            Self::Simplify { .. } => "Round coordinates to 3 decimals and remove redundant vertices",
            Self::Diagnose => "Decompose every geometry and report validity per part",
        }
    }

    /// Get parameter requirements for the command
    pub fn parameters_info(&self) -> Vec<(&'static str, &'static str, bool)> {
        match self {
            Self::CloseRings | Self::Diagnose => vec![],
            Self::Simplify { .. } => vec![
                ("tolerance", "Vertex reduction tolerance, defaults to the configured one", false),
            ],
        }
    }
}

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Text(TextOutcome),
    Analysis(Vec<AnalysisNode>),
}
