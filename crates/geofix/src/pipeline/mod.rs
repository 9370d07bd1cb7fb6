pub mod builder;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    algorithms::{HierarchicalDecomposer, RingNormalizer, Simplifier, TopologyDiagnostics, TopologyReport},
    command::{CommandOutcome, GeofixCommand},
    config::Config,
    document,
    traits::{GeometryKernel, Projection, ValidityOracle},
    types::{AnalysisNode, Outcome, TextOutcome},
};

/// Entry point tying the normalizer, simplifier and diagnostics to a set of
/// injected capabilities.
///
/// Every operation takes the document by reference and never mutates it.
/// Text operations never fail: unparseable input is returned untouched.
pub struct Pipeline {
    oracle: Option<Arc<dyn ValidityOracle>>,
    kernel: Option<Arc<dyn GeometryKernel>>,
    projection: Arc<dyn Projection>,
    config: Config,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(
        oracle: Option<Arc<dyn ValidityOracle>>,
        kernel: Option<Arc<dyn GeometryKernel>>,
        projection: Arc<dyn Projection>,
        config: Config,
    ) -> Self {
        Self {
            oracle,
            kernel,
            projection,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close unclosed rings in a parsed document
    pub fn normalize_value(&self, document: &Value) -> Outcome {
        RingNormalizer::from_config(&self.config).normalize(document)
    }

    /// Simplify a parsed document at the configured tolerance
    pub fn simplify_value(&self, document: &Value) -> Outcome {
        self.simplify_value_with(document, self.config.simplify_tolerance)
    }

    pub fn simplify_value_with(&self, document: &Value, tolerance: f64) -> Outcome {
        Simplifier::new(self.kernel.as_deref(), tolerance).simplify(document)
    }

    /// Diagnose a single geometry object without decomposing it
    pub fn diagnose_geometry(&self, geometry: &Value) -> TopologyReport {
        self.topology().diagnose(geometry)
    }

    /// One analysis tree per top-level geometry of a parsed document
    pub fn analyze(&self, document: &Value) -> Vec<AnalysisNode> {
        let topology = self.topology();
        let decomposer = HierarchicalDecomposer::new(&topology);
        let nodes: Vec<AnalysisNode> = document::top_level_geometries(document)
            .into_iter()
            .map(|(index, geometry)| decomposer.decompose(&geometry, vec![index]))
            .collect();
        info!(
            geometries = nodes.len(),
            problems = nodes.iter().map(AnalysisNode::problem_count).sum::<usize>(),
            "Analysed document"
        );
        nodes
    }

    /// Close unclosed rings in raw text.
    ///
    /// Returns the text verbatim unless a ring was actually closed.
    pub fn close_rings(&self, text: &str) -> TextOutcome {
        let Some(document) = parse(text) else {
            return TextOutcome::verbatim(text);
        };
        let outcome = self.normalize_value(&document);
        let rewrite = outcome.modified;
        render(text, outcome, rewrite)
    }

    /// Simplify raw text at the configured tolerance
    pub fn simplify(&self, text: &str) -> TextOutcome {
        self.simplify_with(text, self.config.simplify_tolerance)
    }

    /// Simplify raw text.
    ///
    /// The text is rewritten whenever rounding or simplification changed a
    /// value; `modified` only reports vertex reduction.
    pub fn simplify_with(&self, text: &str, tolerance: f64) -> TextOutcome {
        let Some(document) = parse(text) else {
            return TextOutcome::verbatim(text);
        };
        let outcome = self.simplify_value_with(&document, tolerance);
        let rewrite = outcome.document != document;
        render(text, outcome, rewrite)
    }

    /// Analyse raw text. Unparseable input yields no trees.
    pub fn diagnose(&self, text: &str) -> Vec<AnalysisNode> {
        parse(text).map(|document| self.analyze(&document)).unwrap_or_default()
    }

    pub fn execute(&self, command: &GeofixCommand, text: &str) -> CommandOutcome {
        debug!(%command, "Executing command");
        match command {
            GeofixCommand::CloseRings => CommandOutcome::Text(self.close_rings(text)),
            GeofixCommand::Simplify { tolerance } => CommandOutcome::Text(
                self.simplify_with(text, tolerance.unwrap_or(self.config.simplify_tolerance)),
            ),
            GeofixCommand::Diagnose => CommandOutcome::Analysis(self.diagnose(text)),
        }
    }

    fn topology(&self) -> TopologyDiagnostics<'_> {
        TopologyDiagnostics::new(self.oracle.as_deref(), self.projection.as_ref(), &self.config)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: oracle {}, kernel {}, projected frame {}",
            if self.oracle.is_some() { "configured" } else { "absent" },
            if self.kernel.is_some() { "configured" } else { "absent" },
            self.config.projected_frame,
        )
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn parse(text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(document) => Some(document),
        Err(e) => {
            warn!(error = %e, "Input is not valid JSON, leaving it untouched");
            None
        }
    }
}

fn render(original: &str, outcome: Outcome, rewrite: bool) -> TextOutcome {
    if !rewrite {
        return TextOutcome {
            text: original.to_string(),
            diagnostics: outcome.diagnostics,
            modified: false,
        };
    }
    match serde_json::to_string_pretty(&outcome.document) {
        Ok(text) => TextOutcome {
            text,
            diagnostics: outcome.diagnostics,
            modified: outcome.modified,
        },
        Err(e) => {
            warn!(error = %e, "Could not serialize result, leaving input untouched");
            TextOutcome {
                text: original.to_string(),
                diagnostics: outcome.diagnostics,
                modified: false,
            }
        }
    }
}
