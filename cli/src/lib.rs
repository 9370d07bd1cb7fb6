use std::fmt::Write;
use std::path::Path;

use clap::ValueEnum;
use geofix::{AnalysisNode, Detail, Diagnostic, Pipeline, PipelineBuilder, Validity};

/// How `diagnose` prints its trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Which schema `schema` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemaTarget {
    #[default]
    Commands,
    Config,
}

/// Build the pipeline, reading configuration from `config` when given
pub fn load_pipeline(config: Option<&Path>, oracle: bool) -> geofix::Result<Pipeline> {
    let mut builder = PipelineBuilder::new();
    if let Some(path) = config {
        builder = builder.with_config_file(path)?;
    }
    if !oracle {
        builder = builder.without_oracle();
    }
    Ok(builder.build())
}

fn count_of(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// "2 polygons, 3 rings, 13 points" style summary of a node's counts
pub fn detail_summary(detail: &Detail) -> String {
    [
        (detail.geometries, "geometry", "geometries"),
        (detail.polygons, "polygon", "polygons"),
        (detail.lines, "line", "lines"),
        (detail.rings, "ring", "rings"),
        (detail.points, "point", "points"),
    ]
    .into_iter()
    .filter_map(|(count, singular, plural)| count.map(|c| count_of(c, singular, plural)))
    .collect::<Vec<_>>()
    .join(", ")
}

fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    match diagnostic.coordinate {
        Some([x, y]) => format!("{} at ({x:.6}, {y:.6})", diagnostic.message),
        None => diagnostic.message.clone(),
    }
}

fn render_node(node: &AnalysisNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let path = node
        .path
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(".");
    let banner = match node.validity {
        Some(Validity::Valid) => " ✅",
        Some(Validity::Invalid) => " ❌",
        Some(Validity::Unknown) => " ❔",
        None => "",
    };
    let summary = detail_summary(&node.detail);

    let _ = write!(out, "{indent}[{path}] {}{banner}", node.kind);
    if !summary.is_empty() {
        let _ = write!(out, " ({summary})");
    }
    out.push('\n');

    for diagnostic in &node.diagnostics {
        let _ = writeln!(out, "{indent}    - {}", format_diagnostic(diagnostic));
    }
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

/// Human-readable rendering of analysis trees, one line per node
pub fn render_analysis(trees: &[AnalysisNode]) -> String {
    if trees.is_empty() {
        return "No geometries found\n".to_string();
    }
    let mut out = String::new();
    for tree in trees {
        render_node(tree, 0, &mut out);
    }
    let problems: usize = trees.iter().map(AnalysisNode::problem_count).sum();
    let _ = writeln!(
        out,
        "{} in {}",
        count_of(problems, "problem", "problems"),
        count_of(trees.len(), "geometry", "geometries")
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_summary() {
        let detail = Detail {
            polygons: Some(2),
            rings: Some(3),
            points: Some(1),
            ..Default::default()
        };
        assert_eq!(detail_summary(&detail), "2 polygons, 3 rings, 1 point");

        let detail = Detail { geometries: Some(4), ..Default::default() };
        assert_eq!(detail_summary(&detail), "4 geometries");
        assert_eq!(detail_summary(&Detail::default()), "");
    }

    #[test]
    fn test_render_short_ring() {
        let pipeline = load_pipeline(None, true).unwrap();
        let trees = pipeline.diagnose(r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1]]]}"#);
        let text = render_analysis(&trees);

        assert!(text.starts_with("[0] Polygon ❌ (1 ring, 3 points)\n"));
        assert!(text.contains("  [0.0] Exterior Ring (3 points)\n"));
        assert!(text.contains("minimum 4 points required at (0.000000, 0.000000)"));
        assert!(text.ends_with("2 problems in 1 geometry\n"));
    }

    #[test]
    fn test_render_without_oracle() {
        let pipeline = load_pipeline(None, false).unwrap();
        let trees = pipeline.diagnose(r#"{"type":"Point","coordinates":[1,2]}"#);
        assert!(render_analysis(&trees).starts_with("[0] Point ❔"));
        assert_eq!(render_analysis(&[]), "No geometries found\n");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(load_pipeline(Some(Path::new("does-not-exist.toml")), true).is_err());
        assert!(load_pipeline(Some(Path::new("settings.yaml")), true).is_err());
    }
}
