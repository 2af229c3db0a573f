//! Renderer chain for parsed mind maps.
//!
//! Renderers are tried in order; the first success wins. When parsing
//! failed, or every renderer failed, the raw syntax is returned together
//! with the error so the caller can still show something.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::RenderError;
use crate::mindmap::model::{GraphModel, Node};
use crate::mindmap::parser::parse;

/// Nesting limit for the outline view.
pub const MAX_OUTLINE_DEPTH: usize = 10;

pub trait GraphRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, graph: &GraphModel) -> Result<String, RenderError>;
}

/// Graph-library element list: one `data` object per node and per edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementsRenderer;

impl ElementsRenderer {
    pub fn elements(graph: &GraphModel) -> Vec<Value> {
        let nodes = graph.nodes.iter().map(|node| {
            json!({ "data": { "id": node.id, "label": node.label, "type": node.kind } })
        });
        let edges = graph.edges.iter().enumerate().map(|(i, edge)| {
            json!({
                "data": {
                    "id": format!("edge-{}", i),
                    "source": edge.source,
                    "target": edge.target,
                    "label": edge.label,
                }
            })
        });
        nodes.chain(edges).collect()
    }
}

impl GraphRenderer for ElementsRenderer {
    fn name(&self) -> &'static str {
        "elements"
    }

    fn render(&self, graph: &GraphModel) -> Result<String, RenderError> {
        if graph.nodes.is_empty() {
            return Err(RenderError::Empty);
        }
        Ok(serde_json::to_string_pretty(&Self::elements(graph))?)
    }
}

/// Indented text tree walked from the roots.
#[derive(Debug, Clone, Copy)]
pub struct OutlineRenderer {
    pub max_depth: usize,
}

impl Default for OutlineRenderer {
    fn default() -> Self {
        Self { max_depth: MAX_OUTLINE_DEPTH }
    }
}

struct OutlineWalk<'a> {
    graph: &'a GraphModel,
    max_depth: usize,
    path: Vec<&'a str>,
    out: String,
}

impl<'a> OutlineWalk<'a> {
    fn visit(&mut self, node: &'a Node, edge_label: &str, depth: usize) {
        let indent = "  ".repeat(depth);
        let prefix = if edge_label.is_empty() { String::new() } else { format!("[{}] ", edge_label) };

        if self.path.contains(&node.id.as_str()) {
            let _ = writeln!(self.out, "{}- {}{} (cycle)", indent, prefix, node.label);
            return;
        }
        let _ = writeln!(self.out, "{}- {}{}", indent, prefix, node.label);

        if depth + 1 >= self.max_depth {
            if self.graph.outgoing(&node.id).next().is_some() {
                let _ = writeln!(self.out, "{}  - ...", indent);
            }
            return;
        }

        let graph = self.graph;
        self.path.push(node.id.as_str());
        for edge in graph.outgoing(&node.id) {
            if let Some(child) = graph.node(&edge.target) {
                self.visit(child, &edge.label, depth + 1);
            }
        }
        self.path.pop();
    }
}

/// Add every node reachable from `start` to `reached`.
fn reach<'a>(graph: &'a GraphModel, start: &'a str, reached: &mut HashSet<&'a str>) {
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if reached.insert(id) {
            stack.extend(graph.outgoing(id).map(|edge| edge.target.as_str()));
        }
    }
}

impl GraphRenderer for OutlineRenderer {
    fn name(&self) -> &'static str {
        "outline"
    }

    fn render(&self, graph: &GraphModel) -> Result<String, RenderError> {
        if graph.nodes.is_empty() {
            return Err(RenderError::Empty);
        }
        let mut walk = OutlineWalk { graph, max_depth: self.max_depth, path: Vec::new(), out: String::new() };
        let mut reached = HashSet::new();

        for root in graph.roots() {
            reach(graph, &root.id, &mut reached);
            walk.visit(root, "", 0);
        }
        // Cycles that no root leads into still get listed.
        for node in &graph.nodes {
            if !reached.contains(node.id.as_str()) {
                reach(graph, &node.id, &mut reached);
                walk.visit(node, "", 0);
            }
        }
        Ok(walk.out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MindmapView {
    Rendered { renderer: &'static str, output: String },
    /// Raw syntax shown as-is, with the reason nothing rendered.
    Raw { syntax: String, error: String },
}

impl MindmapView {
    pub fn is_rendered(&self) -> bool {
        matches!(self, MindmapView::Rendered { .. })
    }
}

pub fn default_renderers() -> Vec<Box<dyn GraphRenderer>> {
    vec![Box::new(ElementsRenderer), Box::new(OutlineRenderer::default())]
}

/// Parse `syntax` and run it through `renderers` in order.
pub fn render_with_fallback(syntax: &str, renderers: &[Box<dyn GraphRenderer>]) -> MindmapView {
    let graph = parse(syntax);
    render_graph(syntax, &graph, renderers)
}

pub fn render_graph(syntax: &str, graph: &GraphModel, renderers: &[Box<dyn GraphRenderer>]) -> MindmapView {
    if graph.is_parse_failure() {
        return MindmapView::Raw { syntax: syntax.to_string(), error: RenderError::ParseFailed.to_string() };
    }

    let mut last_error = RenderError::NoRenderer;
    for renderer in renderers {
        match renderer.render(graph) {
            Ok(output) => {
                debug!(renderer = renderer.name(), "Rendered mind map");
                return MindmapView::Rendered { renderer: renderer.name(), output };
            }
            Err(e) => {
                warn!(renderer = renderer.name(), error = %e, "Mind map renderer failed, trying next");
                last_error = e;
            }
        }
    }
    MindmapView::Raw { syntax: syntax.to_string(), error: last_error.to_string() }
}
