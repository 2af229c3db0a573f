//! Text to [`GraphModel`] for the flowchart subset the backend emits.
//!
//! Lossy on purpose: lines that are neither a shaped node definition nor a
//! connection are ignored. Parsing runs in two passes so that a label
//! declared anywhere in the text wins over the implicit id label.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use crate::mindmap::model::{Edge, GraphModel, Node, NodeKind};

/// Connection operators, longest first within a shared prefix. Bidirectional
/// forms keep the written left-to-right direction.
const FLOW_OPERATORS: [&str; 11] =
    ["<-.->", "<==>", "<-->", "-.->", "==>", "-->", "---", "===", "-.-", "--o", "--x"];

/// Node shape delimiters. Doubled forms must come before their single forms.
const SHAPES: [(&str, &str); 11] = [
    ("((", "))"),
    ("{{", "}}"),
    ("([", "])"),
    ("[(", ")]"),
    ("[[", "]]"),
    ("[/", "/]"),
    ("[", "]"),
    ("(", ")"),
    ("{", "}"),
    (">", "<"),
    (">", "]"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeToken {
    id: String,
    label: Option<String>,
}

#[derive(Debug)]
struct Connection {
    endpoints: Vec<NodeToken>,
    edges: Vec<Edge>,
}

#[derive(Debug, Default)]
struct GraphBuilder {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl GraphBuilder {
    /// Declared labels overwrite; the node keeps its first position.
    fn define(&mut self, id: &str, label: &str) {
        match self.index.get(id) {
            Some(&position) => self.nodes[position].label = label.to_string(),
            None => self.insert(id, label),
        }
    }

    fn ensure(&mut self, id: &str) {
        if !self.index.contains_key(id) {
            self.insert(id, id);
        }
    }

    fn insert(&mut self, id: &str, label: &str) {
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(Node { id: id.to_string(), label: label.to_string(), kind: NodeKind::Default });
    }
}

/// Parse graph text. Never fails: zero recognised nodes yields
/// [`GraphModel::parse_failure`].
#[instrument(target = "study_client::mindmap", skip_all, fields(len = text.len()))]
pub fn parse(text: &str) -> GraphModel {
    let statements: Vec<&str> = text.lines().flat_map(statements_of).collect();

    let mut builder = GraphBuilder::default();
    let mut connections = Vec::new();

    for statement in &statements {
        if let Some(connection) = parse_connection(statement) {
            for endpoint in &connection.endpoints {
                if let Some(label) = &endpoint.label {
                    builder.define(&endpoint.id, label);
                }
            }
            connections.push(connection);
        } else if let Some(token) = node_definition(statement) {
            builder.define(&token.id, token.label.as_deref().unwrap_or(&token.id));
        } else {
            debug!(statement, "Ignoring unrecognised line");
        }
    }

    let mut edges = Vec::new();
    for connection in connections {
        for endpoint in &connection.endpoints {
            builder.ensure(&endpoint.id);
        }
        edges.extend(connection.edges);
    }

    let mut nodes = builder.nodes;
    if nodes.is_empty() {
        warn!("No nodes could be parsed from mind map syntax");
        return GraphModel::parse_failure();
    }

    let targets: HashSet<&str> = edges.iter().map(|edge| edge.target.as_str()).collect();
    let mut root_found = false;
    for node in nodes.iter_mut() {
        if !targets.contains(node.id.as_str()) {
            node.kind = NodeKind::Main;
            root_found = true;
        }
    }
    if !root_found {
        // Every node has a parent: fall back to the first one.
        nodes[0].kind = NodeKind::Main;
    }

    debug!(nodes = nodes.len(), edges = edges.len(), "Parsed mind map");
    GraphModel { nodes, edges }
}

/// Comment-stripped, non-header statements of one line. A `;` inside a
/// quoted label does not end the statement.
fn statements_of(line: &str) -> Vec<&str> {
    let line = match line.find("%%") {
        Some(index) => &line[..index],
        None => line,
    };
    if is_header(line) {
        return Vec::new();
    }

    let mut statements = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (index, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                statements.push(&line[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    statements.push(&line[start..]);
    statements.into_iter().map(str::trim).filter(|segment| !segment.is_empty()).collect()
}

fn is_header(line: &str) -> bool {
    let first = line.split_whitespace().next().unwrap_or_default();
    first.eq_ignore_ascii_case("graph") || first.eq_ignore_ascii_case("flowchart")
}

/// A statement that is, in its entirety, one shaped node. Only consulted
/// once the statement failed to parse as a connection.
fn node_definition(statement: &str) -> Option<NodeToken> {
    parse_node_token(statement).filter(|token| token.label.is_some())
}

fn parse_connection(statement: &str) -> Option<Connection> {
    let (index, operator) = find_operator(statement)?;
    let (first_raw, mut pending_label) = split_text_label(&statement[..index]);
    let mut previous = parse_node_token(first_raw)?;

    let mut endpoints = vec![previous.clone()];
    let mut edges = Vec::new();
    let mut rest = &statement[index + operator.len()..];

    loop {
        let (pipe_label, after) = extract_pipe_label(rest);
        let label = pipe_label.or_else(|| pending_label.take()).unwrap_or_default();

        let (node, next) = match find_operator(after) {
            Some((index, operator)) => {
                let (node_raw, text_label) = split_text_label(&after[..index]);
                pending_label = text_label;
                (parse_node_token(node_raw)?, Some(&after[index + operator.len()..]))
            }
            None => (parse_node_token(after)?, None),
        };

        edges.push(Edge { source: previous.id.clone(), target: node.id.clone(), label });
        endpoints.push(node.clone());
        previous = node;

        match next {
            Some(next) => rest = next,
            None => break,
        }
    }

    Some(Connection { endpoints, edges })
}

/// Earliest operator in `statement`; ties go to the longer operator.
fn find_operator(statement: &str) -> Option<(usize, &'static str)> {
    let mut selected: Option<(usize, &'static str)> = None;
    for operator in FLOW_OPERATORS {
        if let Some(index) = find_standalone(statement, operator) {
            match selected {
                Some((best, best_operator)) if index > best || (index == best && operator.len() <= best_operator.len()) => {}
                _ => selected = Some((index, operator)),
            }
        }
    }
    selected
}

/// `--o` and `--x` only count when not followed by an identifier character,
/// so `A --only--> B` is not read as a circle edge.
fn find_standalone(statement: &str, operator: &str) -> Option<usize> {
    let needs_boundary = operator.ends_with('o') || operator.ends_with('x');
    let mut offset = 0;
    while let Some(found) = statement[offset..].find(operator) {
        let index = offset + found;
        let end = index + operator.len();
        let next = statement[end..].chars().next();
        if !needs_boundary || !next.map_or(false, is_id_char) {
            return Some(index);
        }
        offset = end;
    }
    None
}

/// Split `A -- text` into the node part and the inline edge label.
fn split_text_label(segment: &str) -> (&str, Option<String>) {
    for opener in ["--", "==", "-."] {
        if let Some(index) = segment.find(opener) {
            let node = segment[..index].trim();
            let label = clean_label(&segment[index + opener.len()..]);
            if !node.is_empty() && !label.is_empty() {
                return (node, Some(label));
            }
        }
    }
    (segment.trim(), None)
}

/// Split a leading `|label|` off the right-hand side of an operator.
fn extract_pipe_label(rhs: &str) -> (Option<String>, &str) {
    let trimmed = rhs.trim();
    let Some(after_open) = trimmed.strip_prefix('|') else {
        return (None, trimmed);
    };
    let Some(close) = after_open.find('|') else {
        return (None, trimmed);
    };
    let label = clean_label(&after_open[..close]);
    (Some(label).filter(|l| !l.is_empty()), after_open[close + 1..].trim())
}

fn parse_node_token(raw: &str) -> Option<NodeToken> {
    let trimmed = raw.trim();
    let core = trimmed.split(":::").next().unwrap_or(trimmed).trim();

    let id_len = core.find(|c: char| !is_id_char(c)).unwrap_or(core.len());
    if id_len == 0 {
        return None;
    }
    let (id, rest) = core.split_at(id_len);
    if rest.is_empty() {
        return Some(NodeToken { id: id.to_string(), label: None });
    }

    SHAPES.iter().find_map(|&(open, close)| {
        let inner = rest.strip_prefix(open)?.strip_suffix(close)?;
        let label = clean_label(inner);
        Some(NodeToken { id: id.to_string(), label: Some(if label.is_empty() { id.to_string() } else { label }) })
    })
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn clean_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim_matches('"').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(graph: &GraphModel) -> Vec<&str> {
        graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_labeled_endpoints_on_connection_line() {
        let graph = parse("A[Start] --> B[End]");
        assert_eq!(
            graph.nodes,
            vec![
                Node { id: "A".into(), label: "Start".into(), kind: NodeKind::Main },
                Node { id: "B".into(), label: "End".into(), kind: NodeKind::Default },
            ]
        );
        assert_eq!(graph.edges, vec![Edge { source: "A".into(), target: "B".into(), label: String::new() }]);
    }

    #[test]
    fn test_empty_and_garbage_input_fail() {
        for text in ["", "   \n\n", "this is not a graph at all!!", "graph TD\n%% only a comment"] {
            let graph = parse(text);
            assert!(graph.is_parse_failure(), "expected failure for {:?}", text);
            assert_eq!(graph.nodes[0].kind, NodeKind::Main);
            assert!(graph.edges.is_empty());
        }
    }

    #[test]
    fn test_cycle_marks_first_node_main() {
        let graph = parse("graph TD\nA --> B\nB --> C\nC --> A");
        assert_eq!(ids(&graph), vec!["A", "B", "C"]);
        let kinds: Vec<NodeKind> = graph.nodes.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NodeKind::Main, NodeKind::Default, NodeKind::Default]);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "flowchart LR\nroot((Topic))\nroot --> a[\"Idea one\"]\nroot -->|links| b{Choice}\nb --- c";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn test_redeclaration_updates_label_without_duplicate() {
        let graph = parse("A[First]\nA --> B\nA[Second]");
        assert_eq!(ids(&graph), vec!["A", "B"]);
        assert_eq!(graph.node("A").map(|n| n.label.as_str()), Some("Second"));
        assert_eq!(graph.node("B").map(|n| n.label.as_str()), Some("B"));
    }

    #[test]
    fn test_edge_label_forms() {
        let graph = parse("A -->|yes| B\nA -- maybe --> C\nA == strong ==> D");
        let labels: Vec<&str> = graph.edges.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["yes", "maybe", "strong"]);
        assert_eq!(graph.roots().count(), 1);
    }

    #[test]
    fn test_shapes_quotes_and_comments() {
        let text = "graph TD\nA((\"Circle\")) %% comment\nB{{Hex}}\nC>Flag<\nD(Round); E{Diamond}";
        let graph = parse(text);
        let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Circle", "Hex", "Flag", "Round", "Diamond"]);
        assert!(graph.nodes.iter().all(|n| n.kind == NodeKind::Main));
    }

    #[test]
    fn test_chained_connection_and_arrow_styles() {
        let graph = parse("A --> B -.-> C\nC ==> D\nD --o E\nE --x F\nA --only--> G");
        let pairs: Vec<(&str, &str)> = graph.edges.iter().map(|e| (e.source.as_str(), e.target.as_str())).collect();
        assert_eq!(pairs, vec![("A", "B"), ("B", "C"), ("C", "D"), ("D", "E"), ("E", "F"), ("A", "G")]);
        assert_eq!(graph.edges[5].label, "only");
    }

    #[test]
    fn test_bidirectional_arrows() {
        let graph = parse("A <--> B\nB <==> C[Third]\nC <-.-> D");
        let pairs: Vec<(&str, &str)> = graph.edges.iter().map(|e| (e.source.as_str(), e.target.as_str())).collect();
        assert_eq!(pairs, vec![("A", "B"), ("B", "C"), ("C", "D")]);
        assert_eq!(graph.node("C").map(|n| n.label.as_str()), Some("Third"));
        assert_eq!(graph.roots().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_semicolon_inside_quoted_label_is_kept() {
        let graph = parse("A[\"Step 1; Step 2\"] --> B; B --> C");
        assert_eq!(ids(&graph), vec!["A", "B", "C"]);
        assert_eq!(graph.node("A").map(|n| n.label.as_str()), Some("Step 1; Step 2"));
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_dangling_operator_is_ignored() {
        let graph = parse("A -->\nB[Real]");
        assert_eq!(ids(&graph), vec!["B"]);
    }
}
