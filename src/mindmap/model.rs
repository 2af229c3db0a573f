use serde::Serialize;

/// Id of the synthetic node returned when nothing could be parsed.
pub const PARSE_FAIL_ID: &str = "parse_fail";
pub const PARSE_FAIL_LABEL: &str = "Parsing Failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A root of the map.
    Main,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Empty when the connection carries no label.
    pub label: String,
}

/// Nodes in first-seen order plus edges in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphModel {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphModel {
    /// The sentinel graph for unparseable input. Not a valid empty graph.
    pub fn parse_failure() -> Self {
        Self {
            nodes: vec![Node {
                id: PARSE_FAIL_ID.to_string(),
                label: PARSE_FAIL_LABEL.to_string(),
                kind: NodeKind::Main,
            }],
            edges: Vec::new(),
        }
    }

    pub fn is_parse_failure(&self) -> bool {
        self.edges.is_empty() && self.nodes.len() == 1 && self.nodes[0].id == PARSE_FAIL_ID
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.kind == NodeKind::Main)
    }

    /// Outgoing edges of `id`, in source order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == id)
    }
}
