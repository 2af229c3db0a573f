//! Mind maps: flowchart text parsed into a [`GraphModel`] and rendered
//! through an ordered fallback chain.

pub mod model;
pub mod parser;
pub mod render;

pub use model::{Edge, GraphModel, Node, NodeKind, PARSE_FAIL_ID};
pub use parser::parse;
pub use render::{
    default_renderers, render_graph, render_with_fallback, ElementsRenderer, GraphRenderer, MindmapView,
    OutlineRenderer,
};
