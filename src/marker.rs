//! Identity and reference marker keys.
//!
//! Two equivalent spellings are recognized: `@id`/`@ref` and `$id`/`$ref`.
//! A graph may mix spellings, but a pair is always matched within its own
//! spelling: `@ref: 7` resolves against `@id: 7`, never `$id: 7`.

use crate::graph::{JsonGraph, Node, NodeId};

/// Marker key spelling. Identity maps are keyed by `(MarkerStyle, token)`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MarkerStyle {
    /// `@id` / `@ref`
    At,
    /// `$id` / `$ref`
    Dollar,
}

impl MarkerStyle {
    pub const fn id_key(self) -> &'static str {
        match self {
            MarkerStyle::At => "@id",
            MarkerStyle::Dollar => "$id",
        }
    }

    pub const fn ref_key(self) -> &'static str {
        match self {
            MarkerStyle::At => "@ref",
            MarkerStyle::Dollar => "$ref",
        }
    }

    pub const fn all() -> [MarkerStyle; 2] {
        [MarkerStyle::At, MarkerStyle::Dollar]
    }
}

/// Identity marker carried by a map node, if any. First valid marker entry in
/// entry order wins; an entry whose value is not a non-negative integer is
/// not a marker. Token `0` is a legitimate token.
pub(crate) fn identity_of(graph: &JsonGraph, id: NodeId) -> Option<(MarkerStyle, u64)> {
    marker_of(graph, id, MarkerStyle::id_key)
}

/// Reference marker carried by a map node, if any. A node bearing one is a
/// stub standing in for the canonical node with the matching identity token.
pub(crate) fn reference_of(graph: &JsonGraph, id: NodeId) -> Option<(MarkerStyle, u64)> {
    marker_of(graph, id, MarkerStyle::ref_key)
}

fn marker_of(
    graph: &JsonGraph,
    id: NodeId,
    key_of: fn(MarkerStyle) -> &'static str,
) -> Option<(MarkerStyle, u64)> {
    let Node::Map(entries) = graph.node(id) else {
        return None;
    };
    for (key, child) in entries {
        for style in MarkerStyle::all() {
            if key != key_of(style) {
                continue;
            }
            if let Node::Number(n) = graph.node(*child) {
                if let Some(token) = n.as_u64() {
                    return Some((style, token));
                }
            }
        }
    }
    None
}
