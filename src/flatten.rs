//! Reverse direction: rewrite a live (possibly cyclic) graph so every node is
//! visited at most once, with every repeat occurrence replaced by a
//! reference-marker stub. The result is a tree a naive JSON encoder can
//! serialize without duplication or infinite recursion.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::graph::{JsonGraph, Node, NodeId};
use crate::marker::{self, MarkerStyle};

/// Diagnostic counts from a `flatten` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlattenReport {
    /// Repeat occurrences replaced by reference-marker stubs.
    pub stubs: usize,
    /// Identity markers materialized on canonical nodes that had none.
    pub fresh_ids: usize,
}

/// Flatten with `@id`/`@ref` markers for freshly assigned tokens.
pub fn flatten(graph: &mut JsonGraph) -> Result<FlattenReport> {
    flatten_with_style(graph, MarkerStyle::At)
}

/// Rewrite the graph in place so every map node reachable from the root
/// appears in full exactly once; each later occurrence becomes a stub
/// `{ref_key: token}` in its parent slot, in depth-first preorder.
///
/// A node already carrying an identity marker keeps its token and spelling;
/// fresh tokens use `style` and never collide with carried tokens. Markers
/// are only materialized on nodes that are actually repeated, so a tree with
/// no sharing is left untouched. A shared or cyclic *list* cannot carry an
/// identity marker and fails with [`GraphError::SharedList`].
pub fn flatten_with_style(graph: &mut JsonGraph, style: MarkerStyle) -> Result<FlattenReport> {
    let Some(root) = graph.root() else {
        return Ok(FlattenReport::default());
    };

    let mut flattener = Flattener {
        // Seed fresh tokens above anything the graph already carries.
        next_token: max_carried_token(graph, root).map_or(0, |t| t + 1),
        graph: &mut *graph,
        style,
        visited_maps: HashMap::new(),
        visited_lists: HashSet::new(),
        stack: Vec::new(),
        report: FlattenReport::default(),
    };
    let report = flattener.run(root)?;

    debug!(
        nodes = graph.len(),
        stubs = report.stubs,
        fresh_ids = report.fresh_ids,
        "flattened shared structure"
    );
    Ok(report)
}

struct Flattener<'g> {
    graph: &'g mut JsonGraph,
    style: MarkerStyle,
    next_token: u64,
    /// Visited map keyed by arena id: reference identity, not value equality.
    visited_maps: HashMap<NodeId, (MarkerStyle, u64)>,
    visited_lists: HashSet<NodeId>,
    /// (parent, slot, child) pushed in reverse slot order, so pops run in
    /// depth-first preorder.
    stack: Vec<(NodeId, usize, NodeId)>,
    report: FlattenReport,
}

impl Flattener<'_> {
    fn run(&mut self, root: NodeId) -> Result<FlattenReport> {
        self.first_visit(root)?;
        while let Some((parent, slot, child)) = self.stack.pop() {
            match self.visited_maps.get(&child) {
                Some(&(style, token)) => self.stub_out(parent, slot, child, style, token),
                None => self.first_visit(child)?,
            }
        }
        Ok(self.report)
    }

    /// Record a node as visited and queue its composite child slots. A map
    /// keeps its carried token or is assigned the next fresh one; a list is
    /// only tracked for repeat detection, since a repeat list is
    /// unrepresentable.
    fn first_visit(&mut self, id: NodeId) -> Result<()> {
        match self.graph.node(id) {
            Node::Map(_) => {
                let key = match marker::identity_of(self.graph, id) {
                    Some(carried) => carried,
                    None => {
                        let token = self.next_token;
                        self.next_token += 1;
                        (self.style, token)
                    }
                };
                self.visited_maps.insert(id, key);
            }
            Node::List(_) => {
                if !self.visited_lists.insert(id) {
                    return Err(GraphError::SharedList { node: id });
                }
            }
            _ => return Ok(()),
        }

        let children = self.graph.children(id);
        for (slot, child) in children.into_iter().enumerate().rev() {
            if self.graph.node(child).is_map() || self.graph.node(child).is_list() {
                self.stack.push((id, slot, child));
            }
        }
        Ok(())
    }

    /// Repeat visit: make sure the canonical occurrence carries its token,
    /// then stand a stub into the parent slot. No descent.
    fn stub_out(&mut self, parent: NodeId, slot: usize, child: NodeId, style: MarkerStyle, token: u64) {
        if marker::identity_of(self.graph, child).is_none() {
            let token_node = self.graph.insert(Node::Number(token.into()));
            self.graph.set_entry(child, style.id_key(), token_node);
            self.report.fresh_ids += 1;
        }
        let token_node = self.graph.insert(Node::Number(token.into()));
        let mut entries = IndexMap::with_capacity(1);
        entries.insert(style.ref_key().to_string(), token_node);
        let stub = self.graph.insert(Node::Map(entries));
        self.graph.replace_child(parent, slot, stub);
        self.report.stubs += 1;
    }
}

/// Highest identity token already carried anywhere in the graph, regardless
/// of spelling.
fn max_carried_token(graph: &JsonGraph, root: NodeId) -> Option<u64> {
    graph
        .preorder(root)
        .filter_map(|id| marker::identity_of(graph, id))
        .map(|(_, token)| token)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use serde_json::json;

    /// Root map with two slots holding the same child map.
    fn diamond() -> JsonGraph {
        let mut graph = JsonGraph::new();
        let root = graph.insert(Node::empty_map());
        graph.set_root(root);
        let leaf = graph.insert(Node::empty_map());
        let name = graph.insert(Node::String("leaf".into()));
        graph.set_entry(leaf, "name", name);
        graph.set_entry(root, "child", leaf);
        graph.set_entry(root, "again", leaf);
        graph
    }

    #[test]
    fn test_sharing_collapses_to_one_occurrence() {
        let mut graph = diamond();
        let report = flatten(&mut graph).unwrap();
        assert_eq!(report.stubs, 1);
        assert_eq!(report.fresh_ids, 1);

        let value = graph.root_value().unwrap();
        let token = &value["child"]["@id"];
        assert!(token.is_u64());
        assert_eq!(value["again"], json!({"@ref": token.as_u64().unwrap()}));
        assert_eq!(value["child"]["name"], json!("leaf"));
    }

    #[test]
    fn test_unshared_tree_is_untouched() {
        let doc = json!({"a": {"x": 1}, "b": [true, null]});
        let mut graph = JsonGraph::from_value(&doc);
        let report = flatten(&mut graph).unwrap();
        assert_eq!(report, FlattenReport::default());
        assert_eq!(graph.root_value().unwrap(), doc);
    }

    #[test]
    fn test_cycle_terminates_with_stub() {
        let mut graph = JsonGraph::new();
        let root = graph.insert(Node::empty_map());
        graph.set_root(root);
        graph.set_entry(root, "me", root);

        let report = flatten(&mut graph).unwrap();
        assert_eq!(report.stubs, 1);

        // safe for a naive encoder now
        let value = graph.root_value().unwrap();
        assert_eq!(value["me"]["@ref"], value["@id"]);
    }

    #[test]
    fn test_carried_token_is_reused() {
        let mut graph = JsonGraph::from_value(&json!({"@id": 17, "name": "n"}));
        let root = graph.root().unwrap();
        let outer = graph.insert(Node::empty_map());
        graph.set_entry(outer, "a", root);
        graph.set_entry(outer, "b", root);
        graph.set_root(outer);

        let report = flatten(&mut graph).unwrap();
        assert_eq!(report.stubs, 1);
        assert_eq!(report.fresh_ids, 0, "node already carried its token");

        let value = graph.root_value().unwrap();
        assert_eq!(value["a"], json!({"@id": 17, "name": "n"}));
        assert_eq!(value["b"], json!({"@ref": 17}));
    }

    #[test]
    fn test_dollar_carried_token_stubs_in_dollar() {
        let mut graph = JsonGraph::from_value(&json!({"$id": 3}));
        let root = graph.root().unwrap();
        let outer = graph.insert(Node::empty_map());
        graph.set_entry(outer, "a", root);
        graph.set_entry(outer, "b", root);
        graph.set_root(outer);

        flatten(&mut graph).unwrap();
        let value = graph.root_value().unwrap();
        assert_eq!(value["b"], json!({"$ref": 3}));
    }

    #[test]
    fn test_fresh_tokens_avoid_carried_ones() {
        let mut graph = JsonGraph::new();
        let outer = graph.insert(Node::empty_map());
        graph.set_root(outer);
        let forty = graph.insert(Node::Number(40u64.into()));
        let carried_root = graph.insert(Node::empty_map());
        graph.set_entry(carried_root, "@id", forty);
        let plain = graph.insert(Node::empty_map());
        graph.set_entry(outer, "tagged", carried_root);
        graph.set_entry(outer, "p1", plain);
        graph.set_entry(outer, "p2", plain);

        flatten(&mut graph).unwrap();
        let value = graph.root_value().unwrap();
        let fresh = value["p1"]["@id"].as_u64().unwrap();
        assert!(fresh > 40, "fresh token {fresh} must not collide");
        assert_eq!(value["p2"], json!({"@ref": fresh}));
    }

    #[test]
    fn test_shared_list_is_an_error() {
        let mut graph = JsonGraph::new();
        let root = graph.insert(Node::empty_map());
        graph.set_root(root);
        let list = graph.insert(Node::empty_list());
        graph.set_entry(root, "a", list);
        graph.set_entry(root, "b", list);

        assert_eq!(
            flatten(&mut graph),
            Err(GraphError::SharedList { node: list })
        );
    }

    #[test]
    fn test_flatten_then_resolve_restores_sharing() {
        let mut graph = diamond();
        let root = graph.root().unwrap();
        let leaf = graph.entry(root, "child").unwrap();

        flatten(&mut graph).unwrap();
        let report = resolve(&mut graph);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.unresolved, 0);

        assert_eq!(graph.entry(root, "child"), Some(leaf));
        assert_eq!(graph.entry(root, "again"), Some(leaf));
    }

    #[test]
    fn test_empty_graph_is_a_noop() {
        let mut graph = JsonGraph::new();
        assert_eq!(flatten(&mut graph).unwrap(), FlattenReport::default());
    }
}
