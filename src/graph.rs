//! Arena-backed JSON value graph.
//!
//! `serde_json::Value` is a tree: it cannot express two parent slots holding
//! the *same* child, let alone a cycle. `JsonGraph` stores every node in an
//! arena and addresses it by `NodeId`, so sharing is two slots holding the
//! same id and a cycle is a descendant slot holding an ancestor's id.
//! Boundary conversion to and from `serde_json::Value` happens only at the
//! edges (`from_value` / `to_value`); resolution and flattening operate on
//! the arena.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::{GraphError, Result};

/// Stable arena index of a node. Copyable, cheap, and valid for the life of
/// the graph that issued it; ids are never reused, even for nodes that become
/// unreachable after substitution.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single JSON node. Composite nodes hold child *ids*, not child values.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<NodeId>),
    Map(IndexMap<String, NodeId>),
}

impl Node {
    /// An empty map node, ready for `set_entry`.
    pub fn empty_map() -> Self {
        Node::Map(IndexMap::new())
    }

    /// An empty list node, ready for `push_item`.
    pub fn empty_list() -> Self {
        Node::List(Vec::new())
    }

    #[inline]
    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    #[inline]
    pub fn is_list(&self) -> bool {
        matches!(self, Node::List(_))
    }
}

/// Arena of JSON nodes plus the root id.
#[derive(Debug, Clone, Default)]
pub struct JsonGraph {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl JsonGraph {
    /// An empty graph with no root. Both `resolve` and `flatten` treat it as
    /// a no-op input.
    pub fn new() -> Self {
        JsonGraph::default()
    }

    /// Ingest a decoded JSON tree. Every composite becomes a fresh node, so
    /// reference-marker stubs arrive as ordinary maps; run `resolve` to
    /// splice them.
    pub fn from_value(value: &JsonValue) -> Self {
        let mut graph = JsonGraph::new();
        let root = graph.ingest(value);
        graph.root = Some(root);
        graph
    }

    fn ingest(&mut self, value: &JsonValue) -> NodeId {
        let root = self.insert(Node::Null);
        let mut stack = vec![(value, root)];
        while let Some((value, id)) = stack.pop() {
            let node = match value {
                JsonValue::Null => Node::Null,
                JsonValue::Bool(b) => Node::Bool(*b),
                JsonValue::Number(n) => Node::Number(n.clone()),
                JsonValue::String(s) => Node::String(s.clone()),
                JsonValue::Array(items) => {
                    let mut ids = Vec::with_capacity(items.len());
                    for item in items {
                        let child = self.insert(Node::Null);
                        ids.push(child);
                        stack.push((item, child));
                    }
                    Node::List(ids)
                }
                JsonValue::Object(entries) => {
                    let mut map = IndexMap::with_capacity(entries.len());
                    for (key, value) in entries {
                        let child = self.insert(Node::Null);
                        map.insert(key.clone(), child);
                        stack.push((value, child));
                    }
                    Node::Map(map)
                }
            };
            self.nodes[id.index()] = node;
        }
        root
    }

    /// Emit the subgraph under `id` as a plain `serde_json::Value`.
    ///
    /// Shared nodes are duplicated (a plain tree has no other way to hold
    /// them); a cycle still reachable from `id` fails with
    /// [`GraphError::CyclicDocument`]. Unconditionally safe after `flatten`.
    pub fn to_value(&self, id: NodeId) -> Result<JsonValue> {
        enum Frame {
            List {
                id: NodeId,
                children: std::vec::IntoIter<NodeId>,
                items: Vec<JsonValue>,
            },
            Map {
                id: NodeId,
                entries: std::vec::IntoIter<(String, NodeId)>,
                current_key: Option<String>,
                out: serde_json::Map<String, JsonValue>,
            },
        }

        let mut on_path = vec![false; self.nodes.len()];
        let mut frames: Vec<Frame> = Vec::new();
        let mut finished: Option<JsonValue> = None;
        let mut next = Some(id);

        loop {
            if let Some(id) = next.take() {
                match self.node(id) {
                    Node::Null => finished = Some(JsonValue::Null),
                    Node::Bool(b) => finished = Some(JsonValue::Bool(*b)),
                    Node::Number(n) => finished = Some(JsonValue::Number(n.clone())),
                    Node::String(s) => finished = Some(JsonValue::String(s.clone())),
                    Node::List(items) => {
                        if on_path[id.index()] {
                            return Err(GraphError::CyclicDocument { node: id });
                        }
                        on_path[id.index()] = true;
                        frames.push(Frame::List {
                            id,
                            children: items.clone().into_iter(),
                            items: Vec::with_capacity(items.len()),
                        });
                    }
                    Node::Map(map) => {
                        if on_path[id.index()] {
                            return Err(GraphError::CyclicDocument { node: id });
                        }
                        on_path[id.index()] = true;
                        let entries: Vec<(String, NodeId)> =
                            map.iter().map(|(k, v)| (k.clone(), *v)).collect();
                        frames.push(Frame::Map {
                            id,
                            entries: entries.into_iter(),
                            current_key: None,
                            out: serde_json::Map::new(),
                        });
                    }
                }
            }

            loop {
                match frames.last_mut() {
                    None => return Ok(finished.take().unwrap_or(JsonValue::Null)),
                    Some(Frame::List {
                        id,
                        children,
                        items,
                    }) => {
                        if let Some(value) = finished.take() {
                            items.push(value);
                        }
                        if let Some(child) = children.next() {
                            next = Some(child);
                            break;
                        }
                        let done = std::mem::take(items);
                        on_path[id.index()] = false;
                        frames.pop();
                        finished = Some(JsonValue::Array(done));
                    }
                    Some(Frame::Map {
                        id,
                        entries,
                        current_key,
                        out,
                    }) => {
                        if let Some(value) = finished.take() {
                            if let Some(key) = current_key.take() {
                                out.insert(key, value);
                            }
                        }
                        if let Some((key, child)) = entries.next() {
                            *current_key = Some(key);
                            next = Some(child);
                            break;
                        }
                        let done = std::mem::take(out);
                        on_path[id.index()] = false;
                        frames.pop();
                        finished = Some(JsonValue::Object(done));
                    }
                }
            }
        }
    }

    /// Emit the whole document from the root. `Null` for an empty graph.
    pub fn root_value(&self) -> Result<JsonValue> {
        match self.root {
            Some(root) => self.to_value(root),
            None => Ok(JsonValue::Null),
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of arena slots, including nodes detached by substitution.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node to the arena and return its id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        debug_assert!(self.nodes.len() < u32::MAX as usize);
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different graph.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutably borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different graph.
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Child id under `key`, if `map` is a map node with that entry.
    pub fn entry(&self, map: NodeId, key: &str) -> Option<NodeId> {
        match self.node(map) {
            Node::Map(entries) => entries.get(key).copied(),
            _ => None,
        }
    }

    /// Child id at `index`, if `list` is a list node that long.
    pub fn item(&self, list: NodeId, index: usize) -> Option<NodeId> {
        match self.node(list) {
            Node::List(items) => items.get(index).copied(),
            _ => None,
        }
    }

    /// Set (or append) a map entry.
    ///
    /// # Panics
    ///
    /// Panics if `map` is not a map node.
    pub fn set_entry(&mut self, map: NodeId, key: impl Into<String>, child: NodeId) {
        match self.node_mut(map) {
            Node::Map(entries) => {
                entries.insert(key.into(), child);
            }
            other => panic!("set_entry on non-map node {map}: {other:?}"),
        }
    }

    /// Append a list item.
    ///
    /// # Panics
    ///
    /// Panics if `list` is not a list node.
    pub fn push_item(&mut self, list: NodeId, child: NodeId) {
        match self.node_mut(list) {
            Node::List(items) => items.push(child),
            other => panic!("push_item on non-list node {list}: {other:?}"),
        }
    }

    /// Child ids of a composite node, in slot order. Empty for scalars.
    pub(crate) fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            Node::List(items) => items.clone(),
            Node::Map(entries) => entries.values().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Overwrite one child slot of a composite node. Slot numbering follows
    /// `children`: list index, or map entry position.
    pub(crate) fn replace_child(&mut self, parent: NodeId, slot: usize, child: NodeId) {
        match self.node_mut(parent) {
            Node::List(items) => {
                if let Some(item) = items.get_mut(slot) {
                    *item = child;
                }
            }
            Node::Map(entries) => {
                if let Some((_, value)) = entries.get_index_mut(slot) {
                    *value = child;
                }
            }
            _ => {}
        }
    }

    /// Depth-first preorder over the nodes reachable from `root`, visiting
    /// each node once even in the presence of sharing or cycles.
    pub(crate) fn preorder(&self, root: NodeId) -> Preorder<'_> {
        Preorder {
            graph: self,
            stack: vec![root],
            seen: HashSet::new(),
        }
    }
}

pub(crate) struct Preorder<'g> {
    graph: &'g JsonGraph,
    stack: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            if !self.seen.insert(id) {
                continue;
            }
            let mut children = self.graph.children(id);
            children.reverse();
            self.stack.extend(children);
            return Some(id);
        }
        None
    }
}
