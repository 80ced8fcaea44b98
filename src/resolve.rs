//! Forward direction: reconstitute shared and cyclic structure from a tree
//! carrying identity and reference markers.
//!
//! Two passes over the graph, in order. The collector records every identity
//! marker before the substituter splices a single stub, which is what makes
//! forward references work: a `@ref` may appear before the `@id` it points to
//! in traversal order.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::graph::{JsonGraph, Node, NodeId};
use crate::marker::{self, MarkerStyle};

/// Diagnostic counts from a `resolve` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    /// Reference-marker stubs spliced to their canonical node.
    pub resolved: usize,
    /// Dangling references: the slot was set to `Null` instead.
    pub unresolved: usize,
    /// Identity tokens declared more than once; first occurrence won.
    pub duplicate_ids: usize,
}

/// Replace every reference-marker stub reachable from the root with the
/// canonical node its token names, in place.
///
/// A dangling token (no matching identity marker anywhere in the graph) sets
/// the parent slot to `Null` and is counted, never raised. A graph with no
/// reference markers is left untouched. A bare reference-marker root has no
/// parent slot to splice and is left as-is.
pub fn resolve(graph: &mut JsonGraph) -> ResolveReport {
    let mut report = ResolveReport::default();
    let Some(root) = graph.root() else {
        return report;
    };

    let identities = collect_identities(graph, root, &mut report);

    // A stub root cannot be replaced, but a dangling one is still worth
    // surfacing in the report.
    if let Some(key) = marker::reference_of(graph, root) {
        if !identities.contains_key(&key) {
            report.unresolved += 1;
        }
    }

    substitute(graph, root, &identities, &mut report);

    debug!(
        nodes = graph.len(),
        resolved = report.resolved,
        unresolved = report.unresolved,
        duplicate_ids = report.duplicate_ids,
        "resolved reference markers"
    );
    report
}

/// Collector pass: map every declared `(style, token)` to its canonical node.
/// First occurrence in depth-first preorder wins; later duplicates are
/// counted and ignored. Read-only.
fn collect_identities(
    graph: &JsonGraph,
    root: NodeId,
    report: &mut ResolveReport,
) -> HashMap<(MarkerStyle, u64), NodeId> {
    let mut identities = HashMap::new();
    for id in graph.preorder(root) {
        if let Some(key) = marker::identity_of(graph, id) {
            match identities.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
                Entry::Occupied(_) => report.duplicate_ids += 1,
            }
        }
    }
    identities
}

/// Substituter pass: overwrite each parent slot holding a stub with the
/// canonical id. The whole stub node is discarded, not just its marker entry.
fn substitute(
    graph: &mut JsonGraph,
    root: NodeId,
    identities: &HashMap<(MarkerStyle, u64), NodeId>,
    report: &mut ResolveReport,
) {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![root];
    seen.insert(root);

    while let Some(id) = stack.pop() {
        let children = graph.children(id);
        for (slot, child) in children.into_iter().enumerate() {
            let mut target = child;
            if let Some(key) = marker::reference_of(graph, child) {
                match identities.get(&key) {
                    Some(&canonical) => {
                        report.resolved += 1;
                        target = canonical;
                    }
                    None => {
                        report.unresolved += 1;
                        target = graph.insert(Node::Null);
                    }
                }
                graph.replace_child(id, slot, target);
            }
            if seen.insert(target) {
                stack.push(target);
            }
        }
    }
}
