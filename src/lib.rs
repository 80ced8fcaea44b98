//! Identity-aware JSON graph resolution and flattening.
//!
//! A wire encoder that preserves object identity tags the first occurrence of
//! a shared node with an identity marker (`@id` or `$id`, an integer token)
//! and every later occurrence with a reference marker (`@ref`/`$ref`, the
//! same token). After generic JSON decoding, the shared nodes arrive as
//! reference-marker stubs; this crate splices each stub back to its canonical
//! node (`resolve`) and performs the inverse rewrite before re-serialization
//! (`flatten`), so a graph with sharing or cycles survives a naive JSON
//! codec.
//!
//! Both operations run on a [`JsonGraph`], an arena of nodes addressed by
//! stable [`NodeId`]s: `serde_json::Value` alone cannot express two slots
//! holding the *same* node. Convert at the boundaries with
//! [`JsonGraph::from_value`] and [`JsonGraph::to_value`].
//!
//! # Resolving a decoded document
//!
//! ```
//! use json_graph_refs::{resolve, JsonGraph};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "@id": 1,
//!     "name": "root",
//!     "child": {"@id": 2, "name": "leaf"},
//!     "again": {"@ref": 2}
//! });
//! let mut graph = JsonGraph::from_value(&doc);
//! let report = resolve(&mut graph);
//! assert_eq!(report.resolved, 1);
//!
//! // Both slots now hold the identical node, not merely equal content.
//! let root = graph.root().unwrap();
//! assert_eq!(graph.entry(root, "child"), graph.entry(root, "again"));
//! ```
//!
//! # Flattening a cyclic graph for encoding
//!
//! ```
//! use json_graph_refs::{flatten, JsonGraph, Node};
//! use serde_json::json;
//!
//! let mut graph = JsonGraph::new();
//! let root = graph.insert(Node::empty_map());
//! graph.set_root(root);
//! let name = graph.insert(Node::String("loop".into()));
//! graph.set_entry(root, "name", name);
//! graph.set_entry(root, "me", root); // a cycle
//!
//! flatten(&mut graph).unwrap();
//! let value = graph.root_value().unwrap(); // safe for any JSON encoder now
//! assert_eq!(value["me"], json!({"@ref": 0}));
//! ```
//!
//! Resolution tolerates forward references (a `@ref` encountered before its
//! `@id` in traversal order) because it collects every identity over the
//! whole graph before splicing anything. A dangling reference is a defined
//! outcome, not an error: the slot becomes `Null` and the count is surfaced
//! on [`ResolveReport`].

pub mod error;
pub mod flatten;
pub mod graph;
pub mod marker;
pub mod resolve;

pub use error::{GraphError, Result};
pub use flatten::{flatten, flatten_with_style, FlattenReport};
pub use graph::{JsonGraph, Node, NodeId};
pub use marker::MarkerStyle;
pub use resolve::{resolve, ResolveReport};
