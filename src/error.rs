use crate::graph::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("document contains a cycle through node {node}; flatten it before serializing")]
    CyclicDocument { node: NodeId },

    #[error("list node {node} is shared or cyclic; lists cannot carry an identity marker")]
    SharedList { node: NodeId },
}

pub type Result<T> = std::result::Result<T, GraphError>;
