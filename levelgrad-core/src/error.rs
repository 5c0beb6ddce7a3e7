use crate::graph::NodeId;
use thiserror::Error;

/// Custom error type for the levelgrad execution core.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum LevelGradError {
    #[error("Unknown node {id}: the graph holds {len} nodes")]
    UnknownNode { id: NodeId, len: usize },

    #[error("Stale height index: built for {indexed} nodes, graph holds {actual}")]
    StaleHeightIndex { indexed: usize, actual: usize },

    #[error("Node {node} cannot be computed: operand {operand} has no value")]
    MissingDependency { node: NodeId, operand: NodeId },

    #[error("Node {0} has no value; run a forward pass first")]
    MissingValue(NodeId),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Operator '{operation}' expects {expected} operands, got {actual}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Node {0} is an operator; only leaf values can be replaced")]
    NotALeaf(NodeId),

    #[error("Lock poisoned while accessing {0}")]
    LockPoisoned(String),

    #[error("Worker pool error: {0}")]
    ThreadPool(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
