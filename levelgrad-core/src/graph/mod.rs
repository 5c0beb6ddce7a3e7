//! # Computation graph (`graph`)
//!
//! The [`Graph`] is an append-only ledger of [`Node`]s. A node's id is its position in the
//! ledger, and an operator may only reference nodes appended before it, so id order is a
//! topological order. Each operator records its height when it is appended; the
//! [`HeightIndex`] that groups nodes by height is cached and rebuilt lazily after the
//! ledger changes.
//!
//! Structure is only mutated through `&mut Graph`; forward and backward passes take
//! `&Graph` and only touch node values and gradient accumulators, which live behind
//! per-node locks.

pub mod height;
pub mod node;

pub use height::HeightIndex;
pub use node::{LeafNode, Node, NodeId, OperatorNode};

use crate::autograd::Function;
use crate::config::GraphConfig;
use crate::error::LevelGradError;
use crate::exec::WorkerPool;
use crate::pool::TensorPool;
use crate::tensor::Tensor;
use log::{debug, trace};
use node::NodeState;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    height_index: OnceLock<HeightIndex>,
    time_step: u64,
    config: GraphConfig,
    workers: OnceLock<Result<WorkerPool, LevelGradError>>,
    tensor_pool: TensorPool,
    /// Serializes forward and backward passes over this graph.
    exec_lock: Mutex<()>,
}

impl Default for Graph {
    fn default() -> Self {
        Graph::from_valid_config(GraphConfig::default())
    }
}

impl Graph {
    /// Creates an empty graph.
    ///
    /// # Errors
    /// Returns `LevelGradError::InvalidConfig` if `config` does not validate.
    pub fn new(config: GraphConfig) -> Result<Self, LevelGradError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: GraphConfig) -> Self {
        Graph {
            nodes: Vec::new(),
            height_index: OnceLock::new(),
            time_step: 0,
            config,
            workers: OnceLock::new(),
            tensor_pool: TensorPool::new(),
            exec_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Looks up a node by id.
    ///
    /// # Errors
    /// Returns `LevelGradError::UnknownNode` if `id` is not in the ledger.
    pub fn node(&self, id: NodeId) -> Result<&Node, LevelGradError> {
        self.nodes.get(id.0).ok_or(LevelGradError::UnknownNode {
            id,
            len: self.nodes.len(),
        })
    }

    /// The time step new nodes are tagged with.
    pub fn time_step(&self) -> u64 {
        self.time_step
    }

    /// Advances the graph to the next sequence step. Nodes appended afterwards carry the
    /// new time step, so time steps never decrease along the ledger.
    pub fn inc_time_step(&mut self) -> u64 {
        self.time_step += 1;
        self.time_step
    }

    /// Appends a leaf holding `value`.
    pub fn new_variable(&mut self, value: Tensor, requires_grad: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        let state = NodeState::new(id, self.time_step, requires_grad, Some(value));
        self.append(Node::Leaf(LeafNode { state }))
    }

    /// Appends a constant scalar leaf that does not require grad.
    pub fn new_scalar(&mut self, value: f64) -> NodeId {
        self.new_variable(Tensor::scalar(value), false)
    }

    /// Appends an operator applying `function` to `operands`.
    ///
    /// The operator requires grad iff one of its operands does. With
    /// `incremental_forward` enabled, its value is computed before it is appended; a
    /// kernel error then leaves the ledger unchanged.
    ///
    /// # Errors
    /// * `UnknownNode` if an operand id is not in the ledger.
    /// * `ArityMismatch` if the kernel declares a different operand count.
    /// * Any error of the kernel's forward computation (incremental mode only).
    pub fn invoke(
        &mut self,
        function: Arc<dyn Function>,
        operands: &[NodeId],
    ) -> Result<NodeId, LevelGradError> {
        if let Some(expected) = function.arity() {
            if expected != operands.len() {
                return Err(LevelGradError::ArityMismatch {
                    operation: function.name().to_string(),
                    expected,
                    actual: operands.len(),
                });
            }
        }
        let mut operand_heights = Vec::with_capacity(operands.len());
        let mut requires_grad = false;
        for &operand in operands {
            let node = self.node(operand)?;
            operand_heights.push(node.height());
            requires_grad |= node.requires_grad();
        }

        let id = NodeId(self.nodes.len());
        let op = OperatorNode {
            state: NodeState::new(id, self.time_step, requires_grad, None),
            function,
            operands: operands.to_vec(),
            height: height::operator_height(operand_heights),
        };
        if self.config.incremental_forward {
            op.forward(&self.nodes)?;
        }
        trace!(
            "Graph: appending {} '{}' at height {} (time step {})",
            id,
            op.function.name(),
            op.height,
            self.time_step
        );
        Ok(self.append(Node::Operator(op)))
    }

    fn append(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.push(node);
        self.height_index.take();
        id
    }

    /// Returns the height-grouped view of the ledger, rebuilding it if an append
    /// invalidated the cache.
    pub fn height_index(&self) -> Result<&HeightIndex, LevelGradError> {
        let index = self.height_index.get_or_init(|| {
            debug!("Graph: rebuilding height index over {} nodes", self.nodes.len());
            HeightIndex::build(&self.nodes)
        });
        index.ensure_fresh(self.nodes.len())?;
        Ok(index)
    }

    pub fn value(&self, id: NodeId) -> Result<Option<Tensor>, LevelGradError> {
        self.node(id)?.value()
    }

    pub fn grad(&self, id: NodeId) -> Result<Option<Tensor>, LevelGradError> {
        self.node(id)?.grad()
    }

    pub fn height(&self, id: NodeId) -> Result<usize, LevelGradError> {
        Ok(self.node(id)?.height())
    }

    pub fn time_step_of(&self, id: NodeId) -> Result<u64, LevelGradError> {
        Ok(self.node(id)?.time_step())
    }

    /// Replaces the value of a leaf, e.g. to feed the next input of a sequence.
    ///
    /// # Errors
    /// * `NotALeaf` if `id` is an operator.
    /// * `ShapeMismatch` if the new value changes the leaf's shape.
    pub fn replace_value(&self, id: NodeId, value: Tensor) -> Result<(), LevelGradError> {
        let _guard = self.lock_execution()?;
        let node = self.node(id)?;
        if node.is_operator() {
            return Err(LevelGradError::NotALeaf(id));
        }
        if let Some(old) = node.value()? {
            old.check_same_shape(&value, "replace_value")?;
        }
        node.set_value(value)
    }

    /// Empties every gradient accumulator.
    pub fn zero_grad(&self) -> Result<(), LevelGradError> {
        let _guard = self.lock_execution()?;
        for node in &self.nodes {
            node.zero_grad()?;
        }
        Ok(())
    }

    /// Drops every operator value while keeping the graph structure, so the same graph
    /// can be re-evaluated with new leaf values. Accumulated gradients are dropped too.
    pub fn clear_values(&self) -> Result<(), LevelGradError> {
        let _guard = self.lock_execution()?;
        for node in &self.nodes {
            if node.is_operator() {
                node.clear_value()?;
            }
            node.zero_grad()?;
        }
        Ok(())
    }

    pub fn tensor_pool(&self) -> &TensorPool {
        &self.tensor_pool
    }

    /// The worker pool used by parallel passes, built on first use.
    pub(crate) fn workers(&self) -> Result<&WorkerPool, LevelGradError> {
        self.workers
            .get_or_init(|| WorkerPool::new(self.config.num_threads))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub(crate) fn lock_execution(&self) -> Result<MutexGuard<'_, ()>, LevelGradError> {
        self.exec_lock
            .lock()
            .map_err(|_| LevelGradError::LockPoisoned("graph execution lock".to_string()))
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
