use crate::autograd::Function;
use crate::error::LevelGradError;
use crate::tensor::Tensor;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Stable identifier of a node: its position in the graph's ledger.
///
/// Ids are handed out in strictly increasing creation order, and an operator may only
/// reference operands that were appended before it, so ascending id order is always a
/// valid topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the ledger.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mutable per-node storage shared by both node variants.
///
/// The value is written once per forward pass and read by every consumer, hence the
/// `RwLock`. The gradient accumulator sits behind its own `Mutex`: during a parallel
/// backward pass several sibling operators may add into the same operand at once, and
/// every contribution is summed under this lock.
#[derive(Debug)]
pub(crate) struct NodeState {
    id: NodeId,
    time_step: u64,
    requires_grad: bool,
    value: RwLock<Option<Tensor>>,
    grad: Mutex<Option<Tensor>>,
}

impl NodeState {
    pub(crate) fn new(
        id: NodeId,
        time_step: u64,
        requires_grad: bool,
        value: Option<Tensor>,
    ) -> Self {
        NodeState {
            id,
            time_step,
            requires_grad,
            value: RwLock::new(value),
            grad: Mutex::new(None),
        }
    }

    fn read_value(&self) -> Result<RwLockReadGuard<'_, Option<Tensor>>, LevelGradError> {
        self.value
            .read()
            .map_err(|_| LevelGradError::LockPoisoned(format!("value of node {}", self.id)))
    }

    fn write_value(&self) -> Result<RwLockWriteGuard<'_, Option<Tensor>>, LevelGradError> {
        self.value
            .write()
            .map_err(|_| LevelGradError::LockPoisoned(format!("value of node {}", self.id)))
    }

    fn lock_grad(&self) -> Result<MutexGuard<'_, Option<Tensor>>, LevelGradError> {
        self.grad
            .lock()
            .map_err(|_| LevelGradError::LockPoisoned(format!("gradient of node {}", self.id)))
    }
}

/// A leaf: parameter, input or constant. Its value is set at creation.
#[derive(Debug)]
pub struct LeafNode {
    pub(crate) state: NodeState,
}

/// A node produced by a differentiable [`Function`] applied to earlier nodes.
#[derive(Debug)]
pub struct OperatorNode {
    pub(crate) state: NodeState,
    pub(crate) function: Arc<dyn Function>,
    pub(crate) operands: Vec<NodeId>,
    pub(crate) height: usize,
}

/// A graph node. Structure is immutable once appended; only the value and the gradient
/// accumulator change.
#[derive(Debug)]
pub enum Node {
    Leaf(LeafNode),
    Operator(OperatorNode),
}

impl Node {
    fn state(&self) -> &NodeState {
        match self {
            Node::Leaf(leaf) => &leaf.state,
            Node::Operator(op) => &op.state,
        }
    }

    pub fn id(&self) -> NodeId {
        self.state().id
    }

    /// Sequence step the node was created in.
    pub fn time_step(&self) -> u64 {
        self.state().time_step
    }

    /// `0` for leaves, `1 + max(operand heights)` for operators.
    pub fn height(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Operator(op) => op.height,
        }
    }

    pub fn requires_grad(&self) -> bool {
        self.state().requires_grad
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Node::Operator(_))
    }

    pub fn as_operator(&self) -> Option<&OperatorNode> {
        match self {
            Node::Operator(op) => Some(op),
            Node::Leaf(_) => None,
        }
    }

    /// Returns a copy of the node's value, if one has been computed.
    pub fn value(&self) -> Result<Option<Tensor>, LevelGradError> {
        Ok(self.state().read_value()?.clone())
    }

    pub fn has_value(&self) -> Result<bool, LevelGradError> {
        Ok(self.state().read_value()?.is_some())
    }

    /// Returns a copy of the accumulated gradient, if any contribution reached the node.
    pub fn grad(&self) -> Result<Option<Tensor>, LevelGradError> {
        Ok(self.state().lock_grad()?.clone())
    }

    pub(crate) fn set_value(&self, value: Tensor) -> Result<(), LevelGradError> {
        *self.state().write_value()? = Some(value);
        Ok(())
    }

    pub(crate) fn clear_value(&self) -> Result<(), LevelGradError> {
        *self.state().write_value()? = None;
        Ok(())
    }

    pub(crate) fn zero_grad(&self) -> Result<(), LevelGradError> {
        *self.state().lock_grad()? = None;
        Ok(())
    }

    /// Adds `contribution` into the gradient accumulator.
    ///
    /// Nodes that do not require grad ignore contributions. The add happens under the
    /// node's accumulation lock, so concurrent callers never lose an update.
    ///
    /// # Errors
    /// Returns `LevelGradError::ShapeMismatch` if the contribution's shape differs from
    /// the node's value (or from the gradient already accumulated).
    pub(crate) fn accumulate_grad(&self, contribution: &Tensor) -> Result<(), LevelGradError> {
        let state = self.state();
        if !state.requires_grad {
            return Ok(());
        }
        if let Some(value) = state.read_value()?.as_ref() {
            value.check_same_shape(contribution, "accumulate_grad")?;
        }
        let mut grad = state.lock_grad()?;
        match &mut *grad {
            Some(existing) => existing.add_assign(contribution)?,
            slot @ None => *slot = Some(contribution.clone()),
        }
        Ok(())
    }
}

impl OperatorNode {
    pub fn id(&self) -> NodeId {
        self.state.id
    }

    pub fn operands(&self) -> &[NodeId] {
        &self.operands
    }

    pub fn function(&self) -> &Arc<dyn Function> {
        &self.function
    }

    /// Computes the operator's value from its operands' current values and stores it.
    ///
    /// # Errors
    /// `MissingDependency` if an operand has no value yet; kernel errors propagate as is.
    pub(crate) fn forward(&self, ledger: &[Node]) -> Result<(), LevelGradError> {
        let value = {
            let guards = read_operand_values(self.state.id, &self.operands, ledger)?;
            let operand_values = unwrap_operand_values(self.state.id, &self.operands, &guards)?;
            self.function.forward(&operand_values)?
        };
        *self.state.write_value()? = Some(value);
        Ok(())
    }

    /// Runs the kernel's backward computation and accumulates the contributions into
    /// the operands. An operator whose accumulator is still empty contributes nothing.
    ///
    /// With `stop_at_time_step`, contributions to operands tagged at or below the bound
    /// are dropped.
    pub(crate) fn backward(
        &self,
        ledger: &[Node],
        stop_at_time_step: Option<u64>,
    ) -> Result<(), LevelGradError> {
        let grad_output = match self.state.lock_grad()?.clone() {
            Some(g) => g,
            None => return Ok(()),
        };
        let contributions = {
            let output_guard = self.state.read_value()?;
            let output = output_guard
                .as_ref()
                .ok_or(LevelGradError::MissingValue(self.state.id))?;
            let guards = read_operand_values(self.state.id, &self.operands, ledger)?;
            let operand_values = unwrap_operand_values(self.state.id, &self.operands, &guards)?;
            self.function.backward(&operand_values, output, &grad_output)?
        };
        if contributions.len() != self.operands.len() {
            return Err(LevelGradError::ArityMismatch {
                operation: format!("{} backward", self.function.name()),
                expected: self.operands.len(),
                actual: contributions.len(),
            });
        }
        for (operand, contribution) in self.operands.iter().zip(contributions) {
            let operand_node = &ledger[operand.0];
            if matches!(stop_at_time_step, Some(stop) if operand_node.time_step() <= stop) {
                continue;
            }
            if let Some(g) = contribution {
                operand_node.accumulate_grad(&g)?;
            }
        }
        Ok(())
    }
}

fn read_operand_values<'a>(
    node: NodeId,
    operands: &[NodeId],
    ledger: &'a [Node],
) -> Result<Vec<RwLockReadGuard<'a, Option<Tensor>>>, LevelGradError> {
    operands
        .iter()
        .map(|operand| {
            let operand_node = ledger.get(operand.0).ok_or(LevelGradError::MissingDependency {
                node,
                operand: *operand,
            })?;
            operand_node.state().read_value()
        })
        .collect()
}

fn unwrap_operand_values<'g>(
    node: NodeId,
    operands: &[NodeId],
    guards: &'g [RwLockReadGuard<'_, Option<Tensor>>],
) -> Result<Vec<&'g Tensor>, LevelGradError> {
    operands
        .iter()
        .zip(guards.iter())
        .map(|(operand, guard)| {
            (**guard).as_ref().ok_or(LevelGradError::MissingDependency {
                node,
                operand: *operand,
            })
        })
        .collect()
}
