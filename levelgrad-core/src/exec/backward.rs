use super::worker_pool::WorkerPool;
use crate::error::LevelGradError;
use crate::graph::{Graph, Node, NodeId};
use crate::tensor::Tensor;
use log::{debug, trace, warn};

/// Where truncated backpropagation through time stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Truncation {
    /// Propagate down to the leaves.
    #[default]
    Full,
    /// Nodes with a time step `<=` this bound receive no further propagation.
    AtTimeStep(u64),
    /// Keep only the last `n` steps: stops at `graph.time_step() - n`.
    BackSteps(u64),
}

impl Truncation {
    /// Resolves the bound against the graph's current time step. Going back further
    /// than step 0 means no truncation.
    pub fn stop_at(self, current_time_step: u64) -> Option<u64> {
        match self {
            Truncation::Full => None,
            Truncation::AtTimeStep(t) => Some(t),
            Truncation::BackSteps(n) => current_time_step.checked_sub(n),
        }
    }
}

/// Options of a backward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackwardOptions {
    /// Gradient injected at the target. `None` seeds with ones shaped like its value.
    pub seed: Option<Tensor>,
    pub truncation: Truncation,
    /// Overrides `GraphConfig::parallel` for this pass.
    pub parallel: Option<bool>,
}

impl BackwardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: Tensor) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn stop_at_time_step(mut self, time_step: u64) -> Self {
        self.truncation = Truncation::AtTimeStep(time_step);
        self
    }

    /// Truncated backpropagation through the last `back_steps` time steps.
    pub fn truncate(mut self, back_steps: u64) -> Self {
        self.truncation = Truncation::BackSteps(back_steps);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }
}

struct BackwardHandler<'g> {
    graph: &'g Graph,
    target: NodeId,
    stop_at_time_step: Option<u64>,
}

impl BackwardHandler<'_> {
    fn is_truncated(&self, node: &Node) -> bool {
        matches!(self.stop_at_time_step, Some(stop) if node.time_step() <= stop)
    }

    /// Injects the seed into the target's accumulator. Without a seed, an all-ones
    /// buffer is borrowed from the graph's tensor pool and handed back when the guard
    /// goes out of scope.
    fn propagate_output_grad(&self, seed: Option<&Tensor>) -> Result<(), LevelGradError> {
        let node = self.graph.node(self.target)?;
        let value = node.value()?.ok_or(LevelGradError::MissingValue(self.target))?;
        match seed {
            Some(seed) => {
                value.check_same_shape(seed, "backward seed")?;
                node.accumulate_grad(seed)
            }
            None => {
                let ones = self.graph.tensor_pool().ones_like(&value);
                node.accumulate_grad(&ones)
            }
        }
    }

    /// Descending id order from the target, halting at the first truncated node.
    fn run_serial(&self) -> Result<usize, LevelGradError> {
        let ledger = self.graph.nodes();
        let mut visited = 0;
        for node in ledger[..=self.target.index()].iter().rev() {
            if self.is_truncated(node) {
                trace!("backward: truncated at {} (time step {})", node.id(), node.time_step());
                break;
            }
            if let Node::Operator(op) = node {
                op.backward(ledger, self.stop_at_time_step)?;
                visited += 1;
            }
        }
        Ok(visited)
    }

    /// Descending height levels from the target's level. A node may add into an operand
    /// that runs its own backward in a lower level, so each level completes before the
    /// next one starts; within a level, shared operands are summed under their locks.
    fn run_concurrent(&self, workers: &WorkerPool) -> Result<usize, LevelGradError> {
        let ledger = self.graph.nodes();
        let index = self.graph.height_index()?;
        let top = ledger[self.target.index()].height();
        let groups = index.groups();
        if top >= groups.len() || !groups[top].contains(&self.target) {
            return Err(LevelGradError::StaleHeightIndex {
                indexed: index.indexed_len(),
                actual: ledger.len(),
            });
        }
        let mut visited = 0;
        for height in (0..=top).rev() {
            let level: Vec<NodeId> = groups[height]
                .iter()
                .copied()
                .filter(|&id| {
                    let node = &ledger[id.index()];
                    id <= self.target && node.is_operator() && !self.is_truncated(node)
                })
                .collect();
            if level.is_empty() {
                continue;
            }
            trace!("backward: dispatching {} operators at height {}", level.len(), height);
            let stop = self.stop_at_time_step;
            workers.run_level(&level, |id| match &ledger[id.index()] {
                Node::Operator(op) => op.backward(ledger, stop),
                Node::Leaf(_) => Ok(()),
            })?;
            visited += level.len();
        }
        Ok(visited)
    }
}

impl Graph {
    /// Propagates the gradient of `target` back to every ancestor.
    ///
    /// The target is seeded first (see [`BackwardOptions::seed`]), then each operator
    /// with an id `<= target` passes its accumulated gradient on to its operands. Nodes
    /// created after the target never take part. With a truncation bound, nodes whose
    /// time step is at or below it neither receive contributions nor propagate; the
    /// target itself is always seeded.
    ///
    /// A target that does not require grad makes the call a no-op, and a leaf target is
    /// only seeded. Gradients add up across calls; use [`Graph::zero_grad`] to start
    /// over, since operators keep the gradient accumulated by an earlier pass.
    ///
    /// # Errors
    /// * `UnknownNode` if `target` is not in the ledger.
    /// * `MissingValue` if the target (or a visited operator) has not been computed.
    /// * `ShapeMismatch` if the seed's shape differs from the target's value.
    /// * `StaleHeightIndex` if the height index does not cover the ledger.
    /// * Any error raised by an operator kernel, unmodified.
    pub fn backward(&self, target: NodeId, options: BackwardOptions) -> Result<(), LevelGradError> {
        let _guard = self.lock_execution()?;
        let node = self.node(target)?;
        if !node.requires_grad() {
            warn!("backward: {} does not require grad, nothing to propagate", target);
            return Ok(());
        }
        let parallel = options.parallel.unwrap_or(self.config().parallel);
        let handler = BackwardHandler {
            graph: self,
            target,
            stop_at_time_step: options.truncation.stop_at(self.time_step()),
        };
        debug!(
            "backward: {} pass from {} (stop at time step {:?})",
            if parallel { "parallel" } else { "serial" },
            target,
            handler.stop_at_time_step
        );
        handler.propagate_output_grad(options.seed.as_ref())?;
        if !node.is_operator() {
            return Ok(());
        }
        let visited = if parallel {
            handler.run_concurrent(self.workers()?)?
        } else {
            handler.run_serial()?
        };
        debug!("backward: visited {} operators", visited);
        Ok(())
    }
}

#[cfg(test)]
#[path = "backward_test.rs"]
mod tests;
