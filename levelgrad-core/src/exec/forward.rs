use super::worker_pool::WorkerPool;
use crate::error::LevelGradError;
use crate::graph::{Graph, Node, NodeId};
use log::{debug, trace};

/// Options of a forward pass.
///
/// By default every operator is evaluated. A time-step window restricts the pass to the
/// operators tagged with a step inside `[from_time_step, to_time_step]`, which lets a
/// growing sequence graph evaluate only its newest steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardOptions {
    pub from_time_step: u64,
    /// Inclusive upper bound; `None` means unbounded.
    pub to_time_step: Option<u64>,
    /// Overrides `GraphConfig::parallel` for this pass.
    pub parallel: Option<bool>,
}

impl ForwardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_time_step(mut self, time_step: u64) -> Self {
        self.from_time_step = time_step;
        self
    }

    pub fn to_time_step(mut self, time_step: u64) -> Self {
        self.to_time_step = Some(time_step);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }
}

struct ForwardHandler<'g> {
    graph: &'g Graph,
    from_time_step: u64,
    to_time_step: Option<u64>,
}

impl ForwardHandler<'_> {
    fn in_range(&self, node: &Node) -> bool {
        let ts = node.time_step();
        if ts < self.from_time_step {
            return false;
        }
        !matches!(self.to_time_step, Some(to) if ts > to)
    }

    /// Ascending id order is topological: every operand is computed before its consumers.
    fn run_serial(&self) -> Result<usize, LevelGradError> {
        let ledger = self.graph.nodes();
        let mut computed = 0;
        for node in ledger {
            if let Node::Operator(op) = node {
                if !self.in_range(node) {
                    continue;
                }
                trace!("forward: computing {} '{}'", op.id(), op.function().name());
                op.forward(ledger)?;
                computed += 1;
            }
        }
        Ok(computed)
    }

    /// Every operand of a node in level `h` sits in a lower level, which has been
    /// completed by an earlier `run_level`.
    fn run_concurrent(&self, workers: &WorkerPool) -> Result<usize, LevelGradError> {
        let ledger = self.graph.nodes();
        let index = self.graph.height_index()?;
        let mut computed = 0;
        for (height, group) in index.groups().iter().enumerate() {
            let level: Vec<NodeId> = group
                .iter()
                .copied()
                .filter(|id| {
                    let node = &ledger[id.index()];
                    node.is_operator() && self.in_range(node)
                })
                .collect();
            if level.is_empty() {
                continue;
            }
            trace!("forward: dispatching {} operators at height {}", level.len(), height);
            workers.run_level(&level, |id| match &ledger[id.index()] {
                Node::Operator(op) => op.forward(ledger),
                Node::Leaf(_) => Ok(()),
            })?;
            computed += level.len();
        }
        Ok(computed)
    }
}

impl Graph {
    /// Computes the value of every operator inside the options' time-step window.
    ///
    /// Leaves already hold their values. A window that matches no operator is a no-op.
    ///
    /// # Errors
    /// * `MissingDependency` if an operator's operand has no value, e.g. because the
    ///   window excluded it and it was never computed.
    /// * Any error raised by an operator kernel, unmodified.
    pub fn forward(&self, options: ForwardOptions) -> Result<(), LevelGradError> {
        let _guard = self.lock_execution()?;
        let parallel = options.parallel.unwrap_or(self.config().parallel);
        let handler = ForwardHandler {
            graph: self,
            from_time_step: options.from_time_step,
            to_time_step: options.to_time_step,
        };
        debug!(
            "forward: {} pass over {} nodes, time steps [{}, {:?}]",
            if parallel { "parallel" } else { "serial" },
            self.len(),
            options.from_time_step,
            options.to_time_step
        );
        let computed = if parallel {
            handler.run_concurrent(self.workers()?)?
        } else {
            handler.run_serial()?
        };
        debug!("forward: computed {} operators", computed);
        Ok(())
    }
}

#[cfg(test)]
#[path = "forward_test.rs"]
mod tests;
