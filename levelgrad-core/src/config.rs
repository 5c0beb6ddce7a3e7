//! Graph-level configuration.
//!
//! `GraphConfig` fixes how a graph executes by default: serial or level-parallel, how
//! many worker threads the pool holds, and whether operators are evaluated eagerly when
//! they are appended. Individual passes can still override the execution mode through
//! [`ForwardOptions`](crate::exec::ForwardOptions) and
//! [`BackwardOptions`](crate::exec::BackwardOptions).

use crate::error::LevelGradError;

/// Upper bound on worker threads accepted by [`GraphConfig::validate`].
pub const MAX_WORKER_THREADS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Run passes level-parallel on the worker pool instead of in ledger order.
    pub parallel: bool,
    /// Size of the worker pool. `0` lets rayon pick (one thread per logical CPU).
    pub num_threads: usize,
    /// Compute each operator's value as soon as it is appended.
    pub incremental_forward: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            parallel: false,
            num_threads: 0,
            incremental_forward: true,
        }
    }
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_incremental_forward(mut self, incremental_forward: bool) -> Self {
        self.incremental_forward = incremental_forward;
        self
    }

    /// Checks the configuration before a graph is built from it.
    pub fn validate(&self) -> Result<(), LevelGradError> {
        if self.num_threads > MAX_WORKER_THREADS {
            return Err(LevelGradError::InvalidConfig(format!(
                "num_threads = {} exceeds the limit of {}",
                self.num_threads, MAX_WORKER_THREADS
            )));
        }
        Ok(())
    }
}
