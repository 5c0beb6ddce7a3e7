use crate::error::LevelGradError;
use crate::graph::NodeId;
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Fixed-size pool of worker threads running one height level at a time.
///
/// A level is dispatched with [`WorkerPool::run_level`], which only returns once every
/// unit of the level has finished. That return is the level barrier: nothing of the next
/// level is started before it.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Builds a pool of `num_threads` workers (`0` lets rayon pick the size).
    pub fn new(num_threads: usize) -> Result<Self, LevelGradError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("levelgrad-worker-{}", i))
            .build()
            .map_err(|e| LevelGradError::ThreadPool(e.to_string()))?;
        debug!("WorkerPool: started {} worker threads", pool.current_num_threads());
        Ok(WorkerPool { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `task` once for every id of a level and waits for all of them.
    ///
    /// The first error stops the dispatch of units that have not started yet; units
    /// already running complete before the error is returned.
    pub fn run_level<F>(&self, level: &[NodeId], task: F) -> Result<(), LevelGradError>
    where
        F: Fn(NodeId) -> Result<(), LevelGradError> + Send + Sync,
    {
        self.pool
            .install(|| level.par_iter().try_for_each(|&id| task(id)))
    }
}
