//! # Execution (`exec`)
//!
//! The forward and backward schedulers. Both offer a serial mode, which walks the
//! ledger in id order, and a level-parallel mode, which walks the graph's
//! [`HeightIndex`](crate::graph::HeightIndex) one level at a time on a fixed-size
//! [`WorkerPool`], with a full barrier between levels.
//!
//! The entry points are [`Graph::forward`](crate::graph::Graph::forward) and
//! [`Graph::backward`](crate::graph::Graph::backward).

pub mod backward;
pub mod forward;
pub mod worker_pool;

pub use backward::{BackwardOptions, Truncation};
pub use forward::ForwardOptions;
pub use worker_pool::WorkerPool;
