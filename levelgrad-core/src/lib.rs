//! # levelgrad-core
//!
//! Execution core of a computation-graph automatic-differentiation engine.
//!
//! A [`Graph`] is an append-only ledger of leaves and operators. [`Graph::forward`]
//! computes operator values and [`Graph::backward`] propagates the gradient of one node
//! to all of its ancestors. Both passes run either serially in ledger order or
//! level-parallel over groups of nodes of equal height, and both accept time-step
//! windows so sequence-unrolled graphs can be evaluated incrementally and trained with
//! truncated backpropagation through time.
//!
//! ```
//! use levelgrad_core::{BackwardOptions, ForwardOptions, Graph, Tensor};
//!
//! let mut g = Graph::default();
//! let a = g.new_variable(Tensor::scalar(1.0), true);
//! let b = g.scale(a, 2.0)?;
//! let c = g.scale(b, 3.0)?;
//! g.forward(ForwardOptions::new())?;
//! g.backward(c, BackwardOptions::new())?;
//! assert_eq!(g.grad(a)?.unwrap().item()?, 6.0);
//! # Ok::<(), levelgrad_core::LevelGradError>(())
//! ```

pub mod autograd;
pub mod config;
pub mod exec;
pub mod graph;
pub mod ops;
pub mod pool;
pub mod tensor;

pub mod error;
pub use error::LevelGradError;

pub use autograd::Function;
pub use config::GraphConfig;
pub use exec::{BackwardOptions, ForwardOptions, Truncation};
pub use graph::{Graph, Node, NodeId};
pub use tensor::Tensor;
