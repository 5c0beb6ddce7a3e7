//! # Operator kernels (`ops`)
//!
//! A small set of differentiable kernels implementing
//! [`Function`](crate::autograd::Function), plus `Graph` helpers that append them.
//! The execution core does not depend on any of them: any type implementing
//! `Function` can be passed to [`Graph::invoke`].
//!
//! - [`arithmetic`]: `Add`, `Sub`, `Mul` (elementwise product), `Scale`.
//! - [`math_elem`]: `Tanh`.
//! - [`reduction`]: `Sum`.

pub mod arithmetic;
pub mod math_elem;
pub mod reduction;

pub use arithmetic::{Add, Mul, Scale, Sub};
pub use math_elem::Tanh;
pub use reduction::Sum;

use crate::error::LevelGradError;
use crate::graph::{Graph, NodeId};
use std::sync::Arc;

impl Graph {
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, LevelGradError> {
        self.invoke(Arc::new(Add), &[a, b])
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, LevelGradError> {
        self.invoke(Arc::new(Sub), &[a, b])
    }

    /// Elementwise product.
    pub fn prod(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, LevelGradError> {
        self.invoke(Arc::new(Mul), &[a, b])
    }

    pub fn scale(&mut self, x: NodeId, factor: f64) -> Result<NodeId, LevelGradError> {
        self.invoke(Arc::new(Scale { factor }), &[x])
    }

    pub fn tanh(&mut self, x: NodeId) -> Result<NodeId, LevelGradError> {
        self.invoke(Arc::new(Tanh), &[x])
    }

    pub fn sum(&mut self, x: NodeId) -> Result<NodeId, LevelGradError> {
        self.invoke(Arc::new(Sum), &[x])
    }
}
