use crate::error::LevelGradError;
use crate::tensor::Tensor;
use std::fmt::Debug;

/// Defines the interface of a differentiable operator kernel.
///
/// An operator node in the graph owns an `Arc<dyn Function>` together with the ids of
/// its operands. The schedulers never look inside a kernel: they hand it the operand
/// values during the forward pass and the operator's accumulated output gradient during
/// the backward pass, and take care of storing values and accumulating gradients.
///
/// Kernels are shared across the worker pool's threads.
pub trait Function: Debug + Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Number of operands the kernel expects, or `None` for variadic kernels.
    fn arity(&self) -> Option<usize> {
        None
    }

    /// Computes the output value from the operand values.
    ///
    /// `operands` is ordered exactly as the operand ids were given to
    /// [`Graph::invoke`](crate::graph::Graph::invoke).
    fn forward(&self, operands: &[&Tensor]) -> Result<Tensor, LevelGradError>;

    /// Computes the gradient contribution of this operator to each of its operands.
    ///
    /// # Arguments
    /// * `operands`: the operand values, in forward order.
    /// * `output`: the value this operator produced in the forward pass.
    /// * `grad_output`: the operator's own accumulated output gradient (dL/dOutput).
    ///
    /// # Returns
    /// One entry per operand, in forward order. `None` means the kernel has no
    /// contribution for that operand (e.g. the operand is a constant index). Each
    /// `Some` tensor must have the operand's shape; the scheduler adds it into the
    /// operand's accumulator.
    fn backward(
        &self,
        operands: &[&Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Option<Tensor>>, LevelGradError>;
}
