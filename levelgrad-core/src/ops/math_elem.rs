use super::arithmetic::expect_operands;
use crate::autograd::Function;
use crate::error::LevelGradError;
use crate::tensor::Tensor;

/// Elementwise hyperbolic tangent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Function for Tanh {
    fn name(&self) -> &str {
        "tanh"
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn forward(&self, operands: &[&Tensor]) -> Result<Tensor, LevelGradError> {
        let [x] = expect_operands::<1>(self.name(), operands)?;
        Ok(x.map(f64::tanh))
    }

    /// d/dx tanh(x) = 1 - tanh(x)^2, computed from the stored output.
    fn backward(
        &self,
        _operands: &[&Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Option<Tensor>>, LevelGradError> {
        let grad = grad_output.zip_map(output, "tanh backward", |g, y| g * (1.0 - y * y))?;
        Ok(vec![Some(grad)])
    }
}
