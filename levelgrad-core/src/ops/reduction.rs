use super::arithmetic::expect_operands;
use crate::autograd::Function;
use crate::error::LevelGradError;
use crate::tensor::Tensor;

/// Sum of all elements, producing a scalar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Function for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn forward(&self, operands: &[&Tensor]) -> Result<Tensor, LevelGradError> {
        let [x] = expect_operands::<1>(self.name(), operands)?;
        Ok(Tensor::scalar(x.sum()))
    }

    /// Broadcasts the scalar output gradient back to the operand's shape.
    fn backward(
        &self,
        operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Option<Tensor>>, LevelGradError> {
        let [x] = expect_operands::<1>(self.name(), operands)?;
        let g = grad_output.item()?;
        Ok(vec![Some(Tensor::full(x.shape().to_vec(), g))])
    }
}
