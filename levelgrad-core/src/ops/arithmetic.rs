use crate::autograd::Function;
use crate::error::LevelGradError;
use crate::tensor::Tensor;

/// Checks a kernel's operand count and destructures the operands into an array.
pub(crate) fn expect_operands<'a, const N: usize>(
    name: &str,
    operands: &[&'a Tensor],
) -> Result<[&'a Tensor; N], LevelGradError> {
    <[&'a Tensor; N]>::try_from(operands).map_err(|_| LevelGradError::ArityMismatch {
        operation: name.to_string(),
        expected: N,
        actual: operands.len(),
    })
}

/// Elementwise `a + b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl Function for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn forward(&self, operands: &[&Tensor]) -> Result<Tensor, LevelGradError> {
        let [a, b] = expect_operands::<2>(self.name(), operands)?;
        a.zip_map(b, self.name(), |x, y| x + y)
    }

    fn backward(
        &self,
        _operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Option<Tensor>>, LevelGradError> {
        Ok(vec![Some(grad_output.clone()), Some(grad_output.clone())])
    }
}

/// Elementwise `a - b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sub;

impl Function for Sub {
    fn name(&self) -> &str {
        "sub"
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn forward(&self, operands: &[&Tensor]) -> Result<Tensor, LevelGradError> {
        let [a, b] = expect_operands::<2>(self.name(), operands)?;
        a.zip_map(b, self.name(), |x, y| x - y)
    }

    fn backward(
        &self,
        _operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Option<Tensor>>, LevelGradError> {
        Ok(vec![Some(grad_output.clone()), Some(grad_output.scale(-1.0))])
    }
}

/// Elementwise (Hadamard) product `a * b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mul;

impl Function for Mul {
    fn name(&self) -> &str {
        "mul"
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn forward(&self, operands: &[&Tensor]) -> Result<Tensor, LevelGradError> {
        let [a, b] = expect_operands::<2>(self.name(), operands)?;
        a.zip_map(b, self.name(), |x, y| x * y)
    }

    fn backward(
        &self,
        operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Option<Tensor>>, LevelGradError> {
        let [a, b] = expect_operands::<2>(self.name(), operands)?;
        // grad_a = grad_output * b, grad_b = grad_output * a
        let grad_a = grad_output.zip_map(b, "mul backward", |g, y| g * y)?;
        let grad_b = grad_output.zip_map(a, "mul backward", |g, x| g * x)?;
        Ok(vec![Some(grad_a), Some(grad_b)])
    }
}

/// `factor * x`: the identity scaled by a constant.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    pub factor: f64,
}

impl Function for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn forward(&self, operands: &[&Tensor]) -> Result<Tensor, LevelGradError> {
        let [x] = expect_operands::<1>(self.name(), operands)?;
        Ok(x.scale(self.factor))
    }

    fn backward(
        &self,
        _operands: &[&Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Option<Tensor>>, LevelGradError> {
        Ok(vec![Some(grad_output.scale(self.factor))])
    }
}

#[cfg(test)]
#[path = "arithmetic_test.rs"]
mod tests;
