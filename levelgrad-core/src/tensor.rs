// levelgrad-core/src/tensor.rs
use crate::error::LevelGradError;
use std::fmt;

/// Dense, contiguous, row-major `f64` tensor.
///
/// This is the value and gradient storage used by graph nodes. It only offers what the
/// execution core and the built-in kernels need: construction, shape queries, and a
/// handful of elementwise helpers. Tensors are plain owned values; sharing between
/// threads happens through the locks held by each graph node.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    /// Creates a new `Tensor` from flattened row-major data and a shape.
    ///
    /// # Errors
    /// Returns `LevelGradError::TensorCreationError` if `data.len()` does not match the
    /// number of elements described by `shape`.
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Result<Self, LevelGradError> {
        let numel: usize = shape.iter().product();
        if data.len() != numel {
            return Err(LevelGradError::TensorCreationError {
                data_len: data.len(),
                shape,
            });
        }
        Ok(Tensor { shape, data })
    }

    /// Creates a 0-dimensional tensor holding one value.
    pub fn scalar(value: f64) -> Self {
        Tensor {
            shape: vec![],
            data: vec![value],
        }
    }

    /// Creates a tensor filled with `value`.
    pub fn full(shape: Vec<usize>, value: f64) -> Self {
        let numel = shape.iter().product();
        Tensor {
            shape,
            data: vec![value; numel],
        }
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: Vec<usize>) -> Self {
        Self::full(shape, 1.0)
    }

    /// Creates an all-ones tensor with the same shape as `other`.
    pub fn ones_like(other: &Tensor) -> Self {
        Self::ones(other.shape.clone())
    }

    pub fn zeros_like(other: &Tensor) -> Self {
        Self::zeros(other.shape.clone())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// Returns the single element of a tensor with exactly one element.
    pub fn item(&self) -> Result<f64, LevelGradError> {
        if self.data.len() != 1 {
            return Err(LevelGradError::ShapeMismatch {
                expected: vec![],
                actual: self.shape.clone(),
                operation: "item".to_string(),
            });
        }
        Ok(self.data[0])
    }

    /// Overwrites every element with `value`, keeping the allocation.
    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Re-shapes the tensor in place, reusing the allocation when possible.
    /// Used by the buffer pool, which keys its free lists by element count.
    pub(crate) fn reshape_in_place(&mut self, shape: Vec<usize>) {
        let numel: usize = shape.iter().product();
        self.data.resize(numel, 0.0);
        self.shape = shape;
    }

    /// Adds `other` into `self` elementwise.
    ///
    /// # Errors
    /// Returns `LevelGradError::ShapeMismatch` if the shapes differ.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<(), LevelGradError> {
        self.check_same_shape(other, "add_assign")?;
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += *b;
        }
        Ok(())
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Combines two same-shape tensors elementwise.
    pub fn zip_map<F: Fn(f64, f64) -> f64>(
        &self,
        other: &Tensor,
        operation: &str,
        f: F,
    ) -> Result<Tensor, LevelGradError> {
        self.check_same_shape(other, operation)?;
        Ok(Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|x| x * factor)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub(crate) fn check_same_shape(
        &self,
        other: &Tensor,
        operation: &str,
    ) -> Result<(), LevelGradError> {
        if self.shape != other.shape {
            return Err(LevelGradError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: other.shape.clone(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("data", &self.data)
            .finish()
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
