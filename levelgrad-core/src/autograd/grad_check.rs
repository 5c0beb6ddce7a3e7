use crate::error::LevelGradError;
use crate::exec::{BackwardOptions, ForwardOptions};
use crate::graph::{Graph, NodeId};
use crate::tensor::Tensor;
use log::debug;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for input {input}, element index {element_index}: Analytical grad {analytical_grad:?} != Numerical grad {numerical_grad:?}. Difference: {difference:?}")]
    GradientMismatch {
        input: NodeId,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },
    #[error("Forward pass failed during gradient check: {0}")]
    ForwardPassError(LevelGradError),
    #[error("Backward pass failed during gradient check: {0}")]
    BackwardPassError(LevelGradError),
    #[error("Graph error during gradient check: {0}")]
    GraphError(LevelGradError),
    #[error("Gradient check input {input} must be a leaf node")]
    InputNotLeaf { input: NodeId },
    #[error("Input {input} requires grad but has no gradient after backward pass.")]
    MissingAnalyticalGrad { input: NodeId },
    #[error("Numerical gradient is NaN or infinite for input {input}, element {element_index}. Details: Loss+: {loss_plus:?}, Loss-: {loss_minus:?}")]
    NumericalGradNaNOrInfinite {
        input: NodeId,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },
    #[error("Analytical gradient is NaN or infinite for input {input}, element {element_index}. Value: {value:?}")]
    AnalyticalGradNaNOrInfinite {
        input: NodeId,
        element_index: usize,
        value: f64,
    },
}

impl From<LevelGradError> for GradCheckError {
    fn from(err: LevelGradError) -> Self {
        GradCheckError::GraphError(err)
    }
}

/// Checks analytical gradients against central finite differences of `sum(output)`.
///
/// See [`check_grad_with_seed`].
pub fn check_grad(
    graph: &Graph,
    output: NodeId,
    inputs: &[NodeId],
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    check_grad_with_seed(graph, output, inputs, None, epsilon, tolerance)
}

/// Checks analytical gradients against numerical gradients using finite differences.
///
/// The scalar loss is `sum(output * seed)` (or `sum(output)` without a seed), which is
/// what a backward pass from `output` seeded with `seed` differentiates. For every
/// element of every input leaf that requires grad, the leaf is nudged by `±epsilon`,
/// the graph is re-evaluated, and the central difference is compared with the gradient
/// accumulated by the backward pass. The leaves are restored afterwards.
///
/// The graph's accumulators are reset before the analytical pass.
pub fn check_grad_with_seed(
    graph: &Graph,
    output: NodeId,
    inputs: &[NodeId],
    seed: Option<&Tensor>,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    for &input in inputs {
        if graph.node(input)?.is_operator() {
            return Err(GradCheckError::InputNotLeaf { input });
        }
    }

    // --- 1. Analytical gradients ---
    graph.zero_grad()?;
    graph
        .forward(ForwardOptions::new())
        .map_err(GradCheckError::ForwardPassError)?;
    let mut backward_options = BackwardOptions::new();
    if let Some(seed) = seed {
        backward_options = backward_options.with_seed(seed.clone());
    }
    graph
        .backward(output, backward_options)
        .map_err(GradCheckError::BackwardPassError)?;

    // --- 2. Numerical gradients, element by element ---
    for &input in inputs {
        if !graph.node(input)?.requires_grad() {
            continue;
        }
        let analytical = graph
            .grad(input)?
            .ok_or(GradCheckError::MissingAnalyticalGrad { input })?;
        let original = graph
            .value(input)?
            .ok_or(LevelGradError::MissingValue(input))?;

        for element_index in 0..original.numel() {
            let loss_plus = perturbed_loss(graph, output, input, &original, element_index, epsilon, seed);
            let loss_minus = perturbed_loss(graph, output, input, &original, element_index, -epsilon, seed);
            graph.replace_value(input, original.clone())?;
            let (loss_plus, loss_minus) = (loss_plus?, loss_minus?);

            let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon);
            let analytical_grad = analytical.as_slice()[element_index];

            if !numerical_grad.is_finite() {
                return Err(GradCheckError::NumericalGradNaNOrInfinite {
                    input,
                    element_index,
                    loss_plus,
                    loss_minus,
                });
            }
            if !analytical_grad.is_finite() {
                return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
                    input,
                    element_index,
                    value: analytical_grad,
                });
            }

            let difference = (analytical_grad - numerical_grad).abs();
            if difference > tolerance && (difference / (analytical_grad.abs() + epsilon)) > tolerance {
                return Err(GradCheckError::GradientMismatch {
                    input,
                    element_index,
                    analytical_grad,
                    numerical_grad,
                    difference,
                });
            }
        }
        debug!("check_grad: input {} passed ({} elements)", input, original.numel());
    }

    // Leave the graph evaluated at the original inputs.
    graph
        .forward(ForwardOptions::new())
        .map_err(GradCheckError::ForwardPassError)?;
    Ok(())
}

fn perturbed_loss(
    graph: &Graph,
    output: NodeId,
    input: NodeId,
    original: &Tensor,
    element_index: usize,
    delta: f64,
    seed: Option<&Tensor>,
) -> Result<f64, GradCheckError> {
    let mut perturbed = original.clone();
    perturbed.as_mut_slice()[element_index] += delta;
    graph.replace_value(input, perturbed)?;
    graph
        .forward(ForwardOptions::new())
        .map_err(GradCheckError::ForwardPassError)?;
    let value = graph
        .value(output)?
        .ok_or(LevelGradError::MissingValue(output))?;
    match seed {
        Some(seed) => Ok(value.zip_map(seed, "grad_check loss", |y, s| y * s)?.sum()),
        None => Ok(value.sum()),
    }
}
