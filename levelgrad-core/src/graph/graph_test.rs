use super::*;
use crate::exec::{BackwardOptions, ForwardOptions};
use crate::ops::Scale;
use approx::assert_relative_eq;

fn lazy_graph() -> Graph {
    Graph::new(GraphConfig::new().with_incremental_forward(false)).unwrap()
}

#[test]
fn test_ids_follow_insertion_order() {
    let mut g = Graph::default();
    let a = g.new_scalar(1.0);
    let b = g.new_variable(Tensor::ones(vec![2]), true);
    let c = g.scale(b, 2.0).unwrap();
    assert_eq!(a.index(), 0);
    assert_eq!(b.index(), 1);
    assert_eq!(c.index(), 2);
    assert_eq!(g.len(), 3);
    assert!(!g.is_empty());
    assert_eq!(g.node(c).unwrap().id(), c);
}

#[test]
fn test_unknown_node() {
    let mut g = Graph::default();
    let a = g.new_scalar(1.0);
    let missing = NodeId(7);
    assert_eq!(
        g.node(missing).unwrap_err(),
        LevelGradError::UnknownNode { id: missing, len: 1 }
    );
    assert!(matches!(
        g.add(a, missing),
        Err(LevelGradError::UnknownNode { .. })
    ));
    assert_eq!(g.len(), 1, "failed invoke must not append");
}

#[test]
fn test_invoke_checks_arity() {
    let mut g = Graph::default();
    let a = g.new_scalar(1.0);
    let b = g.new_scalar(2.0);
    let err = g.invoke(Arc::new(Scale { factor: 2.0 }), &[a, b]).unwrap_err();
    assert_eq!(
        err,
        LevelGradError::ArityMismatch {
            operation: "scale".to_string(),
            expected: 1,
            actual: 2,
        }
    );
}

#[test]
fn test_requires_grad_propagates_from_operands() {
    let mut g = Graph::default();
    let constant = g.new_scalar(1.0);
    let param = g.new_variable(Tensor::scalar(2.0), true);
    let c1 = g.scale(constant, 2.0).unwrap();
    let c2 = g.add(constant, param).unwrap();
    assert!(!g.node(c1).unwrap().requires_grad());
    assert!(g.node(c2).unwrap().requires_grad());
}

#[test]
fn test_heights_recorded_at_append() {
    let mut g = Graph::default();
    let x = g.new_variable(Tensor::scalar(1.0), true);
    let c = g.new_scalar(2.0);
    let a = g.prod(x, c).unwrap();
    let b = g.tanh(a).unwrap();
    let d = g.add(b, x).unwrap();
    assert_eq!(g.height(x).unwrap(), 0);
    assert_eq!(g.height(c).unwrap(), 0);
    assert_eq!(g.height(a).unwrap(), 1);
    assert_eq!(g.height(b).unwrap(), 2);
    assert_eq!(g.height(d).unwrap(), 3);
}

#[test]
fn test_time_step_tagging() {
    let mut g = Graph::default();
    let x0 = g.new_variable(Tensor::scalar(1.0), true);
    assert_eq!(g.time_step(), 0);
    assert_eq!(g.inc_time_step(), 1);
    let y1 = g.scale(x0, 2.0).unwrap();
    g.inc_time_step();
    let y2 = g.scale(y1, 2.0).unwrap();
    assert_eq!(g.time_step_of(x0).unwrap(), 0);
    assert_eq!(g.time_step_of(y1).unwrap(), 1);
    assert_eq!(g.time_step_of(y2).unwrap(), 2);
}

#[test]
fn test_incremental_forward_computes_on_append() {
    let mut g = Graph::default();
    let x = g.new_variable(Tensor::scalar(1.5), true);
    let y = g.scale(x, 2.0).unwrap();
    assert_relative_eq!(g.value(y).unwrap().unwrap().item().unwrap(), 3.0);
}

#[test]
fn test_lazy_graph_defers_values() {
    let mut g = lazy_graph();
    let x = g.new_variable(Tensor::scalar(1.5), true);
    let y = g.scale(x, 2.0).unwrap();
    assert!(g.value(x).unwrap().is_some(), "leaves hold their value");
    assert!(g.value(y).unwrap().is_none());
    g.forward(ForwardOptions::new()).unwrap();
    assert_relative_eq!(g.value(y).unwrap().unwrap().item().unwrap(), 3.0);
}

#[test]
fn test_incremental_kernel_error_leaves_ledger_unchanged() {
    let mut g = Graph::default();
    let a = g.new_variable(Tensor::ones(vec![2]), true);
    let b = g.new_variable(Tensor::ones(vec![3]), true);
    assert!(matches!(g.add(a, b), Err(LevelGradError::ShapeMismatch { .. })));
    assert_eq!(g.len(), 2);
}

#[test]
fn test_replace_value() {
    let mut g = Graph::default();
    let x = g.new_variable(Tensor::ones(vec![2]), true);
    let y = g.scale(x, 2.0).unwrap();

    g.replace_value(x, Tensor::new(vec![3.0, 4.0], vec![2]).unwrap()).unwrap();
    g.forward(ForwardOptions::new()).unwrap();
    assert_eq!(g.value(y).unwrap().unwrap().as_slice(), &[6.0, 8.0]);

    assert_eq!(
        g.replace_value(y, Tensor::zeros(vec![2])).unwrap_err(),
        LevelGradError::NotALeaf(y)
    );
    assert!(matches!(
        g.replace_value(x, Tensor::zeros(vec![3])),
        Err(LevelGradError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_zero_grad() {
    let mut g = Graph::default();
    let x = g.new_variable(Tensor::scalar(1.0), true);
    let y = g.scale(x, 4.0).unwrap();
    g.backward(y, BackwardOptions::new()).unwrap();
    assert!(g.grad(x).unwrap().is_some());
    g.zero_grad().unwrap();
    assert!(g.grad(x).unwrap().is_none());
    assert!(g.grad(y).unwrap().is_none());
}

#[test]
fn test_clear_values_keeps_structure() {
    let mut g = Graph::default();
    let x = g.new_variable(Tensor::scalar(1.0), true);
    let y = g.scale(x, 4.0).unwrap();
    g.backward(y, BackwardOptions::new()).unwrap();
    g.clear_values().unwrap();
    assert!(g.value(x).unwrap().is_some());
    assert!(g.value(y).unwrap().is_none());
    assert!(g.grad(x).unwrap().is_none());
    assert_eq!(g.len(), 2);

    g.forward(ForwardOptions::new()).unwrap();
    assert_relative_eq!(g.value(y).unwrap().unwrap().item().unwrap(), 4.0);
}

#[test]
fn test_invalid_config_rejected() {
    let config = GraphConfig::new().with_num_threads(crate::config::MAX_WORKER_THREADS + 1);
    assert!(matches!(
        Graph::new(config),
        Err(LevelGradError::InvalidConfig(_))
    ));
}
