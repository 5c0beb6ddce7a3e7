use super::*;
use crate::graph::Graph;
use crate::tensor::Tensor;

#[test]
fn test_operator_height() {
    assert_eq!(operator_height(Vec::<usize>::new()), 1);
    assert_eq!(operator_height(vec![0, 0]), 1);
    assert_eq!(operator_height(vec![0, 3, 1]), 4);
}

#[test]
fn test_empty_ledger() {
    let index = HeightIndex::build(&[]);
    assert_eq!(index.num_levels(), 0);
    assert_eq!(index.indexed_len(), 0);
    assert!(index.ensure_fresh(0).is_ok());
}

#[test]
fn test_groups_by_height() {
    let mut g = Graph::default();
    let x = g.new_variable(Tensor::scalar(1.0), true);
    let y = g.new_variable(Tensor::scalar(2.0), true);
    let a = g.add(x, y).unwrap(); // height 1
    let b = g.tanh(x).unwrap(); // height 1
    let c = g.prod(a, b).unwrap(); // height 2
    let d = g.scale(y, 2.0).unwrap(); // height 1

    let index = g.height_index().unwrap();
    assert_eq!(index.num_levels(), 3);
    assert_eq!(index.groups()[0], vec![x, y]);
    assert_eq!(index.groups()[1], vec![a, b, d]);
    assert_eq!(index.groups()[2], vec![c]);
}

#[test]
fn test_ensure_fresh_detects_stale_index() {
    let mut g = Graph::default();
    g.new_scalar(1.0);
    let index = g.height_index().unwrap().clone();
    g.new_scalar(2.0);
    match index.ensure_fresh(g.len()) {
        Err(LevelGradError::StaleHeightIndex { indexed, actual }) => {
            assert_eq!(indexed, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("Expected StaleHeightIndex, got {:?}", other),
    }
}

#[test]
fn test_append_invalidates_cache() {
    let mut g = Graph::default();
    let x = g.new_variable(Tensor::scalar(1.0), true);
    assert_eq!(g.height_index().unwrap().num_levels(), 1);
    let y = g.scale(x, 3.0).unwrap();
    let index = g.height_index().unwrap();
    assert_eq!(index.indexed_len(), 2);
    assert_eq!(index.groups()[1], vec![y]);
}
