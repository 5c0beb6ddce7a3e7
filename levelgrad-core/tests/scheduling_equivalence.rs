use approx::assert_relative_eq;
use levelgrad_core::{BackwardOptions, ForwardOptions, Graph, NodeId};

mod common;
use common::{build_random_dag, graph_with};

fn all_ids(g: &Graph) -> Vec<NodeId> {
    g.nodes().iter().map(|n| n.id()).collect()
}

#[test]
fn test_forward_parallel_is_bitwise_serial() {
    for seed in 0..8 {
        for num_threads in [1, 2, 8] {
            let mut serial = graph_with(false, num_threads, false);
            let mut parallel = graph_with(true, num_threads, false);
            build_random_dag(&mut serial, seed, 5, 40, 3);
            build_random_dag(&mut parallel, seed, 5, 40, 3);

            serial.forward(ForwardOptions::new()).unwrap();
            parallel.forward(ForwardOptions::new()).unwrap();
            for id in all_ids(&serial) {
                assert_eq!(
                    serial.value(id).unwrap(),
                    parallel.value(id).unwrap(),
                    "seed {seed}, {num_threads} threads: value of {id} differs"
                );
            }
        }
    }
}

#[test]
fn test_incremental_forward_matches_full_pass() {
    for seed in 0..4 {
        let mut incremental = graph_with(false, 0, true);
        let mut lazy = graph_with(true, 4, false);
        build_random_dag(&mut incremental, seed, 4, 30, 2);
        build_random_dag(&mut lazy, seed, 4, 30, 2);
        lazy.forward(ForwardOptions::new()).unwrap();
        for id in all_ids(&lazy) {
            assert_eq!(incremental.value(id).unwrap(), lazy.value(id).unwrap());
        }
    }
}

#[test]
fn test_backward_parallel_matches_serial() {
    for seed in 0..8 {
        for num_threads in [1, 3, 8] {
            let mut serial = graph_with(false, num_threads, true);
            let mut parallel = graph_with(true, num_threads, true);
            let dag = build_random_dag(&mut serial, seed, 5, 40, 3);
            build_random_dag(&mut parallel, seed, 5, 40, 3);

            serial.backward(dag.output, BackwardOptions::new()).unwrap();
            parallel.backward(dag.output, BackwardOptions::new()).unwrap();

            for id in all_ids(&serial) {
                let s = serial.grad(id).unwrap();
                let p = parallel.grad(id).unwrap();
                match (s, p) {
                    (None, None) => {}
                    (Some(s), Some(p)) => {
                        // Fan-in contributions may be summed in a different order.
                        for (a, b) in s.as_slice().iter().zip(p.as_slice()) {
                            assert_relative_eq!(a, b, epsilon = 1e-12, max_relative = 1e-9);
                        }
                    }
                    (s, p) => panic!(
                        "seed {seed}: gradient presence of {id} differs (serial {:?}, parallel {:?})",
                        s.is_some(),
                        p.is_some()
                    ),
                }
            }
        }
    }
}

#[test]
fn test_backward_from_inner_target() {
    for seed in 0..4 {
        let mut serial = graph_with(false, 0, true);
        let mut parallel = graph_with(true, 4, true);
        let dag = build_random_dag(&mut serial, seed, 4, 30, 2);
        build_random_dag(&mut parallel, seed, 4, 30, 2);
        let target = dag.operators[dag.operators.len() / 2];
        if !serial.node(target).unwrap().requires_grad() {
            continue;
        }

        serial.backward(target, BackwardOptions::new()).unwrap();
        parallel.backward(target, BackwardOptions::new()).unwrap();
        for id in all_ids(&serial) {
            if id > target {
                assert!(serial.grad(id).unwrap().is_none());
                assert!(parallel.grad(id).unwrap().is_none());
                continue;
            }
            match (serial.grad(id).unwrap(), parallel.grad(id).unwrap()) {
                (None, None) => {}
                (Some(s), Some(p)) => {
                    for (a, b) in s.as_slice().iter().zip(p.as_slice()) {
                        assert_relative_eq!(a, b, epsilon = 1e-12, max_relative = 1e-9);
                    }
                }
                _ => panic!("seed {seed}: gradient presence of {id} differs"),
            }
        }
    }
}
