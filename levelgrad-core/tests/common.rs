use levelgrad_core::{Graph, GraphConfig, NodeId, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Node ids of a graph built by [`build_random_dag`].
#[allow(dead_code)]
pub struct RandomDag {
    pub leaves: Vec<NodeId>,
    pub operators: Vec<NodeId>,
    /// Scalar sum of the last operator.
    pub output: NodeId,
}

#[allow(dead_code)]
pub fn graph_with(parallel: bool, num_threads: usize, incremental_forward: bool) -> Graph {
    Graph::new(
        GraphConfig::new()
            .with_parallel(parallel)
            .with_num_threads(num_threads)
            .with_incremental_forward(incremental_forward),
    )
    .expect("valid test config")
}

/// Builds a random DAG of `num_ops` operators over `num_leaves` vector leaves of length
/// `width`. The same `seed` always yields the same structure and leaf values, whatever
/// the graph's configuration.
///
/// Operands are drawn mostly from the last few nodes so that the graph gets deep, and
/// every product is squashed through `tanh` to keep values bounded. The time step is
/// advanced at random between operators.
#[allow(dead_code)]
pub fn build_random_dag(
    g: &mut Graph,
    seed: u64,
    num_leaves: usize,
    num_ops: usize,
    width: usize,
) -> RandomDag {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).expect("valid normal distribution");

    let mut all = Vec::new();
    let mut leaves = Vec::new();
    for i in 0..num_leaves {
        let data: Vec<f64> = (0..width).map(|_| normal.sample(&mut rng)).collect();
        // Every fourth leaf is a constant.
        let requires_grad = i % 4 != 3;
        let id = g.new_variable(
            Tensor::new(data, vec![width]).expect("valid leaf"),
            requires_grad,
        );
        leaves.push(id);
        all.push(id);
    }

    let mut operators = Vec::new();
    for _ in 0..num_ops {
        if rng.gen_bool(0.2) {
            g.inc_time_step();
        }
        let a = pick(&mut rng, &all);
        let b = pick(&mut rng, &all);
        let id = match rng.gen_range(0..5) {
            0 => g.add(a, b),
            1 => g.sub(a, b),
            2 => {
                let p = g.prod(a, b).expect("valid product");
                operators.push(p);
                all.push(p);
                g.tanh(p)
            }
            3 => g.scale(a, rng.gen_range(-1.5..1.5)),
            _ => g.tanh(a),
        }
        .expect("valid random operator");
        operators.push(id);
        all.push(id);
    }

    let last = *all.last().expect("non-empty graph");
    let output = g.sum(last).expect("valid sum");
    RandomDag {
        leaves,
        operators,
        output,
    }
}

#[allow(dead_code)]
fn pick(rng: &mut StdRng, nodes: &[NodeId]) -> NodeId {
    let recent = nodes.len().saturating_sub(6);
    if rng.gen_bool(0.7) {
        nodes[rng.gen_range(recent..nodes.len())]
    } else {
        nodes[rng.gen_range(0..nodes.len())]
    }
}
