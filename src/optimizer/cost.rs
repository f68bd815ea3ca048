//! Push-profitability heuristics
//!
//! Costs are measured in transposed dimensions: the number of non-trivial
//! (size != 1) dimensions involved in transposes above a node. Pushing is
//! worthwhile when that number strictly decreases. To favour transposing
//! smaller tensors, trivial dimensions are not counted.

use crate::graph::Graph;
use crate::ir::Node;

use super::handlers;
use super::get_perm_attr_if_valid;

/// Rank of a value excluding 1-sized dimensions; 5 when the shape is unknown
/// (deliberately pessimistic). Symbolic dimensions count as non-1.
pub(crate) fn estimate_value_rank(graph: &Graph, value: &str) -> i32 {
    match graph.value_shape(value) {
        None => 5,
        Some(shape) => shape.iter().filter(|d| !d.is_one()).count() as i32,
    }
}

/// Whether a transpose node is only consumed by operators we can likely push
/// it through
pub(crate) fn can_likely_remove_transpose(graph: &Graph, transpose: &Node) -> bool {
    let Some(out) = transpose.outputs.first() else {
        return false;
    };
    let consumers = graph.get_value_consumers(out);
    if !consumers.comprehensive {
        return false;
    }
    consumers.nodes.iter().all(|name| {
        graph
            .get_node(name)
            .map(|n| handlers::get_handler(n, true).is_some())
            .unwrap_or(false)
    })
}

/// Cost of transposing one input. Negative when an existing transpose would
/// be removed.
pub(crate) fn estimate_transpose_value_cost(graph: &Graph, input: &str, perm_inv: &[i64]) -> i32 {
    // Transposing constants costs nothing.
    if graph.get_constant(input).is_some() {
        return 0;
    }

    // Transposing a transpose either cancels it or composes the permutations.
    if let Some(producer) = graph.get_producer(input) {
        if producer.is_op("Transpose") {
            if let Some(perm2) = get_perm_attr_if_valid(producer) {
                if perm2.as_slice() == perm_inv && can_likely_remove_transpose(graph, producer) {
                    return -estimate_value_rank(graph, input);
                }
                return 0;
            }
        }
    }

    // A new transpose will likely be needed.
    estimate_value_rank(graph, input)
}

/// Total cost of transposing the listed inputs. Negative when pushing is
/// beneficial.
pub(crate) fn estimate_transpose_inputs_cost(
    graph: &Graph,
    node: &Node,
    perm_inv: &[i64],
    input_indices: &[usize],
) -> i32 {
    input_indices
        .iter()
        .filter_map(|&j| node.inputs.get(j))
        .map(|input| estimate_transpose_value_cost(graph, input, perm_inv))
        .sum()
}
