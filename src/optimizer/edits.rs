//! Core rewrite helpers
//!
//! The canonical ways a handler introduces a transpose (or unsqueeze) on one
//! side of a node while absorbing existing ones on the other. Each helper
//! leaves the graph well-formed and keeps value metadata in sync.

use crate::graph::Graph;
use crate::perm;

use super::handlers::movement::help_handle_unsqueeze;
use super::{get_perm_attr_if_valid, read_from_attr_or_input, HandlerArgs, OptimizerCtx};

/// Create a `Transpose` node over `input`. Output metadata is not set.
pub(crate) fn make_transpose(graph: &mut Graph, input: &str, transpose_perm: &[i64]) -> String {
    let name = graph.add_node("Transpose", &[input.to_string()], 1, "");
    if let Some(node) = graph.get_node_mut(&name) {
        node.set_attr_ints("perm", transpose_perm.to_vec());
    }
    name
}

/// Create a `Squeeze`/`Unsqueeze` node over `input`. From opset 13 the axes
/// move from an attribute to an int64-initializer input; the right form is
/// chosen here. Output metadata is not set.
pub(crate) fn make_squeeze_or_unsqueeze(
    opset: i64,
    graph: &mut Graph,
    op_type: &str,
    input: &str,
    axes: &[i64],
) -> String {
    if opset < 13 {
        let name = graph.add_node(op_type, &[input.to_string()], 1, "");
        if let Some(node) = graph.get_node_mut(&name) {
            node.set_attr_ints("axes", axes.to_vec());
        }
        name
    } else {
        let axes_init = graph.add_initializer_i64(vec![axes.len() as i64], axes.to_vec());
        graph.add_node(op_type, &[input.to_string(), axes_init], 1, "")
    }
}

/// First output of a node, cloned
fn first_output(graph: &Graph, node: &str) -> String {
    graph
        .get_node(node)
        .and_then(|n| n.outputs.first().cloned())
        .unwrap_or_default()
}

/// Replace `node.inputs[i]` with an unsqueezed version. Might reshape an
/// initializer, cancel a matching upstream `Squeeze`, or insert a fresh
/// `Unsqueeze` — pushing it straight through an upstream `Transpose` when
/// there is one, which preserves the driver's topological traversal.
pub(crate) fn unsqueeze_input(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    node_name: &str,
    i: usize,
    axes: &[i64],
) {
    let Some(input) = graph.get_node(node_name).and_then(|n| n.inputs.get(i).cloned()) else {
        return;
    };
    // Drop this node from the consumer set while we decide what to wire in.
    graph.update_node_input(node_name, i, "");

    let is_initializer = graph.is_initializer(&input);
    let consumers = graph.get_value_consumers(&input);

    // Case 1: a constant with a known consumer set. Reshape it in place; any
    // surviving consumers get a Squeeze to counteract the effect. If they
    // later unsqueeze the same input those Squeezes cancel (case 2).
    if is_initializer && consumers.comprehensive {
        if !consumers.nodes.is_empty() {
            let squeeze = make_squeeze_or_unsqueeze(ctx.opset, graph, "Squeeze", &input, axes);
            let sq_out = first_output(graph, &squeeze);
            graph.copy_value_info(&input, &sq_out);
            graph.replace_value_references(&consumers.nodes, &input, &sq_out);
        }
        if let Some(dims) = graph.get_initializer(&input).map(|t| t.dims.clone()) {
            let new_shape = perm::unsqueeze_shape(&dims, axes);
            let _ = graph.reshape_initializer(&input, new_shape);
        }
        graph.update_node_input(node_name, i, &input);
        return;
    }

    // Snapshot of the producer before new nodes are added.
    let producer = graph.get_producer(&input).cloned();

    // Case 2: producer is a Squeeze with matching axes. Cancel it.
    if let Some(prod) = &producer {
        if prod.is_op("Squeeze") {
            let squeeze_axes = read_from_attr_or_input(ctx, graph, prod, "axes", 1, 13);
            if squeeze_axes.as_deref() == Some(axes) {
                let pre_squeeze = prod.inputs.first().cloned().unwrap_or_default();
                if consumers.comprehensive && consumers.nodes.is_empty() {
                    let axes_inp = prod.inputs.get(1).cloned();
                    graph.remove_node(&prod.name);
                    if ctx.opset >= 13 {
                        if let Some(axes_inp) = axes_inp {
                            if !axes_inp.is_empty() && !graph.has_value_consumers(&axes_inp) {
                                graph.remove_initializer(&axes_inp);
                            }
                        }
                    }
                }
                graph.update_node_input(node_name, i, &pre_squeeze);
                return;
            }
            // Axes differ; fall through to case 3.
        }
    }

    // Case 3: insert an Unsqueeze node.
    let unsqueeze = make_squeeze_or_unsqueeze(ctx.opset, graph, "Unsqueeze", &input, axes);
    let unsq_out = first_output(graph, &unsqueeze);
    graph.copy_value_info(&input, &unsq_out);
    if let Some(info) = graph.get_value_info_mut(&unsq_out) {
        info.unsqueeze(axes);
    }

    // If the new Unsqueeze sits on a Transpose, push it through immediately;
    // the transpose would otherwise be behind the traversal frontier.
    if let Some(prod) = &producer {
        if prod.is_op("Transpose") {
            if let Some(prod_perm) = get_perm_attr_if_valid(prod) {
                let prod_perm_inv = perm::invert(&prod_perm);
                let mut args = HandlerArgs {
                    ctx,
                    graph: &mut *graph,
                    transpose: prod.name.clone(),
                    node: unsqueeze.clone(),
                    perm: prod_perm,
                    perm_inv: prod_perm_inv,
                    transposible_inputs: vec![0],
                };
                let new_input = help_handle_unsqueeze(&mut args, axes);
                graph.update_node_input(node_name, i, &new_input);
                return;
            }
        }
    }

    graph.update_node_input(node_name, i, &unsq_out);
}

/// Replace `node.inputs[i]` with a version transposed under `transpose_perm`.
/// Four cases, in order: transpose a constant in place (compensating other
/// consumers), cancel or compose with an upstream transpose, reuse a sibling
/// transpose, or insert a fresh one.
pub(crate) fn transpose_input(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    node_name: &str,
    i: usize,
    transpose_perm: &[i64],
    transpose_perm_inv: &[i64],
) {
    let _ = ctx;
    let Some(input) = graph.get_node(node_name).and_then(|n| n.inputs.get(i).cloned()) else {
        return;
    };
    graph.update_node_input(node_name, i, "");

    let is_initializer = graph.is_initializer(&input);
    let consumers = graph.get_value_consumers(&input);

    // Case 1: a constant with a known consumer set. Transpose it in place;
    // surviving consumers get an inverse transpose that later pushes tend to
    // optimize away.
    if is_initializer && consumers.comprehensive {
        if !consumers.nodes.is_empty() {
            let t_inv = make_transpose(graph, &input, transpose_perm_inv);
            let t_out = first_output(graph, &t_inv);
            graph.copy_value_info(&input, &t_out);
            graph.replace_value_references(&consumers.nodes, &input, &t_out);
        }
        let _ = graph.transpose_initializer(&input, transpose_perm);
        graph.update_node_input(node_name, i, &input);
        return;
    }

    // Case 2: producer is a Transpose.
    if let Some(prod) = graph.get_producer(&input).cloned() {
        if prod.is_op("Transpose") {
            if let Some(perm2) = get_perm_attr_if_valid(&prod) {
                let pre_transpose = prod.inputs.first().cloned().unwrap_or_default();

                // Inverse perms cancel: consume the pre-transpose value.
                if perm2.as_slice() == transpose_perm_inv {
                    if consumers.comprehensive && consumers.nodes.is_empty() {
                        graph.remove_node(&prod.name);
                    }
                    graph.update_node_input(node_name, i, &pre_transpose);
                    return;
                }

                // Otherwise compose: same cost, and the upstream transpose
                // may become removable.
                let combined = perm::compose(&perm2, transpose_perm);
                let t = make_transpose(graph, &pre_transpose, &combined);
                let t_out = first_output(graph, &t);
                graph.copy_value_info(&input, &t_out);
                if let Some(info) = graph.get_value_info_mut(&t_out) {
                    info.permute(transpose_perm);
                }
                if consumers.comprehensive && consumers.nodes.is_empty() {
                    graph.remove_node(&prod.name);
                }
                graph.update_node_input(node_name, i, &t_out);
                return;
            }
        }
    }

    // Case 3: a sibling consumer may already be the transpose we need.
    for consumer in &consumers.nodes {
        if let Some(node) = graph.get_node(consumer) {
            if node.is_op("Transpose")
                && get_perm_attr_if_valid(node).as_deref() == Some(transpose_perm)
            {
                let out = node.outputs.first().cloned().unwrap_or_default();
                graph.update_node_input(node_name, i, &out);
                return;
            }
        }
    }

    // Case 4: add a new Transpose.
    let t = make_transpose(graph, &input, transpose_perm);
    let t_out = first_output(graph, &t);
    graph.copy_value_info(&input, &t_out);
    if let Some(info) = graph.get_value_info_mut(&t_out) {
        info.permute(transpose_perm);
    }
    graph.update_node_input(node_name, i, &t_out);
}

/// Transpose the listed inputs according to `transpose_perm`.
///
/// When a transpose is expected above one of the inputs, pass the inverse of
/// its permutation so the two cancel.
pub(crate) fn transpose_inputs(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    node_name: &str,
    transpose_perm: &[i64],
    input_indices: &[usize],
) {
    let inv = perm::invert(transpose_perm);
    for &j in input_indices {
        transpose_input(ctx, graph, node_name, j, transpose_perm, &inv);
    }
}

pub(crate) fn transpose_first_input(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    node_name: &str,
    transpose_perm: &[i64],
) {
    transpose_inputs(ctx, graph, node_name, transpose_perm, &[0]);
}

/// Insert a `Transpose` after `node.outputs[i]`, preserving the externally
/// visible name: the old output name moves to the transpose and the node's
/// output is renamed. Returns the outward (moved) name. The renamed output
/// receives the shape permuted under `transpose_perm_inv`.
pub(crate) fn transpose_output(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    node_name: &str,
    i: usize,
    transpose_perm: &[i64],
    transpose_perm_inv: &[i64],
) -> String {
    let _ = ctx;
    // Build the transpose detached, then wire it in after the output moves,
    // so the value name never has two producers.
    let t = make_transpose(graph, "", transpose_perm);
    graph.move_output(node_name, i, &t, 0);
    let new_output = graph
        .get_node(node_name)
        .and_then(|n| n.outputs.get(i).cloned())
        .unwrap_or_default();
    graph.update_node_input(&t, 0, &new_output);

    let old_output = first_output(graph, &t);
    graph.copy_value_info(&old_output, &new_output);
    if let Some(info) = graph.get_value_info_mut(&new_output) {
        info.permute(transpose_perm_inv);
    }
    old_output
}

/// Insert a `Transpose` on every output, updating output shapes. Skipped
/// entirely for the identity permutation.
pub(crate) fn transpose_outputs(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    node_name: &str,
    transpose_perm: &[i64],
) {
    if perm::is_identity(transpose_perm) {
        return;
    }
    let inv = perm::invert(transpose_perm);
    let num_outputs = graph.get_node(node_name).map(|n| n.outputs.len()).unwrap_or(0);
    for j in 0..num_outputs {
        transpose_output(ctx, graph, node_name, j, transpose_perm, &inv);
    }
}

/// Left-pad the listed inputs with unit axes until they reach `target_rank`.
/// Returns false — before any mutation — if a rank is unknown or exceeds the
/// target.
pub(crate) fn normalize_input_ranks(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    node_name: &str,
    target_rank: usize,
    input_indices: &[usize],
) -> bool {
    let Some(inputs) = graph.get_node(node_name).map(|n| n.inputs.clone()) else {
        return false;
    };

    let mut ranks = Vec::with_capacity(input_indices.len());
    for &i in input_indices {
        match inputs.get(i).and_then(|inp| graph.value_rank(inp)) {
            Some(rank) if rank <= target_rank => ranks.push(rank),
            _ => return false,
        }
    }

    for (k, &i) in input_indices.iter().enumerate() {
        let rank_diff = target_rank - ranks[k];
        if rank_diff > 0 {
            let axes: Vec<i64> = (0..rank_diff as i64).collect();
            unsqueeze_input(ctx, graph, node_name, i, &axes);
        }
    }
    true
}
