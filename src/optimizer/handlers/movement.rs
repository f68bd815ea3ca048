//! Handlers for data-movement operators with axes: `Pad`, `Slice`, `Tile`,
//! `Squeeze`, `Unsqueeze`

use crate::graph::Graph;
use crate::ir::DataType;
use crate::perm;

use super::super::{edits, read_from_attr_or_input, HandlerArgs};

/// `Pad` stores `[start_0..start_{r-1}, end_0..end_{r-1}]`. Below opset 11
/// the pads are an attribute; from 11 they are the second input, rewritten in
/// place when constant and reordered with a `Gather` otherwise.
pub(crate) fn handle_pad(args: &mut HandlerArgs) -> bool {
    let rank = args.perm.len();
    let opset = args.ctx.opset;

    let mut attr_pads = None;
    if opset < 11 {
        let pads = args
            .graph
            .get_node(&args.node)
            .and_then(|n| n.attr_ints("pads").map(|p| p.to_vec()));
        match pads {
            Some(pads) if pads.len() == rank * 2 => attr_pads = Some(pads),
            _ => return false,
        }
    }

    // From opset 11 the pads input is mandatory; validate before mutating.
    let mut pads_input = String::new();
    let mut const_pads = None;
    if opset >= 11 {
        match args
            .graph
            .get_node(&args.node)
            .and_then(|n| n.inputs.get(1).cloned())
        {
            Some(inp) if !inp.is_empty() => pads_input = inp,
            _ => return false,
        }
        if let Some(tensor) = args.graph.get_constant(&pads_input) {
            match tensor.int_data() {
                Some(pads) if pads.len() == rank * 2 => const_pads = Some(pads),
                _ => return false,
            }
        }
    }

    if let Some(pads) = attr_pads {
        let new_pads = perm::permute_pads(&pads, &args.perm_inv);
        if let Some(node) = args.graph.get_node_mut(&args.node) {
            node.set_attr_ints("pads", new_pads);
        }
    }

    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);

    if opset < 11 {
        return true;
    }

    if let Some(pads) = const_pads {
        // Constant pads: materialise the reordered list.
        let new_pads = perm::permute_pads(&pads, &args.perm_inv);
        let new_pads_const = args
            .graph
            .add_initializer_i64(vec![rank as i64 * 2], new_pads);
        args.graph.update_node_input(&args.node, 1, &new_pads_const);
        if !args.graph.has_value_consumers(&pads_input) {
            args.graph.remove_initializer(&pads_input);
        }
        return true;
    }

    // Computed pads: reorder with a Gather over [perm_inv, perm_inv + r].
    let mut gather_indices = args.perm_inv.clone();
    gather_indices.extend(args.perm_inv.iter().map(|p| p + rank as i64));
    let indices_const = args
        .graph
        .add_initializer_i64(vec![rank as i64 * 2], gather_indices);
    let gather = args
        .graph
        .add_node("Gather", &[pads_input.clone(), indices_const], 1, "");
    let gather_out = args
        .graph
        .get_node(&gather)
        .and_then(|n| n.outputs.first().cloned())
        .unwrap_or_default();
    args.graph.copy_value_info(&pads_input, &gather_out);
    if let Some(node) = args.graph.get_node_mut(&gather) {
        node.set_attr_int("axis", 0);
    }
    args.graph.update_node_input(&args.node, 1, &gather_out);
    true
}

/// Int initializer matching the dtype `Slice` used for its axes
fn add_int_initializer_matching_dtype(
    graph: &mut Graph,
    values: Vec<i64>,
    dtype: DataType,
) -> String {
    let shape = vec![values.len() as i64];
    if dtype == DataType::Int32 {
        let values: Vec<i32> = values.iter().map(|&v| v as i32).collect();
        graph.add_initializer_i32(shape, values)
    } else {
        graph.add_initializer_i64(shape, values)
    }
}

/// `Slice` axes align positionally with `starts`/`ends`/`steps`, so the
/// permuted axes keep their order. Below opset 10 everything is attributes;
/// from 10 the axes input may be int32 or int64 and is derived from the
/// `starts` shape when absent.
pub(crate) fn handle_slice(args: &mut HandlerArgs) -> bool {
    let rank = args.perm.len();

    if args.ctx.opset < 10 {
        let Some(node) = args.graph.get_node(&args.node) else {
            return false;
        };
        let axes = match node.attr_ints("axes") {
            Some(axes) => axes.to_vec(),
            None => {
                // Defaults to [0, 1, ... len(starts)).
                let Some(starts) = node.attr_ints("starts") else {
                    return false;
                };
                (0..starts.len() as i64).collect()
            }
        };
        let Some(axes) = perm::normalize_axes(&axes, rank) else {
            return false;
        };
        let new_axes = perm::axes_for_transposed_input(&axes, &args.perm);
        if let Some(node) = args.graph.get_node_mut(&args.node) {
            node.set_attr_ints("axes", new_axes);
        }
        edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
        edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
        return true;
    }

    // Inputs are data, starts, ends, [axes, steps].
    let Some(inputs) = args.graph.get_node(&args.node).map(|n| n.inputs.clone()) else {
        return false;
    };

    if inputs.len() < 4 || inputs[3].is_empty() {
        // Axes input missing: derive from the length of starts.
        let Some(starts) = inputs.get(1) else {
            return false;
        };
        let Some(starts_info) = args.graph.get_value_info(starts) else {
            return false;
        };
        let int_dtype = starts_info.dtype;
        if int_dtype != DataType::Int32 && int_dtype != DataType::Int64 {
            return false;
        }
        let ndims = match starts_info.shape.as_deref() {
            Some([dim]) => match dim.as_fixed() {
                Some(n) if n >= 0 && (n as usize) <= rank => n as usize,
                _ => return false,
            },
            _ => return false,
        };
        let new_axes: Vec<i64> = args.perm[..ndims].to_vec();
        let new_axes_const = add_int_initializer_matching_dtype(args.graph, new_axes, int_dtype);
        args.graph.update_node_input(&args.node, 3, &new_axes_const);
    } else {
        // Axes input provided; only a constant can be rewritten.
        let axes_inp = inputs[3].clone();
        let Some(axes_const) = args.graph.get_constant(&axes_inp) else {
            return false;
        };
        let int_dtype = axes_const.dtype();
        let Some(axes) = axes_const.int_data() else {
            return false;
        };
        let Some(axes) = perm::normalize_axes(&axes, rank) else {
            return false;
        };
        // Order must stay aligned with starts/ends/steps; do not sort.
        let new_axes = perm::axes_for_transposed_input(&axes, &args.perm);
        let new_axes_const = add_int_initializer_matching_dtype(args.graph, new_axes, int_dtype);
        args.graph.update_node_input(&args.node, 3, &new_axes_const);
        if !args.graph.has_value_consumers(&axes_inp) {
            args.graph.remove_initializer(&axes_inp);
        }
    }

    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
    true
}

/// `Tile`: constant repeats are permuted; computed repeats are reordered with
/// a `Gather` over `perm_inv`
pub(crate) fn handle_tile(args: &mut HandlerArgs) -> bool {
    let rank = args.perm.len();

    let Some(repeats_inp) = args
        .graph
        .get_node(&args.node)
        .and_then(|n| n.inputs.get(1).cloned())
    else {
        return false;
    };

    if let Some(repeats_const) = args.graph.get_constant(&repeats_inp) {
        let repeats = match repeats_const.int_data() {
            Some(repeats) if repeats.len() == rank => repeats,
            _ => return false,
        };
        let new_repeats: Vec<i64> = args
            .perm_inv
            .iter()
            .map(|&p| repeats[p as usize])
            .collect();
        let new_repeats_const = args.graph.add_initializer_i64(vec![rank as i64], new_repeats);
        args.graph.update_node_input(&args.node, 1, &new_repeats_const);
        if !args.graph.has_value_consumers(&repeats_inp) {
            args.graph.remove_initializer(&repeats_inp);
        }
    } else {
        let perm_inv_const = args
            .graph
            .add_initializer_i64(vec![rank as i64], args.perm_inv.clone());
        let gather = args
            .graph
            .add_node("Gather", &[repeats_inp.clone(), perm_inv_const], 1, "");
        let gather_out = args
            .graph
            .get_node(&gather)
            .and_then(|n| n.outputs.first().cloned())
            .unwrap_or_default();
        args.graph.copy_value_info(&repeats_inp, &gather_out);
        args.graph.update_node_input(&args.node, 1, &gather_out);
    }

    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
    true
}

/// `Squeeze` needs known axes; the permuted axes are written back sorted and
/// the output permutation shrinks accordingly
pub(crate) fn handle_squeeze(args: &mut HandlerArgs) -> bool {
    let Some(node) = args.graph.get_node(&args.node) else {
        return false;
    };
    // Unset axes leave the output rank data-dependent; skip.
    let Some(axes) = read_from_attr_or_input(args.ctx, args.graph, node, "axes", 1, 13) else {
        return false;
    };
    let Some(axes) = perm::normalize_axes(&axes, args.perm.len()) else {
        return false;
    };
    let new_axes = perm::sorted_axes_for_transposed_input(&axes, &args.perm);

    if args.ctx.opset < 13 {
        if let Some(node) = args.graph.get_node_mut(&args.node) {
            node.set_attr_ints("axes", new_axes.clone());
        }
    } else {
        let Some(axes_inp) = args
            .graph
            .get_node(&args.node)
            .and_then(|n| n.inputs.get(1).cloned())
        else {
            return false;
        };
        let new_axes_const = args
            .graph
            .add_initializer_i64(vec![new_axes.len() as i64], new_axes.clone());
        args.graph.update_node_input(&args.node, 1, &new_axes_const);
        if !args.graph.has_value_consumers(&axes_inp) {
            args.graph.remove_initializer(&axes_inp);
        }
    }

    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    let out_perm = perm::squeeze_perm(&new_axes, &args.perm);
    edits::transpose_outputs(args.ctx, args.graph, &args.node, &out_perm);
    true
}

/// Push a transpose through an `Unsqueeze` and return the final output name.
/// Shared with `unsqueeze_input`, which uses it to push opportunistically
/// when it plants an `Unsqueeze` on top of an existing transpose.
pub(crate) fn help_handle_unsqueeze(args: &mut HandlerArgs, axes: &[i64]) -> String {
    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    let new_perm = perm::unsqueeze_perm(axes, &args.perm);
    let new_perm_inv = perm::invert(&new_perm);
    edits::transpose_output(args.ctx, args.graph, &args.node, 0, &new_perm, &new_perm_inv)
}

/// `Unsqueeze` keeps its axes; the output permutation grows around the
/// inserted 1-axes
pub(crate) fn handle_unsqueeze(args: &mut HandlerArgs) -> bool {
    let Some(node) = args.graph.get_node(&args.node) else {
        return false;
    };
    let Some(axes) = read_from_attr_or_input(args.ctx, args.graph, node, "axes", 1, 13) else {
        return false;
    };
    let Some(axes) = perm::normalize_axes(&axes, args.perm.len() + axes.len()) else {
        return false;
    };
    help_handle_unsqueeze(args, &axes);
    true
}
