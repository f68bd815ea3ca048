//! Handlers for reduction operators
//!
//! Reductions treat `axes` as a set, so the permuted axes are written back
//! sorted. With `keepdims=0` the reduced axes vanish from the output, and the
//! output permutation shrinks through `squeeze_perm`.

use crate::perm;

use super::super::{edits, HandlerArgs};

/// Reductions whose `axes` live in an attribute
pub(crate) fn handle_reduce_op(args: &mut HandlerArgs) -> bool {
    let Some(node) = args.graph.get_node(&args.node) else {
        return false;
    };
    let keepdims = node.attr_int_or("keepdims", 1);
    let axes = node.attr_ints("axes").map(|a| a.to_vec());

    let out_perm = match axes {
        None => {
            // Reduce over all dimensions.
            if keepdims == 0 {
                Vec::new()
            } else {
                args.perm.clone()
            }
        }
        Some(axes) => {
            let Some(axes) = perm::normalize_axes(&axes, args.perm.len()) else {
                return false;
            };
            let new_axes = perm::sorted_axes_for_transposed_input(&axes, &args.perm);
            let out_perm = if keepdims == 0 {
                perm::squeeze_perm(&new_axes, &args.perm)
            } else {
                args.perm.clone()
            };
            if let Some(node) = args.graph.get_node_mut(&args.node) {
                node.set_attr_ints("axes", new_axes);
            }
            out_perm
        }
    };

    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    edits::transpose_outputs(args.ctx, args.graph, &args.node, &out_perm);
    true
}

/// `ReduceSum` moved `axes` to an optional input in opset 13
pub(crate) fn handle_reduce_sum(args: &mut HandlerArgs) -> bool {
    if args.ctx.opset < 13 {
        return handle_reduce_op(args);
    }

    let Some(node) = args.graph.get_node(&args.node) else {
        return false;
    };
    let keepdims = node.attr_int_or("keepdims", 1) != 0;
    let noop_with_empty_axes = node.attr_int_or("noop_with_empty_axes", 0) != 0;
    let axes_inp = node.inputs.get(1).cloned().unwrap_or_default();

    let axes_const = if axes_inp.is_empty() {
        None
    } else {
        args.graph.get_constant(&axes_inp).cloned()
    };
    let empty_axes =
        axes_inp.is_empty() || axes_const.as_ref().map(|t| t.data.is_empty()) == Some(true);

    // Case 1: empty axes. Either a no-op or a reduce-all; the input transpose
    // moves regardless, outputs only keep their rank in the no-op/keepdims
    // forms.
    if empty_axes {
        edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
        if noop_with_empty_axes || keepdims {
            edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
        }
        return true;
    }

    // Case 2: axes computed at runtime. Nothing safe to rewrite.
    let Some(axes_const) = axes_const else {
        return false;
    };
    let Some(axes) = axes_const.int_data() else {
        return false;
    };

    // Case 3: constant axes. Materialise the sorted permuted axes.
    let Some(axes) = perm::normalize_axes(&axes, args.perm.len()) else {
        return false;
    };
    let new_axes = perm::sorted_axes_for_transposed_input(&axes, &args.perm);
    let new_axes_const = args
        .graph
        .add_initializer_i64(vec![new_axes.len() as i64], new_axes.clone());
    args.graph.update_node_input(&args.node, 1, &new_axes_const);
    if !args.graph.has_value_consumers(&axes_inp) {
        args.graph.remove_initializer(&axes_inp);
    }

    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    if keepdims {
        edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
    } else {
        let out_perm = perm::squeeze_perm(&new_axes, &args.perm);
        edits::transpose_outputs(args.ctx, args.graph, &args.node, &out_perm);
    }
    true
}
