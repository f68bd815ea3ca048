//! Handlers for axis-bearing operators

use crate::perm;

use super::super::{edits, HandlerArgs};
use super::{handle_simple_node_base, handle_simple_node_with_axis};

/// `Split` has a default axis of 0
pub(crate) fn handle_split(args: &mut HandlerArgs) -> bool {
    handle_simple_node_with_axis(args, true, 0)
}

/// `Concat` has no default axis
pub(crate) fn handle_concat(args: &mut HandlerArgs) -> bool {
    handle_simple_node_with_axis(args, false, 0)
}

/// `Softmax`, `Hardmax`, `LogSoftmax`
///
/// From opset 13 the axis is an ordinary axis with default -1. Below 13 the
/// input is coerced to 2-D around the axis: the attribute is a split point,
/// and the push is only legal when the permutation moves no dimension across
/// it. The axis is left untouched in that case.
pub(crate) fn handle_soft_hard_max(args: &mut HandlerArgs) -> bool {
    if args.ctx.opset >= 13 {
        return handle_simple_node_with_axis(args, true, -1);
    }

    let rank = args.perm.len();
    let axis = args
        .graph
        .get_node(&args.node)
        .map(|n| n.attr_int_or("axis", 1))
        .unwrap_or(1);
    let Some(axis) = perm::normalize_axis(axis, rank) else {
        return false;
    };

    for (i, &p) in args.perm.iter().enumerate() {
        let to_lhs = (i as i64) < axis;
        let from_lhs = p < axis;
        if to_lhs != from_lhs {
            return false;
        }
    }

    handle_simple_node_base(args, false)
}

/// `ArgMin`/`ArgMax`: renumber the axis; the output loses it when
/// `keepdims=0`, so the output permutation is squeezed accordingly
pub(crate) fn handle_arg_min_max(args: &mut HandlerArgs) -> bool {
    let rank = args.perm.len();
    let (keepdims, axis) = match args.graph.get_node(&args.node) {
        Some(node) => (node.attr_int_or("keepdims", 1), node.attr_int_or("axis", 0)),
        None => return false,
    };
    let Some(axis) = perm::normalize_axis(axis, rank) else {
        return false;
    };
    let new_axis = args.perm[axis as usize];
    if let Some(node) = args.graph.get_node_mut(&args.node) {
        node.set_attr_int("axis", new_axis);
    }

    let indices = args.transposible_inputs.clone();
    edits::transpose_inputs(args.ctx, args.graph, &args.node, &args.perm_inv, &indices);
    if keepdims != 0 {
        edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
    } else {
        let out_perm = perm::squeeze_perm(&[new_axis], &args.perm);
        edits::transpose_outputs(args.ctx, args.graph, &args.node, &out_perm);
    }
    true
}

/// `QuantizeLinear`/`DequantizeLinear`: per-axis scales appeared in opset 13,
/// so the axis is renumbered when the scale is non-scalar
pub(crate) fn handle_quantize_dequantize_linear(args: &mut HandlerArgs) -> bool {
    let rank = args.perm.len();

    if args.ctx.opset >= 13 {
        let Some(node) = args.graph.get_node(&args.node) else {
            return false;
        };
        let scalar_params = node
            .inputs
            .get(1)
            .and_then(|scale| args.graph.value_rank(scale))
            == Some(0);

        if !scalar_params {
            let axis = node.attr_int_or("axis", 1);
            let Some(axis) = perm::normalize_axis(axis, rank) else {
                return false;
            };
            let new_axis = args.perm[axis as usize];
            if let Some(node) = args.graph.get_node_mut(&args.node) {
                node.set_attr_int("axis", new_axis);
            }
        }
    }

    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
    true
}
