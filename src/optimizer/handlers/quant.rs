//! Handlers for quantized operators and the NHWC `MaxPool` specialisation

use crate::perm;

use super::super::{edits, HandlerArgs};
use super::{handle_simple_node_base, handle_simple_node_with_axis};

/// `QLinearConcat`: like `Concat`, but only the data slots move
pub(crate) fn handle_qlinear_concat(args: &mut HandlerArgs) -> bool {
    handle_simple_node_with_axis(args, false, 0)
}

/// `QLinearAdd`/`QLinearMul`: the two data tensors broadcast
pub(crate) fn handle_qlinear_binary(args: &mut HandlerArgs) -> bool {
    handle_simple_node_base(args, true)
}

/// `QLinearAveragePool`/`QLinearGlobalAveragePool` carry a `channels_last`
/// attribute; the push flips it instead of permuting kernel state, so only
/// the exact channel permutation qualifies
pub(crate) fn handle_qlinear_pool(args: &mut HandlerArgs) -> bool {
    let channels_last = args
        .graph
        .get_node(&args.node)
        .map(|n| n.attr_int_or("channels_last", 1))
        .unwrap_or(1);
    let rank = args.perm.len();
    if rank < 2 {
        return false;
    }
    let channel_perm = perm::channel_last_to_first(rank);
    let applies = (channels_last == 0 && args.perm == channel_perm)
        || (channels_last != 0 && args.perm_inv == channel_perm);
    if !applies {
        return false;
    }

    if let Some(node) = args.graph.get_node_mut(&args.node) {
        node.set_attr_int("channels_last", 1 - channels_last);
    }
    edits::transpose_first_input(args.ctx, args.graph, &args.node, &args.perm_inv);
    edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
    true
}

/// Replace `MaxPool` with the vendor `NhwcMaxPool` when the transpose is the
/// channel permutation. The NHWC kernel only exists for 8-bit data and has no
/// `indices` output; `storage_order` only concerns that output and is dropped.
pub(crate) fn handle_max_pool(args: &mut HandlerArgs) -> bool {
    let Some(node) = args.graph.get_node(&args.node).cloned() else {
        return false;
    };

    if node.outputs.len() == 2 && !node.outputs[1].is_empty() {
        // Can't specialise when the optional indices output is used.
        return false;
    }
    let Some(out) = node.outputs.first() else {
        return false;
    };
    match args.graph.value_dtype(out) {
        Some(dtype) if dtype.is_8bit() => {}
        _ => return false,
    }
    if args.perm != perm::channel_last_to_first(args.perm.len()) {
        return false;
    }

    let new_node = args
        .graph
        .add_node("NhwcMaxPool", &node.inputs, 1, "com.microsoft");
    if let Some(n) = args.graph.get_node_mut(&new_node) {
        n.copy_attributes_from(&node);
        n.clear_attr("storage_order");
    }
    args.graph.move_output(&args.node, 0, &new_node, 0);
    args.graph.remove_node(&args.node);
    edits::transpose_first_input(args.ctx, args.graph, &new_node, &args.perm_inv);
    edits::transpose_outputs(args.ctx, args.graph, &new_node, &args.perm);
    true
}
