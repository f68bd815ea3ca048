//! Handler for `Shape`
//!
//! `Shape(Transpose(x, perm))` is `Gather(Shape(x), perm)` along axis 0. The
//! result is a 1-D vector, so the outputs are not transposed. From opset 15
//! `Shape` takes a `[start:end]` window; the gather indices are restricted to
//! that window and the attributes cleared, with the node now producing the
//! full shape vector.

use crate::ir::DataType;

use super::super::{edits, HandlerArgs};

pub(crate) fn handle_shape(args: &mut HandlerArgs) -> bool {
    let indices = args.transposible_inputs.clone();
    edits::transpose_inputs(args.ctx, args.graph, &args.node, &args.perm_inv, &indices);

    let rank = args.perm.len();
    let rank_int = rank as i64;

    let new_perm: Vec<i64> = if args.ctx.opset >= 15 {
        let (start, end) = match args.graph.get_node(&args.node) {
            Some(node) => (
                node.attr_int_or("start", 0),
                node.attr_int_or("end", rank_int),
            ),
            None => (0, rank_int),
        };
        let start = if start < 0 { start + rank_int } else { start };
        let end = if end < 0 { end + rank_int } else { end };
        let start = start.clamp(0, rank_int) as usize;
        let end = end.clamp(0, rank_int) as usize;
        if let Some(node) = args.graph.get_node_mut(&args.node) {
            node.clear_attr("start");
            node.clear_attr("end");
        }
        args.perm
            .get(start..end.max(start))
            .map(|s| s.to_vec())
            .unwrap_or_default()
    } else {
        args.perm.clone()
    };

    // Gather the shape vector through the (windowed) permutation.
    let perm_const = args
        .graph
        .add_initializer_i64(vec![new_perm.len() as i64], new_perm.clone());
    let gather = args
        .graph
        .add_node("Gather", &[String::new(), perm_const], 1, "");
    if let Some(node) = args.graph.get_node_mut(&gather) {
        node.set_attr_int("axis", 0);
    }

    args.graph.move_output(&args.node, 0, &gather, 0);
    let new_output = args
        .graph
        .get_node(&args.node)
        .and_then(|n| n.outputs.first().cloned())
        .unwrap_or_default();
    args.graph.update_node_input(&gather, 0, &new_output);

    let gather_out = args
        .graph
        .get_node(&gather)
        .and_then(|n| n.outputs.first().cloned())
        .unwrap_or_default();
    args.graph.copy_value_info(&gather_out, &new_output);
    if new_perm.len() != rank {
        // With start/end gone the Shape node now emits the full vector.
        match args.graph.get_value_info_mut(&new_output) {
            Some(info) => info.set_shape(&[rank_int]),
            None => args.graph.set_value_info(crate::ir::ValueInfo::new(
                &new_output,
                DataType::Int64,
                &[rank_int],
            )),
        }
    }
    true
}
