//! Transpose-through-transpose: cancellation and fusion

use crate::perm;

use super::super::{get_perm_attr_if_valid, HandlerArgs};

/// Two stacked transposes either cancel (inverse perms) or fuse into one
/// carrying the composed perm. `args.transpose` is the upstream node,
/// `args.node` the downstream one.
pub(crate) fn handle_transpose(args: &mut HandlerArgs) -> bool {
    let Some(node) = args.graph.get_node(&args.node) else {
        return false;
    };
    let Some(node_perm) = get_perm_attr_if_valid(node) else {
        return false;
    };
    let node_output = node.outputs.first().cloned().unwrap_or_default();
    let Some(transpose_input) = args
        .graph
        .get_node(&args.transpose)
        .and_then(|t| t.inputs.first().cloned())
    else {
        return false;
    };

    if args.perm_inv == node_perm {
        // Case 1: the permutations cancel.
        let consumers = args.graph.get_value_consumers(&node_output);
        if consumers.comprehensive {
            // Point every consumer of the 2nd transpose at the value feeding
            // the 1st.
            args.graph
                .replace_value_references(&consumers.nodes, &node_output, &transpose_input);
        } else {
            // The 2nd transpose's output name must survive (it is a graph
            // output). Try to move it onto the 1st transpose's parent.
            let inp_consumers = args.graph.get_value_consumers(&transpose_input);
            let parent = args
                .graph
                .get_producer_name(&transpose_input)
                .map(str::to_string);

            match parent {
                Some(parent) if inp_consumers.comprehensive => {
                    args.graph.update_node_input(&args.node, 0, "");
                    args.graph.replace_value_references(
                        &inp_consumers.nodes,
                        &transpose_input,
                        &node_output,
                    );
                    let slot = args
                        .graph
                        .get_node(&parent)
                        .map(|n| {
                            n.outputs
                                .iter()
                                .position(|o| o == &transpose_input)
                                .unwrap_or(0)
                        })
                        .unwrap_or(0);
                    args.graph.move_output(&args.node, 0, &parent, slot);
                }
                _ => {
                    // Both endpoints are externally visible; an Identity is
                    // the only way to keep both names.
                    let identity =
                        args.graph
                            .add_node("Identity", &[String::new()], 1, "");
                    args.graph.move_output(&args.node, 0, &identity, 0);
                    args.graph.update_node_input(&identity, 0, &transpose_input);
                }
            }
        }
        args.graph.remove_node(&args.node);
    } else {
        // Case 2: fuse into the downstream node with the composed perm.
        let new_perm = perm::compose(&args.perm, &node_perm);
        if let Some(node) = args.graph.get_node_mut(&args.node) {
            node.set_attr_ints("perm", new_perm);
        }
        args.graph.update_node_input(&args.node, 0, &transpose_input);
    }

    // The downstream node no longer references the upstream transpose;
    // remove it if nothing else does.
    let upstream_out = args
        .graph
        .get_node(&args.transpose)
        .and_then(|t| t.outputs.first().cloned());
    if let Some(out) = upstream_out {
        if !args.graph.has_value_consumers(&out) {
            args.graph.remove_node(&args.transpose);
        }
    }

    true
}
