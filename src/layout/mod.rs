//! Channels-last / channels-first layout change
//!
//! Targeted operators are wrapped in an inverse-transpose/transpose pair
//! (optionally swapping the node for a differently-named variant first) and
//! the transpose optimizer then absorbs the wrappers, leaving ideally just
//! the rewritten operator.

use rustc_hash::FxHashMap;

use crate::graph::Graph;
use crate::optimizer::{edits, make_optimizer_context, optimize};
use crate::perm;

/// Decision returned by a per-operator layout policy
#[derive(Debug, Clone, Default)]
pub struct LayoutPolicyResult {
    /// Whether this node's layout should change
    pub should_change_layout: bool,
    /// Replacement op type, if the node must be renamed
    pub new_op_type: Option<String>,
    /// Replacement domain, if the node must move domains
    pub new_domain: Option<String>,
    /// Rank of the data tensor; determines the wrapping permutation
    pub rank: usize,
}

/// Per-operator layout policy
pub type LayoutPolicy = fn(&Graph, &crate::ir::Node) -> LayoutPolicyResult;

/// Op type → layout policy
pub type LayoutPolicyMap = FxHashMap<String, LayoutPolicy>;

fn change_layout(
    graph: &mut Graph,
    policies: &LayoutPolicyMap,
    last_to_first: bool,
    allow_extended_ops: bool,
) -> bool {
    let Some(ctx) = make_optimizer_context(graph, allow_extended_ops) else {
        return false;
    };

    let node_names = graph.sorted_node_names();
    let mut changed = false;

    for name in node_names {
        let Some(node) = graph.get_node(&name) else {
            continue;
        };
        let Some(policy) = policies.get(&node.op_type) else {
            continue;
        };
        let result = policy(graph, node);
        if !result.should_change_layout {
            continue;
        }

        let mut target = name.clone();
        if result.new_op_type.is_some() || result.new_domain.is_some() {
            // Swap in a renamed node carrying the same attributes, inputs,
            // and (moved) outputs.
            let Some(old) = graph.get_node(&name).cloned() else {
                continue;
            };
            let new_op_type = result.new_op_type.as_deref().unwrap_or(&old.op_type);
            let new_domain = result.new_domain.as_deref().unwrap_or(&old.domain);
            let new_name =
                graph.add_node(new_op_type, &old.inputs, old.outputs.len(), new_domain);
            for (j, output) in old.outputs.iter().enumerate() {
                if !output.is_empty() {
                    graph.move_output(&name, j, &new_name, j);
                }
            }
            if let Some(n) = graph.get_node_mut(&new_name) {
                n.copy_attributes_from(&old);
            }
            graph.remove_node(&name);
            target = new_name;
        }

        // Wrap: Transpose(perm_inv) -> op' -> Transpose(perm). The optimizer
        // below pushes the wrappers until they cancel or reach constants.
        let mut wrap_perm = perm::channel_last_to_first(result.rank);
        let mut wrap_perm_inv = perm::invert(&wrap_perm);
        if last_to_first {
            std::mem::swap(&mut wrap_perm, &mut wrap_perm_inv);
        }
        edits::transpose_first_input(&ctx, graph, &target, &wrap_perm_inv);
        edits::transpose_outputs(&ctx, graph, &target, &wrap_perm);
        log::debug!("changed layout of {target}");
        changed = true;
    }

    if changed {
        optimize(graph, allow_extended_ops);
    }
    changed
}

/// Rewrite the mapped operators from channels-last to channels-first form,
/// then simplify the introduced transposes
pub fn channel_last_to_first(
    graph: &mut Graph,
    policies: &LayoutPolicyMap,
    allow_extended_ops: bool,
) -> bool {
    change_layout(graph, policies, true, allow_extended_ops)
}

/// Rewrite the mapped operators from channels-first to channels-last form,
/// then simplify the introduced transposes
pub fn channel_first_to_last(
    graph: &mut Graph,
    policies: &LayoutPolicyMap,
    allow_extended_ops: bool,
) -> bool {
    change_layout(graph, policies, false, allow_extended_ops)
}
