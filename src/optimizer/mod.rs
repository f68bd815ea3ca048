//! Transpose-pushing rewrite engine
//!
//! The driver walks the graph once in topological order and, for every node
//! fed by a `Transpose`, asks the per-operator handler to push the transpose
//! through. A rank-based cost gate decides whether a push pays off. Handlers
//! validate everything before mutating, so a `false` return always means the
//! graph is untouched.

pub(crate) mod cost;
pub(crate) mod edits;
pub(crate) mod handlers;

#[cfg(test)]
mod tests;

use rustc_hash::FxHashSet;

use crate::graph::Graph;
use crate::ir::{Node, TensorData};
use crate::perm;
use crate::{SUPPORTED_OPSET_MAX, SUPPORTED_OPSET_MIN};

/// Per-run optimizer state shared with every handler
pub(crate) struct OptimizerCtx {
    /// Default-domain opset of the graph
    pub opset: i64,
    /// Whether the vendor-domain handler table may be consulted
    pub allow_extended_ops: bool,
    /// Bypass the cost gate entirely
    pub skip_cost_check: bool,
}

/// Arguments delivered to a handler once the driver has committed to
/// attempting a push. Nodes are referenced by name; all graph access goes
/// through `graph`.
pub(crate) struct HandlerArgs<'a> {
    /// Shared optimizer state
    pub ctx: &'a OptimizerCtx,
    /// The graph being rewritten
    pub graph: &'a mut Graph,
    /// Name of the upstream `Transpose` node
    pub transpose: String,
    /// Name of the node the transpose is being pushed through
    pub node: String,
    /// Permutation of the upstream transpose
    pub perm: Vec<i64>,
    /// Inverse of `perm`
    pub perm_inv: Vec<i64>,
    /// Input indices eligible for transposition, from the handler table
    pub transposible_inputs: Vec<usize>,
}

/// The `perm` attribute of a node, if present and a valid permutation.
/// A malformed permutation is treated as absent.
pub(crate) fn get_perm_attr_if_valid(node: &Node) -> Option<Vec<i64>> {
    let perm = node.attr_ints("perm")?.to_vec();
    perm::is_valid_perm(&perm).then_some(perm)
}

/// Read an int64 list that lives in an attribute below `opset` and in a
/// constant input from `opset` onwards (e.g. `Squeeze`/`Unsqueeze` axes at 13)
pub(crate) fn read_from_attr_or_input(
    ctx: &OptimizerCtx,
    graph: &Graph,
    node: &Node,
    attr_name: &str,
    inp_index: usize,
    opset: i64,
) -> Option<Vec<i64>> {
    if ctx.opset < opset {
        node.attr_ints(attr_name).map(|v| v.to_vec())
    } else {
        let inp = node.inputs.get(inp_index)?;
        if inp.is_empty() {
            return None;
        }
        match &graph.get_constant(inp)?.data {
            TensorData::I64(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Build the optimizer context, or `None` when the graph's opset is absent or
/// outside the supported window
pub(crate) fn make_optimizer_context(graph: &Graph, allow_extended_ops: bool) -> Option<OptimizerCtx> {
    let opset = graph.opset("").or_else(|| graph.opset("ai.onnx"))?;
    if !(SUPPORTED_OPSET_MIN..=SUPPORTED_OPSET_MAX).contains(&opset) {
        return None;
    }
    let allow_extended_ops = allow_extended_ops && graph.opset("com.microsoft") == Some(1);
    Some(OptimizerCtx {
        opset,
        allow_extended_ops,
        skip_cost_check: false,
    })
}

/// Find a handler, apply the cost gate, and invoke the handler
pub(crate) fn process_transpose(
    ctx: &OptimizerCtx,
    graph: &mut Graph,
    transpose_name: &str,
    node_name: &str,
    perm: &[i64],
    transpose_input_index: usize,
    outputs_leading_to_transpose: &FxHashSet<String>,
) -> bool {
    let Some(node) = graph.get_node(node_name) else {
        return false;
    };
    let Some(info) = handlers::get_handler(node, ctx.allow_extended_ops) else {
        return false;
    };
    let input_indices = (info.transposible_inputs)(ctx, graph, node);
    if !input_indices.contains(&transpose_input_index) {
        // Transpose is not on an eligible input
        return false;
    }

    // Transpose and MaxPool are pushed whenever a handler applies: merging
    // transposes never hurts, and the NHWC MaxPool variant is faster.
    let Some(node) = graph.get_node(node_name) else {
        return false;
    };
    let exempt = node.is_op("Transpose") || node.is_op("MaxPool");
    if !ctx.skip_cost_check && !exempt {
        // The number of transposed dimensions above the node must strictly
        // decrease. A transpose pushed onto the outputs is tolerated: either
        // some output already leads to a matching transpose (the reverse
        // pass marked it) or it keeps sinking toward the graph outputs where
        // later consumers can absorb it.
        let cost = cost::estimate_transpose_inputs_cost(graph, node, perm, &input_indices);
        if cost >= 0 {
            log::trace!("not pushing {transpose_name} through {node_name}: input cost {cost}");
            return false;
        }
        if info.transposes_outputs
            && !node
                .outputs
                .iter()
                .any(|o| outputs_leading_to_transpose.contains(o))
        {
            let out_rank = node
                .outputs
                .iter()
                .map(|o| cost::estimate_value_rank(graph, o))
                .max()
                .unwrap_or(0);
            log::trace!(
                "push through {node_name} leaves a residual output transpose (projected cost {})",
                cost + out_rank
            );
        }
    }

    let perm_inv = perm::invert(perm);
    let mut args = HandlerArgs {
        ctx,
        graph,
        transpose: transpose_name.to_string(),
        node: node_name.to_string(),
        perm: perm.to_vec(),
        perm_inv,
        transposible_inputs: input_indices,
    };
    let handled = (info.handler)(&mut args);
    if handled {
        log::debug!("pushed transpose {transpose_name} through {node_name}");
    }
    handled
}

/// Two-pass optimization over a snapshot of the node list
pub(crate) fn optimize_impl(ctx: &OptimizerCtx, graph: &mut Graph) -> bool {
    let node_names = graph.sorted_node_names();

    // Reverse pass: mark values from which a transpose is reachable through
    // push-friendly nodes. A single reverse walk suffices because the node
    // list is topologically sorted and the transition is monotone.
    let mut outputs_leading_to_transpose: FxHashSet<String> = FxHashSet::default();
    for name in node_names.iter().rev() {
        let Some(node) = graph.get_node(name) else {
            continue;
        };
        if node.is_op("Transpose") {
            if let Some(inp) = node.inputs.first() {
                if !inp.is_empty() {
                    outputs_leading_to_transpose.insert(inp.clone());
                }
            }
            continue;
        }
        if node
            .outputs
            .iter()
            .any(|o| outputs_leading_to_transpose.contains(o))
        {
            if let Some(info) = handlers::get_handler(node, ctx.allow_extended_ops) {
                if info.transposes_outputs {
                    for j in (info.transposible_inputs)(ctx, graph, node) {
                        if let Some(inp) = node.inputs.get(j) {
                            if !inp.is_empty() {
                                outputs_leading_to_transpose.insert(inp.clone());
                            }
                        }
                    }
                }
            }
        }
    }

    // Forward pass. Nodes are modified during iteration but never deleted
    // before we reach them; new transposes only appear as inputs to existing
    // nodes. After a successful push the input scan restarts against the
    // node's live inputs, since they may have changed or the node may be gone.
    let mut changed = false;
    for name in &node_names {
        loop {
            let Some(node) = graph.get_node(name) else {
                break;
            };
            let inputs = node.inputs.clone();
            let mut modified = false;
            for (j, inp) in inputs.iter().enumerate() {
                if inp.is_empty() {
                    continue;
                }
                let Some(producer) = graph.get_producer(inp) else {
                    continue;
                };
                if !producer.is_op("Transpose") {
                    continue;
                }
                let Some(transpose_perm) = get_perm_attr_if_valid(producer) else {
                    continue;
                };
                let transpose_name = producer.name.clone();
                if process_transpose(
                    ctx,
                    graph,
                    &transpose_name,
                    name,
                    &transpose_perm,
                    j,
                    &outputs_leading_to_transpose,
                ) {
                    changed = true;
                    modified = true;
                    break;
                }
            }
            if !modified {
                break;
            }
        }
    }
    changed
}

/// Push, merge, and cancel `Transpose` nodes across the graph.
///
/// Returns whether anything changed. The graph's default-domain opset must be
/// within the supported window or the call is a no-op. With
/// `allow_extended_ops`, operators of the `com.microsoft` domain participate
/// and `MaxPool` may be specialised to its NHWC vendor variant.
pub fn optimize(graph: &mut Graph, allow_extended_ops: bool) -> bool {
    let Some(ctx) = make_optimizer_context(graph, allow_extended_ops) else {
        return false;
    };
    optimize_impl(&ctx, graph)
}
