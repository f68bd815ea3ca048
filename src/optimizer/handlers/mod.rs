//! Per-operator push handlers
//!
//! Handlers are called on nodes of a given op type with a `Transpose` on an
//! eligible input. A handler decides whether the push is legal, performs all
//! graph edits, and reports whether anything changed. Returning `false` is a
//! contract that the graph is untouched, so every check happens before the
//! first mutation.
//!
//! Opset matters: several operators moved parameters between attributes and
//! inputs across opset versions, and the handlers read the model opset to
//! pick the right form.

pub(crate) mod axis;
pub(crate) mod movement;
pub(crate) mod quant;
pub(crate) mod reduce;
pub(crate) mod shape;
pub(crate) mod simple;
pub(crate) mod transpose;

use crate::graph::Graph;
use crate::ir::Node;

use super::{HandlerArgs, OptimizerCtx};

/// Selects which input indices of a node are eligible for transposition.
/// Static for most operators; dynamic for broadcasting and quantized ops.
pub(crate) type TransposibleInputsFn = fn(&OptimizerCtx, &Graph, &Node) -> Vec<usize>;

/// The rewrite itself
pub(crate) type HandlerFn = fn(&mut HandlerArgs) -> bool;

/// One dispatch-table entry
#[derive(Clone, Copy)]
pub(crate) struct HandlerInfo {
    /// Which inputs the handler transposes
    pub transposible_inputs: TransposibleInputsFn,
    /// The rewrite
    pub handler: HandlerFn,
    /// Whether the handler transposes outputs; used by the cost model and
    /// the reverse-reachability pass
    pub transposes_outputs: bool,
}

fn all_inputs(_ctx: &OptimizerCtx, _graph: &Graph, node: &Node) -> Vec<usize> {
    (0..node.inputs.len()).collect()
}

fn first_input(_ctx: &OptimizerCtx, _graph: &Graph, _node: &Node) -> Vec<usize> {
    vec![0]
}

/// Inputs with a non-scalar (or unknown) shape; scalars are rank-invariant
/// under broadcasting and never need a transpose.
fn non_scalar_inputs(_ctx: &OptimizerCtx, graph: &Graph, node: &Node) -> Vec<usize> {
    node.inputs
        .iter()
        .enumerate()
        .filter(|(_, inp)| !inp.is_empty())
        .filter(|(_, inp)| graph.value_rank(inp).map(|r| r != 0).unwrap_or(true))
        .map(|(i, _)| i)
        .collect()
}

/// QLinearConcat inputs are `[Y_scale, Y_zp, X0, X0_scale, X0_zp, X1, ...]`;
/// the data tensors sit at 2, 5, 8, ...
fn qlinear_concat_inputs(_ctx: &OptimizerCtx, _graph: &Graph, node: &Node) -> Vec<usize> {
    (2..node.inputs.len()).step_by(3).collect()
}

/// QLinear binary inputs are `[A, A_scale, A_zp, B, B_scale, B_zp, C_scale,
/// C_zp]`; the data tensors are A and B.
fn qlinear_binary_inputs(_ctx: &OptimizerCtx, _graph: &Graph, _node: &Node) -> Vec<usize> {
    vec![0, 3]
}

const SIMPLE: HandlerInfo = HandlerInfo {
    transposible_inputs: all_inputs,
    handler: simple::handle_simple_node,
    transposes_outputs: true,
};

const BROADCAST: HandlerInfo = HandlerInfo {
    transposible_inputs: non_scalar_inputs,
    handler: simple::handle_simple_node_broadcast,
    transposes_outputs: true,
};

const FIRST_INPUT_ONLY: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: simple::handle_simple_node_1_inp,
    transposes_outputs: true,
};

const TRANSPOSE: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: transpose::handle_transpose,
    transposes_outputs: false,
};

const CONCAT: HandlerInfo = HandlerInfo {
    transposible_inputs: all_inputs,
    handler: axis::handle_concat,
    transposes_outputs: true,
};

const SPLIT: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: axis::handle_split,
    transposes_outputs: true,
};

const SOFT_HARD_MAX: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: axis::handle_soft_hard_max,
    transposes_outputs: true,
};

const SHAPE: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: shape::handle_shape,
    transposes_outputs: false,
};

const PAD: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: movement::handle_pad,
    transposes_outputs: true,
};

const REDUCE_OP: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: reduce::handle_reduce_op,
    transposes_outputs: true,
};

const REDUCE_SUM: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: reduce::handle_reduce_sum,
    transposes_outputs: true,
};

const ARG_MIN_MAX: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: axis::handle_arg_min_max,
    transposes_outputs: true,
};

const SQUEEZE: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: movement::handle_squeeze,
    transposes_outputs: true,
};

const UNSQUEEZE: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: movement::handle_unsqueeze,
    transposes_outputs: true,
};

const SLICE: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: movement::handle_slice,
    transposes_outputs: true,
};

const TILE: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: movement::handle_tile,
    transposes_outputs: true,
};

const QUANTIZE_DEQUANTIZE: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: axis::handle_quantize_dequantize_linear,
    transposes_outputs: true,
};

const QLINEAR_CONCAT: HandlerInfo = HandlerInfo {
    transposible_inputs: qlinear_concat_inputs,
    handler: quant::handle_qlinear_concat,
    transposes_outputs: true,
};

const QLINEAR_BINARY: HandlerInfo = HandlerInfo {
    transposible_inputs: qlinear_binary_inputs,
    handler: quant::handle_qlinear_binary,
    transposes_outputs: true,
};

const QLINEAR_POOL: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: quant::handle_qlinear_pool,
    transposes_outputs: true,
};

const MAX_POOL: HandlerInfo = HandlerInfo {
    transposible_inputs: first_input,
    handler: quant::handle_max_pool,
    transposes_outputs: true,
};

/// Default-domain handler table
fn standard_handler(op_type: &str) -> Option<HandlerInfo> {
    let info = match op_type {
        // Elementwise unary
        "Cast" | "Exp" | "Identity" | "LeakyRelu" | "Log" | "Reciprocal" | "Relu" | "Sigmoid"
        | "Sqrt" | "Tanh" | "Abs" | "Not" | "Ceil" | "Floor" | "Neg" | "Erf" | "HardSigmoid"
        | "Round" | "IsInf" | "IsNaN" | "Selu" | "Shrink" | "Sign" | "Softplus" | "Softsign"
        | "ThresholdedRelu" | "Celu" | "HardSwish" | "Sin" | "Cos" | "Tan" | "Sinh" | "Cosh"
        | "Asin" | "Acos" | "Atan" | "Asinh" | "Acosh" | "Atanh" => SIMPLE,

        // Broadcasting binary (and n-ary)
        "Add" | "Max" | "Min" | "Mul" | "Sub" | "Div" | "And" | "Or" | "Xor" | "Mod" | "PRelu"
        | "BitShift" | "Equal" | "Greater" | "Less" | "GreaterOrEqual" | "LessOrEqual" | "Mean"
        | "Sum" | "Pow" | "Where" => BROADCAST,

        "Clip" | "CastLike" => FIRST_INPUT_ONLY,

        "Transpose" => TRANSPOSE,
        "Concat" => CONCAT,
        "Split" => SPLIT,
        "Shape" => SHAPE,
        "Pad" => PAD,
        "ReduceSum" => REDUCE_SUM,

        "ReduceLogSum" | "ReduceLogSumExp" | "ReduceMax" | "ReduceMean" | "ReduceMin"
        | "ReduceProd" | "ReduceSumSquare" | "ReduceL1" | "ReduceL2" => REDUCE_OP,

        "ArgMin" | "ArgMax" => ARG_MIN_MAX,

        "Squeeze" => SQUEEZE,
        "Unsqueeze" => UNSQUEEZE,
        "Slice" => SLICE,
        "Tile" => TILE,

        "Softmax" | "Hardmax" | "LogSoftmax" => SOFT_HARD_MAX,

        "QuantizeLinear" | "DequantizeLinear" => QUANTIZE_DEQUANTIZE,

        _ => return None,
    };
    Some(info)
}

/// Extended handler table: vendor-domain operators plus the `MaxPool`
/// specialisation, consulted only when extended ops are allowed
fn extended_handler(key: &str) -> Option<HandlerInfo> {
    let info = match key {
        "com.microsoft.QLinearReduceMean" => REDUCE_OP,
        "com.microsoft.QLinearSigmoid" | "com.microsoft.QLinearLeakyRelu" => FIRST_INPUT_ONLY,
        "com.microsoft.QLinearConcat" => QLINEAR_CONCAT,
        "com.microsoft.QLinearAdd" | "com.microsoft.QLinearMul" => QLINEAR_BINARY,
        "com.microsoft.QLinearAveragePool" | "com.microsoft.QLinearGlobalAveragePool" => {
            QLINEAR_POOL
        }
        "MaxPool" => MAX_POOL,
        _ => return None,
    };
    Some(info)
}

/// Look up the handler for a node. Keys are the bare op type in the default
/// domain and `"com.microsoft." + op_type` in the vendor domain; other
/// domains have no handlers.
pub(crate) fn get_handler(node: &Node, allow_extended_ops: bool) -> Option<HandlerInfo> {
    let key = if node.is_default_domain() {
        node.op_type.clone()
    } else if node.domain == "com.microsoft" {
        format!("com.microsoft.{}", node.op_type)
    } else {
        return None;
    };

    if let Some(info) = standard_handler(&key) {
        return Some(info);
    }
    if allow_extended_ops {
        return extended_handler(&key);
    }
    None
}

/// Shared rewrite for plain pushes: optionally rank-normalize broadcastable
/// inputs, transpose the eligible inputs with `perm_inv`, transpose every
/// output with `perm`.
pub(crate) fn handle_simple_node_base(args: &mut HandlerArgs, broadcast_inputs: bool) -> bool {
    let rank = args.perm.len();
    let indices = args.transposible_inputs.clone();
    if broadcast_inputs
        && !super::edits::normalize_input_ranks(args.ctx, args.graph, &args.node, rank, &indices)
    {
        return false;
    }
    super::edits::transpose_inputs(args.ctx, args.graph, &args.node, &args.perm_inv, &indices);
    super::edits::transpose_outputs(args.ctx, args.graph, &args.node, &args.perm);
    true
}

/// Shared rewrite for axis-bearing pushes: validate and normalize `axis`,
/// push like a simple node, then renumber `axis` through `perm`.
pub(crate) fn handle_simple_node_with_axis(
    args: &mut HandlerArgs,
    has_default: bool,
    default_axis: i64,
) -> bool {
    let rank = args.perm.len();
    let axis = match args.graph.get_node(&args.node).and_then(|n| n.attr_int("axis")) {
        Some(axis) => axis,
        None if has_default => default_axis,
        None => return false,
    };
    let Some(axis) = crate::perm::normalize_axis(axis, rank) else {
        return false;
    };
    if !handle_simple_node_base(args, false) {
        return false;
    }
    let new_axis = args.perm[axis as usize];
    if let Some(node) = args.graph.get_node_mut(&args.node) {
        node.set_attr_int("axis", new_axis);
    }
    true
}
