//! Handlers for elementwise and broadcasting operators

use super::{handle_simple_node_base, HandlerArgs};

/// Transposes all inputs and all outputs
pub(crate) fn handle_simple_node(args: &mut HandlerArgs) -> bool {
    handle_simple_node_base(args, false)
}

/// Broadcasting n-ary operator: rank-normalize the non-scalar inputs before
/// transposing them
pub(crate) fn handle_simple_node_broadcast(args: &mut HandlerArgs) -> bool {
    handle_simple_node_base(args, true)
}

/// Operators where only the first input carries the tensor layout
/// (`Clip` min/max and `CastLike`'s target stay untouched)
pub(crate) fn handle_simple_node_1_inp(args: &mut HandlerArgs) -> bool {
    handle_simple_node_base(args, false)
}
