//! End-to-end optimizer scenarios

use crate::graph::{f32_info, Graph};
use crate::ir::{Attribute, DataType, Dim, Node, Tensor, ValueInfo};
use crate::layout::{channel_first_to_last, channel_last_to_first, LayoutPolicyMap, LayoutPolicyResult};
use crate::optimizer::optimize;

fn transpose_node(name: &str, input: &str, output: &str, perm: &[i64]) -> Node {
    Node::new("Transpose", &[input], &[output], name)
        .with_attr(Attribute::ints("perm", perm.to_vec()))
}

fn count_ops(graph: &Graph, op_type: &str) -> usize {
    graph.nodes().filter(|n| n.op_type == op_type).count()
}

fn find_op<'g>(graph: &'g Graph, op_type: &str) -> &'g Node {
    graph
        .nodes()
        .find(|n| n.op_type == op_type)
        .unwrap_or_else(|| panic!("no {op_type} node in graph"))
}

#[test]
fn cancellation_at_graph_boundaries_uses_identity() {
    // x -> Transpose([2,0,1]) -> Transpose([1,2,0]) -> y with x a graph input
    // and y a graph output: neither endpoint name can be dropped.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[2, 3, 4]));
    g.push_node(transpose_node("t0", "x", "mid", &[2, 0, 1]));
    g.push_node(transpose_node("t1", "mid", "y", &[1, 2, 0]));
    g.set_value_info(f32_info("mid", &[4, 2, 3]));

    assert!(optimize(&mut g, false));

    assert_eq!(count_ops(&g, "Transpose"), 0);
    let identity = find_op(&g, "Identity");
    assert_eq!(identity.inputs, vec!["x"]);
    assert_eq!(identity.outputs, vec!["y"]);
    assert_eq!(g.node_count(), 1);
}

#[test]
fn cancellation_renames_parent_output() {
    // With a producing node above the pair, the graph-output name moves onto
    // the parent and both transposes disappear.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[2, 3, 4]));
    g.push_node(Node::new("Relu", &["x"], &["r"], "relu_0"));
    g.push_node(transpose_node("t0", "r", "mid", &[2, 0, 1]));
    g.push_node(transpose_node("t1", "mid", "y", &[1, 2, 0]));

    assert!(optimize(&mut g, false));

    assert_eq!(g.node_count(), 1);
    let relu = find_op(&g, "Relu");
    assert_eq!(relu.inputs, vec!["x"]);
    assert_eq!(relu.outputs, vec!["y"]);
}

#[test]
fn fusion_composes_perms() {
    // Transpose([1,0,2]) -> Transpose([2,1,0]) fuses to Transpose([2,0,1]).
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[4, 2, 3]));
    g.push_node(transpose_node("t0", "x", "mid", &[1, 0, 2]));
    g.push_node(transpose_node("t1", "mid", "y", &[2, 1, 0]));

    assert!(optimize(&mut g, false));

    assert_eq!(g.node_count(), 1);
    let t = find_op(&g, "Transpose");
    assert_eq!(t.attr_ints("perm"), Some(&[2, 0, 1][..]));
    assert_eq!(t.inputs, vec!["x"]);
    assert_eq!(t.outputs, vec!["y"]);
}

#[test]
fn elementwise_push_moves_transpose_past_relu() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[1, 8, 8, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new("Relu", &["xt"], &["y"], "relu_0"));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    assert!(g.get_node("t0").is_none());
    let relu = find_op(&g, "Relu");
    assert_eq!(relu.inputs, vec!["x"]);

    let t_name = g.get_producer_name("y").unwrap().to_string();
    let t = g.get_node(&t_name).unwrap();
    assert!(t.is_op("Transpose"));
    assert_eq!(t.attr_ints("perm"), Some(&[0, 2, 3, 1][..]));
    assert_eq!(t.inputs[0], relu.outputs[0]);
    // The internal output carries the un-permuted shape.
    let internal = g.value_shape(&relu.outputs[0].clone()).unwrap();
    assert_eq!(
        internal,
        &[Dim::Fixed(1), Dim::Fixed(3), Dim::Fixed(8), Dim::Fixed(8)]
    );

    // A second run finds nothing to do.
    assert!(!optimize(&mut g, false));
}

#[test]
fn broadcast_push_normalizes_ranks() {
    // Add(Transpose(a, [0,2,3,1]), b) with b: f32[8,4] — b is unsqueezed to
    // rank 4, transposed by the inverse perm, and the sum re-transposed.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("a", &[1, 4, 8, 8]));
    g.add_graph_input(f32_info("b", &[8, 4]));
    g.add_graph_output(f32_info("y", &[1, 8, 8, 4]));
    g.push_node(transpose_node("t0", "a", "at", &[0, 2, 3, 1]));
    g.push_node(Node::new("Add", &["at", "b"], &["y"], "add_0"));
    g.set_value_info(f32_info("at", &[1, 8, 8, 4]));

    assert!(optimize(&mut g, false));

    assert!(g.get_node("t0").is_none());
    let add = find_op(&g, "Add");
    assert_eq!(add.inputs[0], "a");

    // b side: Unsqueeze then Transpose([0,3,1,2]).
    let b_t_name = g.get_producer_name(&add.inputs[1].clone()).unwrap().to_string();
    let b_t = g.get_node(&b_t_name).unwrap();
    assert!(b_t.is_op("Transpose"));
    assert_eq!(b_t.attr_ints("perm"), Some(&[0, 3, 1, 2][..]));
    let unsq = g.get_producer(&b_t.inputs[0].clone()).unwrap();
    assert!(unsq.is_op("Unsqueeze"));
    assert_eq!(
        g.value_shape(&b_t.outputs[0].clone()).unwrap(),
        &[Dim::Fixed(1), Dim::Fixed(4), Dim::Fixed(1), Dim::Fixed(8)]
    );

    // Output side: the sum feeds Transpose([0,2,3,1]) -> y.
    let y_t = g.get_producer("y").unwrap();
    assert!(y_t.is_op("Transpose"));
    assert_eq!(y_t.attr_ints("perm"), Some(&[0, 2, 3, 1][..]));
    assert_eq!(y_t.inputs[0], add.outputs[0]);
}

#[test]
fn reduction_with_keepdims_zero_squeezes_output_perm() {
    // ReduceMean(Transpose(x, [0,3,1,2]), axes=[2], keepdims=0):
    // axes become [1] and the output perm squeezes to [0,2,1].
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4, 5]));
    g.add_graph_output(f32_info("y", &[2, 5, 4]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(
        Node::new("ReduceMean", &["xt"], &["y"], "rm_0")
            .with_attr(Attribute::ints("axes", vec![2]))
            .with_attr(Attribute::int("keepdims", 0)),
    );
    g.set_value_info(f32_info("xt", &[2, 5, 3, 4]));

    assert!(optimize(&mut g, false));

    assert!(g.get_node("t0").is_none());
    let rm = find_op(&g, "ReduceMean");
    assert_eq!(rm.inputs, vec!["x"]);
    assert_eq!(rm.attr_ints("axes"), Some(&[1][..]));

    let y_t = g.get_producer("y").unwrap();
    assert!(y_t.is_op("Transpose"));
    assert_eq!(y_t.attr_ints("perm"), Some(&[0, 2, 1][..]));
    assert_eq!(
        g.value_shape(&rm.outputs[0].clone()).unwrap(),
        &[Dim::Fixed(2), Dim::Fixed(4), Dim::Fixed(5)]
    );
}

#[test]
fn shape_becomes_gather_of_shape() {
    // Shape(Transpose(x, perm)) => Gather(Shape(x), perm), no transposes left.
    let mut g = Graph::new(13);
    g.add_graph_input(ValueInfo {
        name: "x".to_string(),
        dtype: DataType::Float,
        shape: Some(vec![
            Dim::Param("A".to_string()),
            Dim::Param("B".to_string()),
            Dim::Param("C".to_string()),
            Dim::Param("D".to_string()),
        ]),
    });
    g.add_graph_output(ValueInfo::new("y", DataType::Int64, &[4]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(Node::new("Shape", &["xt"], &["y"], "shape_0"));

    assert!(optimize(&mut g, false));

    assert_eq!(count_ops(&g, "Transpose"), 0);
    let shape = find_op(&g, "Shape");
    assert_eq!(shape.inputs, vec!["x"]);

    let gather = g.get_producer("y").unwrap();
    assert!(gather.is_op("Gather"));
    assert_eq!(gather.attr_int("axis"), Some(0));
    assert_eq!(gather.inputs[0], shape.outputs[0]);
    let indices = g.get_constant(&gather.inputs[1].clone()).unwrap();
    assert_eq!(indices.int_data(), Some(vec![0, 3, 1, 2]));
}

#[test]
fn shape_with_window_restricts_gather_indices() {
    let mut g = Graph::new(15);
    g.add_graph_input(f32_info("x", &[2, 3, 4, 5]));
    g.add_graph_output(ValueInfo::new("y", DataType::Int64, &[3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(
        Node::new("Shape", &["xt"], &["y"], "shape_0")
            .with_attr(Attribute::int("start", 1))
            .with_attr(Attribute::int("end", 4)),
    );
    g.set_value_info(f32_info("xt", &[2, 5, 3, 4]));

    assert!(optimize(&mut g, false));

    let shape = find_op(&g, "Shape");
    assert_eq!(shape.inputs, vec!["x"]);
    assert!(!shape.has_attr("start"));
    assert!(!shape.has_attr("end"));
    // The un-windowed Shape now emits the full rank-4 vector.
    assert_eq!(
        g.value_shape(&shape.outputs[0].clone()).unwrap(),
        &[Dim::Fixed(4)]
    );

    let gather = g.get_producer("y").unwrap();
    let indices = g.get_constant(&gather.inputs[1].clone()).unwrap();
    assert_eq!(indices.int_data(), Some(vec![3, 1, 2]));
}

#[test]
fn pad_below_opset_11_permutes_attribute() {
    let mut g = Graph::new(10);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[5, 14, 16, 13]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(
        Node::new("Pad", &["xt"], &["y"], "pad_0")
            .with_attr(Attribute::ints("pads", vec![0, 1, 2, 3, 4, 5, 6, 7])),
    );
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let pad = find_op(&g, "Pad");
    assert_eq!(pad.inputs[0], "x");
    // permute_pads(pads, perm_inv = [0,3,1,2])
    assert_eq!(
        pad.attr_ints("pads"),
        Some(&[0, 3, 1, 2, 4, 7, 5, 6][..])
    );
    let y_t = g.get_producer("y").unwrap();
    assert_eq!(y_t.attr_ints("perm"), Some(&[0, 2, 3, 1][..]));
}

#[test]
fn pad_constant_pads_input_is_rewritten() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[5, 14, 16, 13]));
    g.add_initializer(Tensor::from_i64s("pads", vec![0, 1, 2, 3, 4, 5, 6, 7]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new("Pad", &["xt", "pads"], &["y"], "pad_0"));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let pad = find_op(&g, "Pad");
    assert_eq!(pad.inputs[0], "x");
    assert_ne!(pad.inputs[1], "pads");
    let new_pads = g.get_constant(&pad.inputs[1].clone()).unwrap();
    assert_eq!(new_pads.int_data(), Some(vec![0, 3, 1, 2, 4, 7, 5, 6]));
    // The original pads initializer became dead and was dropped.
    assert!(g.get_initializer("pads").is_none());
}

#[test]
fn pad_computed_pads_input_gets_gather() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_input(ValueInfo::new("pads_in", DataType::Int64, &[8]));
    g.add_graph_output(f32_info("y", &[5, 14, 16, 13]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new("Pad", &["xt", "pads_in"], &["y"], "pad_0"));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let pad = find_op(&g, "Pad");
    let gather = g.get_producer(&pad.inputs[1].clone()).unwrap();
    assert!(gather.is_op("Gather"));
    assert_eq!(gather.attr_int("axis"), Some(0));
    assert_eq!(gather.inputs[0], "pads_in");
    let indices = g.get_constant(&gather.inputs[1].clone()).unwrap();
    assert_eq!(indices.int_data(), Some(vec![0, 3, 1, 2, 4, 7, 5, 6]));
}

#[test]
fn slice_below_opset_10_rewrites_axes_attribute() {
    let mut g = Graph::new(9);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[1, 4, 4, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(
        Node::new("Slice", &["xt"], &["y"], "slice_0")
            .with_attr(Attribute::ints("starts", vec![0, 0]))
            .with_attr(Attribute::ints("ends", vec![4, 4]))
            .with_attr(Attribute::ints("axes", vec![1, 2])),
    );
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let slice = find_op(&g, "Slice");
    assert_eq!(slice.inputs[0], "x");
    // Order preserved: axes align with starts/ends.
    assert_eq!(slice.attr_ints("axes"), Some(&[2, 3][..]));
}

#[test]
fn slice_below_opset_10_derives_default_axes() {
    let mut g = Graph::new(9);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[1, 4, 8, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(
        Node::new("Slice", &["xt"], &["y"], "slice_0")
            .with_attr(Attribute::ints("starts", vec![0, 0]))
            .with_attr(Attribute::ints("ends", vec![1, 4])),
    );
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let slice = find_op(&g, "Slice");
    assert_eq!(slice.attr_ints("axes"), Some(&[0, 2][..]));
}

#[test]
fn slice_opset_13_rewrites_constant_axes_matching_dtype() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[1, 4, 4, 3]));
    g.add_initializer(Tensor::from_i64s("starts", vec![0, 0]));
    g.add_initializer(Tensor::from_i64s("ends", vec![4, 4]));
    g.add_initializer(Tensor::from_i32s("axes", vec![1, -2]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new(
        "Slice",
        &["xt", "starts", "ends", "axes"],
        &["y"],
        "slice_0",
    ));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let slice = find_op(&g, "Slice");
    assert_eq!(slice.inputs[0], "x");
    let new_axes = g.get_constant(&slice.inputs[3].clone()).unwrap();
    // [1, -2] normalizes to [1, 2] and maps through the perm to [2, 3],
    // staying int32.
    assert_eq!(new_axes.dtype(), DataType::Int32);
    assert_eq!(new_axes.int_data(), Some(vec![2, 3]));
    assert!(g.get_initializer("axes").is_none());
}

#[test]
fn slice_opset_13_derives_axes_from_starts_shape() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_input(ValueInfo::new("starts", DataType::Int64, &[2]));
    g.add_graph_input(ValueInfo::new("ends", DataType::Int64, &[2]));
    g.add_graph_output(f32_info("y", &[1, 4, 8, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new("Slice", &["xt", "starts", "ends"], &["y"], "slice_0"));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let slice = find_op(&g, "Slice");
    assert_eq!(slice.inputs.len(), 4);
    let axes = g.get_constant(&slice.inputs[3].clone()).unwrap();
    // Defaults [0, 1] map to perm[0..2] = [0, 2].
    assert_eq!(axes.int_data(), Some(vec![0, 2]));
}

#[test]
fn slice_with_computed_axes_is_left_alone() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_input(ValueInfo::new("starts", DataType::Int64, &[2]));
    g.add_graph_input(ValueInfo::new("ends", DataType::Int64, &[2]));
    g.add_graph_input(ValueInfo::new("axes_in", DataType::Int64, &[2]));
    g.add_graph_output(f32_info("y", &[1, 4, 8, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new(
        "Slice",
        &["xt", "starts", "ends", "axes_in"],
        &["y"],
        "slice_0",
    ));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(!optimize(&mut g, false));
    assert!(g.get_node("t0").is_some());
    assert_eq!(find_op(&g, "Slice").inputs[0], "xt");
}

#[test]
fn tile_permutes_constant_repeats() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[1, 16, 24, 12]));
    g.add_initializer(Tensor::from_i64s("repeats", vec![1, 2, 3, 4]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new("Tile", &["xt", "repeats"], &["y"], "tile_0"));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let tile = find_op(&g, "Tile");
    assert_eq!(tile.inputs[0], "x");
    let new_repeats = g.get_constant(&tile.inputs[1].clone()).unwrap();
    // repeats[perm_inv[i]] with perm_inv = [0,3,1,2]
    assert_eq!(new_repeats.int_data(), Some(vec![1, 4, 2, 3]));
    assert!(g.get_initializer("repeats").is_none());
}

#[test]
fn tile_computed_repeats_gets_gather() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_input(ValueInfo::new("reps", DataType::Int64, &[4]));
    g.add_graph_output(f32_info("y", &[1, 16, 24, 12]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(Node::new("Tile", &["xt", "reps"], &["y"], "tile_0"));
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let tile = find_op(&g, "Tile");
    let gather = g.get_producer(&tile.inputs[1].clone()).unwrap();
    assert!(gather.is_op("Gather"));
    assert_eq!(gather.inputs[0], "reps");
    let indices = g.get_constant(&gather.inputs[1].clone()).unwrap();
    assert_eq!(indices.int_data(), Some(vec![0, 3, 1, 2]));
}

#[test]
fn squeeze_sorts_permuted_axes() {
    // Squeeze(Transpose(x, [3,0,1,2]), axes=[0,2]) becomes
    // Squeeze(x, axes=[1,3]) with no output transpose (the residual perm is
    // the identity).
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 1, 3, 1]));
    g.add_graph_output(f32_info("y", &[2, 3]));
    let axes = g.add_initializer_i64(vec![2], vec![0, 2]);
    g.push_node(transpose_node("t0", "x", "xt", &[3, 0, 1, 2]));
    g.push_node(Node::new("Squeeze", &["xt", axes.as_str()], &["y"], "sq_0"));
    g.set_value_info(f32_info("xt", &[1, 2, 1, 3]));

    assert!(optimize(&mut g, false));

    assert_eq!(count_ops(&g, "Transpose"), 0);
    let sq = find_op(&g, "Squeeze");
    assert_eq!(sq.inputs[0], "x");
    assert_eq!(sq.outputs, vec!["y"]);
    let new_axes = g.get_constant(&sq.inputs[1].clone()).unwrap();
    assert_eq!(new_axes.int_data(), Some(vec![1, 3]));
}

#[test]
fn unsqueeze_keeps_axes_and_grows_output_perm() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3]));
    g.add_graph_output(f32_info("y", &[1, 3, 2]));
    let axes = g.add_initializer_i64(vec![1], vec![0]);
    g.push_node(transpose_node("t0", "x", "xt", &[1, 0]));
    g.push_node(Node::new(
        "Unsqueeze",
        &["xt", axes.as_str()],
        &["y"],
        "unsq_0",
    ));
    g.set_value_info(f32_info("xt", &[3, 2]));

    assert!(optimize(&mut g, false));

    let unsq = find_op(&g, "Unsqueeze");
    assert_eq!(unsq.inputs[0], "x");
    let y_t = g.get_producer("y").unwrap();
    assert!(y_t.is_op("Transpose"));
    assert_eq!(y_t.attr_ints("perm"), Some(&[0, 2, 1][..]));
    assert_eq!(
        g.value_shape(&unsq.outputs[0].clone()).unwrap(),
        &[Dim::Fixed(1), Dim::Fixed(2), Dim::Fixed(3)]
    );
}

#[test]
fn concat_renumbers_axis_and_absorbs_both_transposes() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("a", &[2, 3]));
    g.add_graph_input(f32_info("b", &[2, 3]));
    g.add_graph_output(f32_info("y", &[6, 2]));
    g.push_node(transpose_node("t0", "a", "at", &[1, 0]));
    g.push_node(transpose_node("t1", "b", "bt", &[1, 0]));
    g.push_node(
        Node::new("Concat", &["at", "bt"], &["y"], "concat_0")
            .with_attr(Attribute::int("axis", 0)),
    );
    g.set_value_info(f32_info("at", &[3, 2]));
    g.set_value_info(f32_info("bt", &[3, 2]));

    assert!(optimize(&mut g, false));

    let concat = find_op(&g, "Concat");
    assert_eq!(concat.inputs, vec!["a", "b"]);
    assert_eq!(concat.attr_int("axis"), Some(1));
    assert!(g.get_node("t0").is_none());
    assert!(g.get_node("t1").is_none());
    let y_t = g.get_producer("y").unwrap();
    assert_eq!(y_t.attr_ints("perm"), Some(&[1, 0][..]));
}

#[test]
fn concat_with_mixed_inputs_fails_cost_gate() {
    // One cancelling transpose and one plain input: the push would trade one
    // transpose for another, so nothing happens.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("a", &[2, 3]));
    g.add_graph_input(f32_info("c", &[3, 2]));
    g.add_graph_output(f32_info("y", &[6, 2]));
    g.push_node(transpose_node("t0", "a", "at", &[1, 0]));
    g.push_node(
        Node::new("Concat", &["at", "c"], &["y"], "concat_0")
            .with_attr(Attribute::int("axis", 0)),
    );
    g.set_value_info(f32_info("at", &[3, 2]));

    assert!(!optimize(&mut g, false));
    assert!(g.get_node("t0").is_some());
    assert_eq!(find_op(&g, "Concat").inputs, vec!["at", "c"]);
}

#[test]
fn softmax_opset_13_uses_default_axis() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[4, 2, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[2, 0, 1]));
    g.push_node(Node::new("Softmax", &["xt"], &["y"], "sm_0"));
    g.set_value_info(f32_info("xt", &[4, 2, 3]));

    assert!(optimize(&mut g, false));

    let sm = find_op(&g, "Softmax");
    assert_eq!(sm.inputs, vec!["x"]);
    // Default axis -1 normalizes to 2 and maps through perm [2,0,1] to 1.
    assert_eq!(sm.attr_int("axis"), Some(1));
}

#[test]
fn softmax_below_13_pushes_only_when_split_is_respected() {
    // perm [0,2,1] keeps every axis on its side of the axis-1 split.
    let mut g = Graph::new(12);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[2, 4, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 1]));
    g.push_node(
        Node::new("Softmax", &["xt"], &["y"], "sm_0").with_attr(Attribute::int("axis", 1)),
    );
    g.set_value_info(f32_info("xt", &[2, 4, 3]));

    assert!(optimize(&mut g, false));
    let sm = find_op(&g, "Softmax");
    assert_eq!(sm.inputs, vec!["x"]);
    // The coercion split point is untouched.
    assert_eq!(sm.attr_int("axis"), Some(1));
}

#[test]
fn softmax_below_13_blocks_cross_split_perms() {
    // perm [1,0,2] moves axis 0 across the axis-1 split.
    let mut g = Graph::new(12);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[3, 2, 4]));
    g.push_node(transpose_node("t0", "x", "xt", &[1, 0, 2]));
    g.push_node(
        Node::new("Softmax", &["xt"], &["y"], "sm_0").with_attr(Attribute::int("axis", 1)),
    );
    g.set_value_info(f32_info("xt", &[3, 2, 4]));

    assert!(!optimize(&mut g, false));
    assert_eq!(find_op(&g, "Softmax").inputs, vec!["xt"]);
}

#[test]
fn reduce_sum_opset_13_rewrites_constant_axes_input() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4, 5]));
    g.add_graph_output(f32_info("y", &[2, 5, 4]));
    let axes = g.add_initializer_i64(vec![1], vec![2]);
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(
        Node::new("ReduceSum", &["xt", axes.as_str()], &["y"], "rs_0")
            .with_attr(Attribute::int("keepdims", 0)),
    );
    g.set_value_info(f32_info("xt", &[2, 5, 3, 4]));

    assert!(optimize(&mut g, false));

    let rs = find_op(&g, "ReduceSum");
    assert_eq!(rs.inputs[0], "x");
    let new_axes = g.get_constant(&rs.inputs[1].clone()).unwrap();
    assert_eq!(new_axes.int_data(), Some(vec![1]));
    assert!(g.get_initializer(&axes).is_none());
    let y_t = g.get_producer("y").unwrap();
    assert_eq!(y_t.attr_ints("perm"), Some(&[0, 2, 1][..]));
}

#[test]
fn reduce_sum_with_computed_axes_bails_out() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4, 5]));
    g.add_graph_input(ValueInfo::new("axes_in", DataType::Int64, &[1]));
    g.add_graph_output(f32_info("y", &[2, 5, 4]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(
        Node::new("ReduceSum", &["xt", "axes_in"], &["y"], "rs_0")
            .with_attr(Attribute::int("keepdims", 0)),
    );
    g.set_value_info(f32_info("xt", &[2, 5, 3, 4]));

    assert!(!optimize(&mut g, false));
    assert_eq!(find_op(&g, "ReduceSum").inputs[0], "xt");
}

#[test]
fn reduce_sum_empty_axes_keeps_rank_only_when_kept() {
    // keepdims=1: the reduce-all output keeps its rank and gets re-transposed.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[1, 1, 1]));
    g.push_node(transpose_node("t0", "x", "xt", &[2, 0, 1]));
    g.push_node(Node::new("ReduceSum", &["xt"], &["y"], "rs_0"));
    g.set_value_info(f32_info("xt", &[4, 2, 3]));

    assert!(optimize(&mut g, false));
    assert_eq!(find_op(&g, "ReduceSum").inputs, vec!["x"]);
    assert!(g.get_producer("y").unwrap().is_op("Transpose"));

    // keepdims=0: the scalar output needs no transpose at all.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(f32_info("y", &[]));
    g.push_node(transpose_node("t0", "x", "xt", &[2, 0, 1]));
    g.push_node(
        Node::new("ReduceSum", &["xt"], &["y"], "rs_0")
            .with_attr(Attribute::int("keepdims", 0)),
    );
    g.set_value_info(f32_info("xt", &[4, 2, 3]));

    assert!(optimize(&mut g, false));
    let rs = find_op(&g, "ReduceSum");
    assert_eq!(rs.inputs, vec!["x"]);
    assert_eq!(rs.outputs, vec!["y"]);
    assert_eq!(count_ops(&g, "Transpose"), 0);
}

#[test]
fn argmax_squeezes_output_perm_when_keepdims_zero() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3, 4]));
    g.add_graph_output(ValueInfo::new("y", DataType::Int64, &[2, 3]));
    g.push_node(transpose_node("t0", "x", "xt", &[2, 0, 1]));
    g.push_node(
        Node::new("ArgMax", &["xt"], &["y"], "am_0")
            .with_attr(Attribute::int("axis", 0))
            .with_attr(Attribute::int("keepdims", 0)),
    );
    g.set_value_info(f32_info("xt", &[4, 2, 3]));

    assert!(optimize(&mut g, false));

    let am = find_op(&g, "ArgMax");
    assert_eq!(am.inputs, vec!["x"]);
    assert_eq!(am.attr_int("axis"), Some(2));
    // squeeze_perm([2], [2,0,1]) is the identity: no output transpose.
    assert_eq!(am.outputs, vec!["y"]);
    assert_eq!(count_ops(&g, "Transpose"), 0);
}

#[test]
fn quantize_linear_renumbers_axis_for_per_axis_scale() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(ValueInfo::new("y", DataType::Uint8, &[1, 8, 8, 3]));
    g.add_initializer(Tensor::from_f32s("scale", vec![3], vec![0.1, 0.2, 0.3]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 2, 3, 1]));
    g.push_node(
        Node::new("QuantizeLinear", &["xt", "scale"], &["y"], "q_0")
            .with_attr(Attribute::int("axis", 3)),
    );
    g.set_value_info(f32_info("xt", &[1, 8, 8, 3]));

    assert!(optimize(&mut g, false));

    let q = find_op(&g, "QuantizeLinear");
    assert_eq!(q.inputs[0], "x");
    assert_eq!(q.attr_int("axis"), Some(1));
    assert!(g.get_producer("y").unwrap().is_op("Transpose"));
}

#[test]
fn qlinear_add_transposes_both_data_tensors() {
    let mut g = Graph::new(13);
    g.set_opset("com.microsoft", 1);
    g.add_graph_input(f32_info("a", &[1, 4, 8, 8]));
    g.add_graph_output(ValueInfo::new("y", DataType::Uint8, &[1, 8, 8, 4]));
    g.add_initializer(Tensor::from_f32s("a_s", vec![], vec![0.1]));
    g.add_initializer(Tensor::from_f32s("b_s", vec![], vec![0.1]));
    g.add_initializer(Tensor::from_f32s("c_s", vec![], vec![0.1]));
    g.add_initializer(Tensor {
        name: "b".to_string(),
        dims: vec![1, 8, 8, 4],
        data: crate::ir::TensorData::U8(vec![0; 256]),
    });
    g.push_node(transpose_node("t0", "a", "at", &[0, 2, 3, 1]));
    g.push_node(
        Node::new(
            "QLinearAdd",
            &["at", "a_s", "a_zp", "b", "b_s", "b_zp", "c_s", "c_zp"],
            &["y"],
            "qadd_0",
        )
        .with_domain("com.microsoft"),
    );
    g.set_value_info(f32_info("at", &[1, 8, 8, 4]));

    assert!(optimize(&mut g, true));

    let qadd = find_op(&g, "QLinearAdd");
    assert_eq!(qadd.inputs[0], "a");
    // The constant data tensor was transposed in place by the inverse perm.
    assert_eq!(g.get_initializer("b").unwrap().dims, vec![1, 4, 8, 8]);
    let y_t = g.get_producer("y").unwrap();
    assert_eq!(y_t.attr_ints("perm"), Some(&[0, 2, 3, 1][..]));
}

#[test]
fn qlinear_pool_flips_channels_last() {
    let mut g = Graph::new(13);
    g.set_opset("com.microsoft", 1);
    g.add_graph_input(f32_info("x", &[1, 8, 8, 3]));
    g.add_graph_output(ValueInfo::new("y", DataType::Uint8, &[1, 3, 1, 1]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(
        Node::new("QLinearGlobalAveragePool", &["xt"], &["y"], "pool_0")
            .with_domain("com.microsoft")
            .with_attr(Attribute::int("channels_last", 0)),
    );
    g.set_value_info(f32_info("xt", &[1, 3, 8, 8]));

    assert!(optimize(&mut g, true));

    let pool = find_op(&g, "QLinearGlobalAveragePool");
    assert_eq!(pool.inputs, vec!["x"]);
    assert_eq!(pool.attr_int("channels_last"), Some(1));
    assert!(g.get_producer("y").unwrap().is_op("Transpose"));
}

#[test]
fn maxpool_specialises_to_nhwc_variant() {
    let mut g = Graph::new(13);
    g.set_opset("com.microsoft", 1);
    g.add_graph_input(ValueInfo::new("x", DataType::Uint8, &[1, 8, 8, 3]));
    g.add_graph_output(ValueInfo::new("y", DataType::Uint8, &[1, 3, 7, 7]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(
        Node::new("MaxPool", &["xt"], &["y"], "mp_0")
            .with_attr(Attribute::ints("kernel_shape", vec![2, 2]))
            .with_attr(Attribute::int("storage_order", 0)),
    );
    g.set_value_info(ValueInfo::new("xt", DataType::Uint8, &[1, 3, 8, 8]));

    assert!(optimize(&mut g, true));

    assert_eq!(count_ops(&g, "MaxPool"), 0);
    let nhwc = find_op(&g, "NhwcMaxPool");
    assert_eq!(nhwc.domain, "com.microsoft");
    assert_eq!(nhwc.inputs, vec!["x"]);
    assert_eq!(nhwc.attr_ints("kernel_shape"), Some(&[2, 2][..]));
    assert!(!nhwc.has_attr("storage_order"));
    let y_t = g.get_producer("y").unwrap();
    assert!(y_t.is_op("Transpose"));
    assert_eq!(y_t.attr_ints("perm"), Some(&[0, 3, 1, 2][..]));
}

#[test]
fn maxpool_with_float_output_is_not_specialised() {
    let mut g = Graph::new(13);
    g.set_opset("com.microsoft", 1);
    g.add_graph_input(f32_info("x", &[1, 8, 8, 3]));
    g.add_graph_output(f32_info("y", &[1, 3, 7, 7]));
    g.push_node(transpose_node("t0", "x", "xt", &[0, 3, 1, 2]));
    g.push_node(
        Node::new("MaxPool", &["xt"], &["y"], "mp_0")
            .with_attr(Attribute::ints("kernel_shape", vec![2, 2])),
    );
    g.set_value_info(f32_info("xt", &[1, 3, 8, 8]));

    assert!(!optimize(&mut g, true));
    assert_eq!(count_ops(&g, "MaxPool"), 1);
}

#[test]
fn clip_extra_inputs_are_not_eligible() {
    // A transpose on Clip's min input is not pushable.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3]));
    g.add_graph_input(f32_info("m", &[2, 3]));
    g.add_graph_output(f32_info("y", &[2, 3]));
    g.push_node(transpose_node("t0", "m", "mt", &[1, 0]));
    g.push_node(Node::new("Clip", &["x", "mt"], &["y"], "clip_0"));
    g.set_value_info(f32_info("mt", &[3, 2]));

    assert!(!optimize(&mut g, false));
}

#[test]
fn unsupported_opset_is_a_no_op() {
    for opset in [8, 18] {
        let mut g = Graph::new(opset);
        g.add_graph_input(f32_info("x", &[2, 3]));
        g.add_graph_output(f32_info("y", &[2, 3]));
        g.push_node(transpose_node("t0", "x", "mid", &[1, 0]));
        g.push_node(transpose_node("t1", "mid", "y", &[1, 0]));
        assert!(!optimize(&mut g, false));
        assert_eq!(g.node_count(), 2);
    }

    // Missing opset entirely.
    let mut g = Graph::default();
    g.push_node(transpose_node("t0", "x", "y", &[1, 0]));
    assert!(!optimize(&mut g, false));
}

#[test]
fn graph_without_transposes_is_untouched() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3]));
    g.add_graph_output(f32_info("y", &[2, 3]));
    g.push_node(Node::new("Relu", &["x"], &["r"], "relu_0"));
    g.push_node(Node::new("Sigmoid", &["r"], &["y"], "sig_0"));

    assert!(!optimize(&mut g, false));
    assert_eq!(g.node_count(), 2);
}

#[test]
fn malformed_perm_attribute_blocks_push() {
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3]));
    g.add_graph_output(f32_info("y", &[3, 2]));
    g.push_node(transpose_node("t0", "x", "xt", &[1, 1]));
    g.push_node(Node::new("Relu", &["xt"], &["y"], "relu_0"));

    assert!(!optimize(&mut g, false));
}

#[test]
fn shared_initializer_consumers_get_compensation() {
    // Add absorbs the transpose into the shared initializer; Mul still needs
    // the original layout and receives an inverse transpose.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[2, 3]));
    g.add_graph_output(f32_info("y", &[3, 2]));
    g.add_graph_output(f32_info("z", &[3, 2]));
    g.add_initializer(Tensor::from_f32s(
        "w",
        vec![3, 2],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    ));
    g.push_node(transpose_node("t0", "x", "xt", &[1, 0]));
    g.push_node(Node::new("Add", &["xt", "w"], &["y"], "add_0"));
    g.push_node(Node::new("Mul", &["w", "w2"], &["z"], "mul_0"));
    g.add_graph_input(f32_info("w2", &[3, 2]));
    g.set_value_info(f32_info("xt", &[3, 2]));

    assert!(optimize(&mut g, false));

    // w now carries the layout Add wants.
    assert_eq!(g.get_initializer("w").unwrap().dims, vec![2, 3]);
    let add = find_op(&g, "Add");
    assert_eq!(add.inputs, vec!["x", "w"]);

    // Mul reads w through a compensating transpose.
    let mul = find_op(&g, "Mul");
    let comp = g.get_producer(&mul.inputs[0].clone()).unwrap();
    assert!(comp.is_op("Transpose"));
    assert_eq!(comp.inputs, vec!["w"]);
}

#[test]
fn layout_change_wraps_and_optimizer_absorbs() {
    // A policy that flips Relu's layout: the wrappers cancel against each
    // other end-to-end, leaving the plain node.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 8, 8, 3]));
    g.add_graph_output(f32_info("y", &[1, 8, 8, 3]));
    g.push_node(Node::new("Relu", &["x"], &["y"], "relu_0"));

    let mut policies: LayoutPolicyMap = LayoutPolicyMap::default();
    policies.insert("Relu".to_string(), |_g, _n| LayoutPolicyResult {
        should_change_layout: true,
        new_op_type: None,
        new_domain: None,
        rank: 4,
    });

    assert!(channel_last_to_first(&mut g, &policies, false));

    assert_eq!(g.node_count(), 1);
    let relu = find_op(&g, "Relu");
    assert_eq!(relu.inputs, vec!["x"]);
    assert_eq!(relu.outputs, vec!["y"]);
}

#[test]
fn layout_change_replaces_node_and_keeps_wrappers() {
    // A vendor rename with no push handler: the wrapping transposes survive.
    let mut g = Graph::new(13);
    g.add_graph_input(f32_info("x", &[1, 3, 8, 8]));
    g.add_graph_output(f32_info("y", &[1, 3, 8, 8]));
    g.push_node(
        Node::new("FancyPool", &["x"], &["y"], "fp_0")
            .with_attr(Attribute::ints("kernel_shape", vec![2, 2])),
    );

    let mut policies: LayoutPolicyMap = LayoutPolicyMap::default();
    policies.insert("FancyPool".to_string(), |_g, _n| LayoutPolicyResult {
        should_change_layout: true,
        new_op_type: Some("NhwcFancyPool".to_string()),
        new_domain: Some("com.microsoft".to_string()),
        rank: 4,
    });

    assert!(channel_first_to_last(&mut g, &policies, false));

    assert_eq!(count_ops(&g, "FancyPool"), 0);
    let pool = find_op(&g, "NhwcFancyPool");
    assert_eq!(pool.domain, "com.microsoft");
    assert_eq!(pool.attr_ints("kernel_shape"), Some(&[2, 2][..]));

    // Input side: x enters through Transpose([0,2,3,1]) (NCHW -> NHWC).
    let in_t = g.get_producer(&pool.inputs[0].clone()).unwrap();
    assert!(in_t.is_op("Transpose"));
    assert_eq!(in_t.attr_ints("perm"), Some(&[0, 2, 3, 1][..]));
    assert_eq!(in_t.inputs, vec!["x"]);

    // Output side: back to NCHW.
    let out_t = g.get_producer("y").unwrap();
    assert!(out_t.is_op("Transpose"));
    assert_eq!(out_t.attr_ints("perm"), Some(&[0, 3, 1, 2][..]));
}
