use graft_ir::test::fixtures::*;
use graft_ir::{ConstTensor, DOMAIN_GRAFT, FUSED_SUBGRAPH, Graph};

use crate::error::{Error, FuseError, LOOP_DETECTED};
use crate::fuse::{TAG_ATTR, fuse, try_fuse};

const NONE: [&str; 0] = [];

#[test]
fn test_fuse_prefix_of_chain() {
    let mut graph = linear_chain(&["Relu", "Neg", "Abs"]);
    let subgraph = try_fuse(&graph, "head", ["x"], ["n1"], NONE, "npu").unwrap();

    let expected = [producer_of(&graph, "n0"), producer_of(&graph, "n1")];
    assert_eq!(subgraph.nodes, expected);
    assert_eq!(subgraph.meta_def.inputs, ["x"]);
    assert_eq!(subgraph.meta_def.outputs, ["n1"]);
    assert_eq!(subgraph.meta_def.domain, DOMAIN_GRAFT);
    assert_eq!(subgraph.meta_def.device_params.input_types, [f32_type([2, 3])]);
    assert_eq!(subgraph.meta_def.device_params.output_types, [f32_type([2, 3])]);

    let fused = fuse(&mut graph, &subgraph).unwrap();
    graph.gc();
    graph.resolve().unwrap();

    assert_eq!(graph.num_nodes(), 2);
    let node = graph.node(fused);
    assert!(node.is_op(DOMAIN_GRAFT, FUSED_SUBGRAPH));
    assert_eq!(node.name, "head");
    assert_eq!(node.attr(TAG_ATTR).and_then(|v| v.as_str()), Some("npu"));
    assert_eq!(graph.producer_node("n1"), Some(fused));
    assert_eq!(graph.nodes_in_topological_order(), [fused, producer_of(&graph, "n2")]);
    assert!(graph.find_node_arg("n0").is_none());
}

#[test]
fn test_diamond_without_middle_is_a_loop() {
    let graph = diamond();
    let err = try_fuse(&graph, "ac", ["b", "x"], ["c"], NONE, "").unwrap_err();
    assert_eq!(err, FuseError::LoopDetected { name: "ac".into(), via: "b".into() });
    assert_eq!(err.comments(), LOOP_DETECTED);
    assert!(err.is_loop());
}

#[test]
fn test_undeclared_boundary_input_is_a_loop() {
    let graph = diamond();
    let err = try_fuse(&graph, "ac", ["b"], ["c"], NONE, "").unwrap_err();
    assert_eq!(err, FuseError::LoopDetected { name: "ac".into(), via: "x".into() });
    assert_eq!(err.comments(), "loop detected");
}

#[test]
fn test_whole_diamond_fuses() {
    let mut graph = diamond();
    let subgraph = try_fuse(&graph, "all", ["x"], ["c"], NONE, "").unwrap();
    assert_eq!(subgraph.len(), 3);

    let fused = fuse(&mut graph, &subgraph).unwrap();
    graph.gc();
    assert_eq!(graph.num_nodes(), 1);
    assert_eq!(graph.outputs(), &[graph.node(fused).outputs[0].unwrap()]);
    assert!(graph.node(fused).attr(TAG_ATTR).is_none());
}

/// `m = Mul(x, w); r = Relu(m); s = Neg(m)` with `s` outside the region.
fn shared_product() -> Graph {
    let mut graph = Graph::new("shared");
    let x = graph.add_input("x", f32_type([4])).unwrap();
    let w = graph.add_initializer("w", ConstTensor::f32([4], vec![2.0; 4])).unwrap();
    let m = onnx(&mut graph, "Mul", "m", &[x, w]);
    let r = onnx(&mut graph, "Relu", "r", &[m]);
    let s = onnx(&mut graph, "Neg", "s", &[m]);
    graph.add_output(r);
    graph.add_output(s);
    graph
}

#[test]
fn test_constants_and_escaping_outputs_are_collected() {
    let mut graph = shared_product();
    let subgraph = try_fuse(&graph, "mul_relu", ["x"], ["r"], NONE, "").unwrap();
    assert_eq!(subgraph.meta_def.constant_initializers, ["w"]);
    assert_eq!(subgraph.meta_def.outputs, ["m", "r"]);

    let fused = fuse(&mut graph, &subgraph).unwrap();
    graph.resolve().unwrap();
    let node = graph.node(fused);
    assert_eq!(node.inputs.as_slice(), &[graph.find_node_arg("x"), graph.find_node_arg("w")]);
    assert_eq!(graph.producer_node("m"), Some(fused));
    assert_eq!(graph.consumer_nodes("m"), [producer_of(&graph, "s")]);
}

#[test]
fn test_declared_constant_is_not_duplicated() {
    let graph = shared_product();
    let subgraph = try_fuse(&graph, "mul", ["x"], ["m"], ["w"], "").unwrap();
    assert_eq!(subgraph.meta_def.constant_initializers, ["w"]);
    assert_eq!(subgraph.nodes, [producer_of(&graph, "m")]);
}

#[test]
fn test_invalid_requests() {
    let graph = shared_product();
    assert!(matches!(
        try_fuse(&graph, "f", ["x"], ["nope"], NONE, ""),
        Err(FuseError::UnknownArg { arg, .. }) if arg == "nope"
    ));
    assert!(matches!(try_fuse(&graph, "f", ["x"], NONE, NONE, ""), Err(FuseError::EmptyOutputs { .. })));
    assert!(matches!(try_fuse(&graph, "f", ["m"], ["m"], NONE, ""), Err(FuseError::OutputOutsideSet { .. })));
    assert!(matches!(
        try_fuse(&graph, "f", NONE, ["w"], NONE, ""),
        Err(FuseError::OutputOutsideSet { output, .. }) if output == "w"
    ));
}

#[test]
fn test_stale_descriptor_is_rejected() {
    let mut graph = linear_chain(&["Relu", "Neg", "Abs"]);
    let subgraph = try_fuse(&graph, "head", ["x"], ["n1"], NONE, "").unwrap();
    let n0 = graph.find_node_arg("n0").unwrap();
    let tap = onnx(&mut graph, "Sigmoid", "tap", &[n0]);
    graph.add_output(tap);

    let err = fuse(&mut graph, &subgraph).unwrap_err();
    assert!(matches!(err, Error::Fuse { source: FuseError::StaleDescriptor { .. } }), "{err}");
    assert_eq!(graph.num_nodes(), 4);
}

#[test]
fn test_generic_params_become_attributes() {
    let mut graph = linear_chain(&["Relu"]);
    let mut subgraph = try_fuse(&graph, "k", ["x"], ["n0"], NONE, "npu").unwrap();
    subgraph.meta_def = subgraph.meta_def.with_param("kernel", "relu_v2").with_param("lanes", "8");

    let fused = fuse(&mut graph, &subgraph).unwrap();
    let node = graph.node(fused);
    assert_eq!(node.attr("kernel").and_then(|v| v.as_str()), Some("relu_v2"));
    assert_eq!(node.attr("lanes").and_then(|v| v.as_str()), Some("8"));
    assert_eq!(node.attrs.len(), 3);
}

#[test]
fn test_disjoint_fusions_commute() {
    let graph = linear_chain(&["Relu", "Neg", "Abs", "Sigmoid"]);
    let head = try_fuse(&graph, "head", ["x"], ["n1"], NONE, "").unwrap();
    let tail = try_fuse(&graph, "tail", ["n1"], ["n3"], NONE, "").unwrap();

    let mut forward = graph.clone();
    fuse(&mut forward, &head).unwrap();
    fuse(&mut forward, &tail).unwrap();
    forward.gc();

    let mut backward = graph.clone();
    fuse(&mut backward, &tail).unwrap();
    fuse(&mut backward, &head).unwrap();
    backward.gc();

    assert_eq!(forward.canonical_form(), backward.canonical_form());
    assert_eq!(forward.num_nodes(), 2);
}
