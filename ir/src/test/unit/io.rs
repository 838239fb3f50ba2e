use std::path::Path;

use crate::error::Error;
use crate::graph::{DOMAIN_GRAFT, Graph};
use crate::tensor::ConstTensor;
use crate::test::fixtures::*;

fn weighted_graph() -> Graph {
    let mut graph = fix_roundtrip(3, 3);
    let y = graph.find_node_arg("dequant").unwrap();
    let big = graph.add_initializer("big", ConstTensor::f32([1, 8], (0..8).map(|v| v as f32).collect())).unwrap();
    let small = graph.add_initializer("small", ConstTensor::i64([1], vec![7])).unwrap();
    let sum = onnx(&mut graph, "Add", "sum", &[y, big]);
    let shaped = onnx(&mut graph, "Reshape", "shaped", &[sum, small]);
    graph.add_output(shaped);
    graph
}

#[test]
fn test_save_load_inline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let graph = weighted_graph();

    graph.save(&path, None, 0).unwrap();
    let loaded = Graph::load(&path).unwrap();
    assert_eq!(loaded.canonical_form(), graph.canonical_form());
    assert_eq!(loaded.name(), "fix_roundtrip");
    let quant = loaded.find_node("quant").unwrap();
    assert_eq!(loaded.node(quant).domain, DOMAIN_GRAFT);
    assert_eq!(loaded.node(quant).attr_int("fix_point"), Some(3));
    assert!(!dir.path().join("weights.bin").exists());
}

#[test]
fn test_save_load_external_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let graph = weighted_graph();

    // 32 bytes for `big`, 8 bytes for `small`: only `big` moves out.
    graph.save(&path, Some(Path::new("weights.bin")), 16).unwrap();
    let data = std::fs::read(dir.path().join("weights.bin")).unwrap();
    assert_eq!(data.len(), 32);
    let json = std::fs::read_to_string(&path).unwrap();
    assert!(json.contains("\"external\""));
    assert!(json.contains("\"inline\""));

    let loaded = Graph::load(&path).unwrap();
    assert_eq!(loaded.canonical_form(), graph.canonical_form());
    let big = loaded.find_node_arg("big").unwrap();
    assert_eq!(loaded.initializer(big).unwrap().as_f32("big").unwrap()[7], 7.0);
}

#[test]
fn test_load_truncated_external_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    weighted_graph().save(&path, Some(Path::new("weights.bin")), 16).unwrap();
    std::fs::write(dir.path().join("weights.bin"), [0u8; 4]).unwrap();

    let err = Graph::load(&path).unwrap_err();
    assert!(matches!(err, Error::ExternalDataRange { available: 4, .. }), "{err}");
}

#[test]
fn test_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(Graph::load(&missing), Err(Error::Io { .. })));

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{ not json").unwrap();
    assert!(matches!(Graph::load(&garbage), Err(Error::Json { .. })));
}

#[test]
fn test_canonical_form_ignores_creation_order() {
    let mut forward = Graph::new("g");
    let x = forward.add_input("x", f32_type([2])).unwrap();
    let a = onnx(&mut forward, "Relu", "a", &[x]);
    let b = onnx(&mut forward, "Neg", "b", &[x]);
    forward.add_output(a);
    forward.add_output(b);

    let mut backward = Graph::new("g");
    let x = backward.add_input("x", f32_type([2])).unwrap();
    let b = onnx(&mut backward, "Neg", "b", &[x]);
    let a = onnx(&mut backward, "Relu", "a", &[x]);
    backward.add_output(a);
    backward.add_output(b);

    assert_eq!(forward.canonical_form(), backward.canonical_form());

    let relu = backward.find_node("a").unwrap();
    backward.set_input(relu, 0, Some(b));
    assert_ne!(forward.canonical_form(), backward.canonical_form());
}
