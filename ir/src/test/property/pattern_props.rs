//! Pattern codec and matcher properties.

use proptest::prelude::*;

use super::generators::arb_pattern;
use crate::graph::{ArgId, DOMAIN_GRAFT, Graph};
use crate::pattern::{Pattern, PatternBuilder};
use crate::tensor::ConstTensor;
use crate::test::fixtures::{f32_type, fix_attrs, onnx, op_with_attrs};

/// A graph exercising every pattern kind the generator can produce.
fn probe_graph() -> (Graph, Vec<ArgId>) {
    let mut graph = Graph::new("probe");
    let x = graph.add_input("x", f32_type([4])).unwrap();
    let c = graph.add_initializer("c", ConstTensor::f32([4], vec![0.0; 4])).unwrap();
    let relu = onnx(&mut graph, "Relu", "relu", &[x]);
    let add = onnx(&mut graph, "Add", "add", &[relu, c]);
    let add_rev = onnx(&mut graph, "Add", "add_rev", &[c, relu]);
    let mul = onnx(&mut graph, "Mul", "mul", &[add, add]);
    let neg = onnx(&mut graph, "Neg", "neg", &[mul]);
    let fix = op_with_attrs(&mut graph, DOMAIN_GRAFT, "fix", "fix", &[neg], fix_attrs(3));
    let sub = onnx(&mut graph, "Sub", "sub", &[fix, add_rev]);
    graph.add_output(sub);
    let args = vec![x, c, relu, add, add_rev, mul, neg, fix, sub];
    (graph, args)
}

fn outcomes(pattern: &Pattern, graph: &Graph, args: &[ArgId]) -> Vec<Option<Vec<String>>> {
    args.iter()
        .map(|arg| {
            pattern.match_arg(graph, *arg).map(|binder| {
                binder.entries().iter().map(|(id, input)| format!("{id}={:?}/{:?}", input.node, input.arg)).collect()
            })
        })
        .collect()
}

proptest! {
    #[test]
    fn binary_round_trip_preserves_pattern(pattern in arb_pattern()) {
        let bytes = pattern.to_binary().unwrap();
        let decoded = Pattern::from_binary(&bytes).unwrap();
        prop_assert_eq!(&decoded, &pattern);
        prop_assert_eq!(decoded.fingerprint().unwrap(), pattern.fingerprint().unwrap());
        prop_assert_eq!(decoded.to_string(), pattern.to_string());
    }

    #[test]
    fn decoded_pattern_matches_like_original(pattern in arb_pattern()) {
        let (graph, args) = probe_graph();
        let decoded = Pattern::from_binary(&pattern.to_binary().unwrap()).unwrap();
        prop_assert_eq!(outcomes(&decoded, &graph, &args), outcomes(&pattern, &graph, &args));
    }

    #[test]
    fn binder_covers_exactly_reachable_ids(pattern in arb_pattern()) {
        let (graph, args) = probe_graph();
        for arg in args {
            if let Some(binder) = pattern.match_arg(&graph, arg) {
                let ids: Vec<_> = binder.ids().collect();
                prop_assert_eq!(ids.as_slice(), pattern.reachable_ids());
                prop_assert_eq!(binder.get(pattern.root()).and_then(|b| b.arg), Some(arg));
            }
        }
    }

    #[test]
    fn commutable_binds_symmetrically(value in -4.0f32..4.0, constant_first in any::<bool>()) {
        let mut graph = Graph::new("commutative");
        let x = graph.add_input("x", f32_type([1])).unwrap();
        let c = graph.add_initializer("c", ConstTensor::f32([1], vec![value])).unwrap();
        let operands = if constant_first { [c, x] } else { [x, c] };
        let add = onnx(&mut graph, "Add", "add", &operands);

        let mut p = PatternBuilder::new();
        let lhs = p.graph_input();
        let lhs = p.named(lhs, "x");
        let rhs = p.constant();
        let rhs = p.named(rhs, "c");
        let root = p.commutable("Add", lhs, rhs);
        let pattern = p.build(root);

        let binder = pattern.match_arg(&graph, add).unwrap();
        prop_assert_eq!(binder.named_arg("x"), Some(x));
        prop_assert_eq!(binder.named_arg("c"), Some(c));
        prop_assert_eq!(binder.named_node("x"), None);
    }
}
