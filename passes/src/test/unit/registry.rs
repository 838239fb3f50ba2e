use std::str::FromStr;

use graft_ir::test::fixtures::*;
use graft_ir::{Binder, ChainMode, Graph, Pattern, PatternBuilder, ScanOrder};
use strum::IntoEnumIterator;
use test_case::test_case;

use crate::config::DEFAULT_PIPELINE;
use crate::context::PassContext;
use crate::error::Error;
use crate::passes::{fix_cleanup, remove_identity};
use crate::registry::{BuiltinPass, PassRegistry, RulePass, RuleSpec};
use crate::test::run_pass;

#[test]
fn test_builtins_follow_default_pipeline() {
    let names: Vec<String> = BuiltinPass::iter().map(|p| p.to_string()).collect();
    assert_eq!(names, DEFAULT_PIPELINE);
}

#[test_case("qdq_to_fix", Some(BuiltinPass::QdqToFix))]
#[test_case("fold_add_zero", Some(BuiltinPass::FoldAddZero))]
#[test_case("partition", Some(BuiltinPass::Partition))]
#[test_case("QdqToFix", None)]
fn test_builtin_from_name(name: &str, expected: Option<BuiltinPass>) {
    assert_eq!(BuiltinPass::from_str(name).ok(), expected);
}

#[test]
fn test_registry_defaults() {
    let registry = PassRegistry::with_defaults();
    let mut expected = DEFAULT_PIPELINE.to_vec();
    expected.sort();
    assert_eq!(registry.names().collect::<Vec<_>>(), expected);
    for name in DEFAULT_PIPELINE {
        assert_eq!(registry.get(name).unwrap().name(), name);
    }
}

#[test]
fn test_unknown_pass() {
    let registry = PassRegistry::with_defaults();
    let err = registry.get("constant_folding").err().unwrap();
    assert!(matches!(&err, Error::UnknownPass { name } if name == "constant_folding"));
    assert_eq!(err.to_string(), "unknown pass 'constant_folding'");
}

fn relu() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let root = p.node("Relu", [x]);
    let root = p.named(root, "relu");
    p.build(root)
}

fn relu_to_neg(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let Some(node) = binder.named_node("relu") else { return false };
    let Some(x) = binder.named_arg("x") else { return false };
    let Some(out) = graph.node(node).output(0) else { return false };
    let (_, outputs) = graft_ir::NodeBuilder::new(graph, ctx.pass())
        .set_op_type("Neg")
        .set_input_node_args([x])
        .set_anchor_point1(out)
        .build_ex();
    let Some(new) = outputs[0] else { return false };
    graph.replace_all_uses(out, new);
    graph.remove_node(node);
    ctx.bump("relus_replaced");
    true
}

const CUSTOM_RULES: [RuleSpec; 1] = [RuleSpec { name: "relu_to_neg", pattern: relu, action: relu_to_neg }];

#[test]
fn test_register_custom_rule_pass() {
    let mut registry = PassRegistry::with_defaults();
    registry.register(RulePass::new("relu_to_neg", &CUSTOM_RULES));
    let pass = registry.get("relu_to_neg").unwrap();

    let mut graph = linear_chain(&["Relu", "Abs", "Relu"]);
    let report = run_pass(pass, &mut graph);
    assert_eq!(report.pass, "relu_to_neg");
    assert_eq!(report.rewrites, 2);
    assert_eq!(report.counters["relu_to_neg"], 2);
    assert_eq!(report.counters["relus_replaced"], 2);
    let ops: Vec<&str> =
        graph.nodes_in_topological_order().into_iter().map(|n| graph.node(n).op_type.as_str()).collect();
    assert_eq!(ops, ["Neg", "Abs", "Neg"]);
}

#[test]
fn test_rule_pass_scheduling() {
    assert_eq!(remove_identity::PASS.order(), ScanOrder::ReverseTopological);
    assert_eq!(remove_identity::PASS.mode(), ChainMode::FixedPoint);
    assert_eq!(fix_cleanup::PASS.order(), ScanOrder::Topological);
}

fn renew_relu(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let Some(node) = binder.named_node("relu") else { return false };
    let Some(x) = binder.named_arg("x") else { return false };
    let Some(out) = graph.node(node).output(0) else { return false };
    let (_, outputs) = graft_ir::NodeBuilder::new(graph, ctx.pass())
        .set_op_type("Relu")
        .set_input_node_args([x])
        .set_anchor_point1(out)
        .build_ex();
    let Some(new) = outputs[0] else { return false };
    graph.replace_all_uses(out, new);
    graph.remove_node(node);
    true
}

const RENEW_RULES: [RuleSpec; 1] = [RuleSpec { name: "renew_relu", pattern: relu, action: renew_relu }];

#[test]
fn test_once_mode_skips_nodes_created_by_rewrites() {
    let pass = RulePass::new("renew_relu", &RENEW_RULES).with_mode(ChainMode::Once);
    let mut graph = linear_chain(&["Relu", "Abs", "Relu"]);
    let report = run_pass(&pass, &mut graph);
    assert_eq!(report.rewrites, 2);
    assert_eq!(graph.node_ids().len(), 3);
}
