//! `Identity(x)` is replaced by `x`.
//!
//! Bypassing is bottom anchored: consumers are visited first, so a run of
//! identities collapses from the end nearest the graph output.

use graft_ir::{Binder, Graph, Pattern, PatternBuilder, ScanOrder};
use tracing::debug;

use super::bypass;
use crate::context::PassContext;
use crate::registry::{RulePass, RuleSpec};

pub const PASS: RulePass = RulePass::new("remove_identity", &RULES).with_order(ScanOrder::ReverseTopological);

const RULES: [RuleSpec; 1] = [RuleSpec { name: "bypass_identity", pattern: identity, action: bypass_identity }];

fn identity() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let root = p.node("Identity", [x]);
    let root = p.named(root, "identity");
    p.build(root)
}

fn bypass_identity(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let (Some(x), Some(node)) = (binder.named_arg("x"), binder.named_node("identity")) else {
        return false;
    };
    let Some(out) = graph.node(node).output(0) else { return false };
    if !bypass(graph, node, out, x) {
        debug!(node = %node, "identity kept: it wires the graph interface");
        return false;
    }
    ctx.bump("identities_removed");
    true
}
