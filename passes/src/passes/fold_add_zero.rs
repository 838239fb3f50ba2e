//! `Add(x, 0)` in either operand order is replaced by `x` when the addition
//! does not broadcast `x` to a larger shape.

use graft_ir::pattern::helpers::is_zero;
use graft_ir::{Binder, Graph, Pattern, PatternBuilder};

use super::bypass;
use crate::context::PassContext;
use crate::registry::{RulePass, RuleSpec};

pub const PASS: RulePass = RulePass::new("fold_add_zero", &RULES);

const RULES: [RuleSpec; 1] = [RuleSpec { name: "add_zero", pattern: add_zero, action: fold }];

fn add_zero() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let zero = p.constant();
    let zero = p.named(zero, "zero");
    let root = p.commutable("Add", x, zero);
    let root = p.named(root, "add");
    p.build(root)
}

fn fold(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let (Some(x), Some(zero), Some(add)) = (binder.named_arg("x"), binder.named_arg("zero"), binder.named_node("add"))
    else {
        return false;
    };
    if !is_zero(graph, zero) {
        return false;
    }
    let Some(out) = graph.node(add).output(0) else { return false };
    let (x_shape, out_shape) = (&graph.arg(x).ty.shape, &graph.arg(out).ty.shape);
    if x_shape.is_none() || x_shape != out_shape {
        return false;
    }
    let done = bypass(graph, add, out, x);
    if done {
        ctx.bump("zero_additions_removed");
    }
    done
}
