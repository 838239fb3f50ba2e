//! `Reshape(Reshape(x, s1), s2)` becomes `Reshape(x, s2)`.
//!
//! The replacement is anchored to the outer output with its resolved shape, so
//! the rewrite is skipped while that shape is unknown. A `0` in `s2` copies the
//! matching dim of the inner output, so unless `allowzero` is set such a shape
//! cannot be applied to `x` directly and the pair is kept. The inner reshape
//! stays while anything else reads it.

use graft_ir::{ArgId, Binder, Graph, NodeBuilder, Pattern, PatternBuilder};
use tracing::trace;

use crate::context::PassContext;
use crate::registry::{RulePass, RuleSpec};

pub const PASS: RulePass = RulePass::new("merge_reshape", &RULES);

const ALLOW_ZERO_ATTR: &str = "allowzero";

const RULES: [RuleSpec; 1] = [RuleSpec { name: "merge_reshape", pattern: double_reshape, action: merge }];

fn double_reshape() -> Pattern {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let inner_shape = p.constant();
    let inner = p.node("Reshape", [x, inner_shape]);
    let inner = p.named(inner, "inner");
    let shape = p.constant();
    let shape = p.named(shape, "shape");
    let outer = p.node("Reshape", [inner, shape]);
    let outer = p.named(outer, "outer");
    p.build(outer)
}

fn merge(graph: &mut Graph, binder: &Binder, ctx: &mut PassContext) -> bool {
    let (Some(x), Some(shape), Some(outer)) =
        (binder.named_arg("x"), binder.named_arg("shape"), binder.named_node("outer"))
    else {
        return false;
    };
    let Some(old) = graph.node(outer).output(0) else { return false };
    if copies_input_dims(graph, shape, graph.node(outer).attr_int(ALLOW_ZERO_ATTR)) {
        trace!(node = %outer, "target shape copies dims of the inner reshape");
        return false;
    }
    let Some(dims) = graph.arg(old).ty.shape.clone() else {
        trace!(node = %outer, "output shape unknown");
        return false;
    };

    let (_, outputs) = NodeBuilder::new(graph, ctx.pass())
        .set_op_type("Reshape")
        .clone_attrs(outer)
        .set_input_node_args([x, shape])
        .set_anchor_point3(old, dims)
        .build_ex();
    let Some(new) = outputs[0] else { return false };
    graph.replace_all_uses(old, new);
    graph.remove_node(outer);
    ctx.bump("reshapes_merged");
    true
}

/// Whether `shape` depends on the dims of the reshape input. Unreadable shapes
/// count as dependent.
fn copies_input_dims(graph: &Graph, shape: ArgId, allow_zero: Option<i64>) -> bool {
    let Some(values) = graph.constant_value(shape).and_then(|c| c.as_i64("shape").ok()) else {
        return true;
    };
    allow_zero != Some(1) && values.contains(&0)
}
