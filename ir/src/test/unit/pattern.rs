use test_case::test_case;

use crate::graph::{DOMAIN_GRAFT, OpKey};
use crate::pattern::{PatternBuilder, PatternId, PatternKind};

#[test]
fn test_ids_are_dense_and_children_precede_parents() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let c = p.constant();
    let add = p.node("Add", [x, c]);
    let relu = p.node("Relu", [add]);
    assert_eq!([x.raw(), c.raw(), add.raw(), relu.raw()], [0, 1, 2, 3]);

    let pattern = p.build(relu);
    for &id in pattern.reachable_ids() {
        assert!(pattern.kind(id).children().iter().all(|child| *child < id));
    }
}

#[test]
fn test_non_leaf_patterns_are_interned() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let a = p.node("Relu", [x]);
    let b = p.node("Relu", [x]);
    assert_eq!(a, b);

    let fix3 = p.op("fix").domain(DOMAIN_GRAFT).operand(x).attr("fix_point", 3i64).finish();
    let fix3_again = p.op("fix").domain(DOMAIN_GRAFT).operand(x).attr("fix_point", 3i64).finish();
    let fix4 = p.op("fix").domain(DOMAIN_GRAFT).operand(x).attr("fix_point", 4i64).finish();
    assert_eq!(fix3, fix3_again);
    assert_ne!(fix3, fix4);

    // Leaves are always fresh.
    let y = p.wildcard();
    assert_ne!(x, y);
    assert_ne!(p.node("Relu", [y]), a);
}

#[test]
fn test_attr_constraints_are_sorted() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let a = p.op("Conv").operand(x).attr("strides", vec![1i64, 1]).attr("group", 1i64).finish();
    let b = p.op("Conv").operand(x).attr("group", 1i64).attr("strides", vec![1i64, 1]).finish();
    assert_eq!(a, b);
    let pattern = p.build(a);
    let PatternKind::Node { attrs, .. } = pattern.kind(a) else { panic!("expected a node pattern") };
    assert_eq!(attrs.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(), ["group", "strides"]);
}

#[test]
fn test_names() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let relu = p.node("Relu", [x]);
    let relu = p.named(relu, "relu");
    p.named(relu, "relu");
    let pattern = p.build(relu);

    assert_eq!(pattern.id_of("x"), Some(x));
    assert_eq!(pattern.name_of(relu), Some("relu"));
    assert_eq!(pattern.id_of("missing"), None);
}

#[test]
#[should_panic(expected = "already used")]
fn test_name_reuse_panics() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let y = p.wildcard();
    p.named(x, "v");
    p.named(y, "v");
}

#[test]
#[should_panic(expected = "unknown child pattern")]
fn test_foreign_child_panics() {
    let mut other = PatternBuilder::new();
    other.wildcard();
    let foreign = other.wildcard();
    let mut p = PatternBuilder::new();
    p.node("Relu", [foreign]);
}

#[test]
#[should_panic(expected = "empty alternation")]
fn test_empty_or_panics() {
    PatternBuilder::new().or(Vec::<PatternId>::new());
}

#[test_case("Relu", false => Some(vec![OpKey::onnx("Relu")]); "node root")]
#[test_case("Add", true => Some(vec![OpKey::onnx("Add"), OpKey::onnx("Sub")]); "or root")]
fn test_op_key(op: &str, with_or: bool) -> Option<Vec<OpKey>> {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let y = p.wildcard();
    let root = if with_or {
        let a = p.commutable(op, x, y);
        let s = p.node("Sub", [x, y]);
        p.or([a, s])
    } else {
        p.node(op, [x])
    };
    p.build(root).op_key().map(|keys| keys.into_vec())
}

#[test]
fn test_wildcard_roots_have_no_key() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let relu = p.node("Relu", [x]);
    let either = p.or([relu, x]);
    assert_eq!(p.build(x).op_key(), None);
    assert_eq!(p.build(either).op_key(), None);

    // A conjunction dispatches on the first item that has a key.
    let c = p.constant();
    let both = p.sequence([c, relu]);
    assert_eq!(p.build(both).op_key().map(|k| k.into_vec()), Some(vec![OpKey::onnx("Relu")]));
}

#[test]
fn test_display() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let q = p.node_in(DOMAIN_GRAFT, "float2fix", [x]);
    let dq = p.node_in(DOMAIN_GRAFT, "fix2float", [q]);
    let c = p.constant();
    let bias = p.op("Add").operand(dq).optional_operand(c).finish();
    assert_eq!(p.build(bias).to_string(), "Add(com.graft::fix2float(com.graft::float2fix(x:_)), const?)");
}

#[test]
fn test_tree_shows_back_references() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let relu = p.node("Relu", [x]);
    let relu = p.named(relu, "shared");
    let mul = p.node("Mul", [relu, relu]);
    let pattern = p.build(mul);

    let compact = pattern.tree();
    assert!(compact.contains("[p2] NODE(Mul)"), "{compact}");
    assert_eq!(compact.matches("NODE(Relu)").count(), 1, "{compact}");
    assert!(compact.contains("[p1] → (see above)"), "{compact}");

    let full = pattern.tree_full();
    assert_eq!(full.matches("NODE(Relu) 'shared'").count(), 2, "{full}");
}
