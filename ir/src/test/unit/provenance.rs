use test_case::test_case;

use crate::attr::AttrValue;
use crate::graph::Graph;
use crate::provenance::{AnchorEvent, AnchorKind, AnchorPoint, ProvenanceLog, format_chain};
use crate::test::fixtures::*;

fn steps(kinds: Vec<AnchorKind>) -> Vec<AnchorKind> {
    AnchorPoint::new(None, kinds).optimize().steps
}

#[test_case(
    vec![AnchorKind::Identity, AnchorKind::Identity] => Vec::<AnchorKind>::new();
    "identities vanish"
)]
#[test_case(
    vec![AnchorKind::transpose([1, 0]), AnchorKind::transpose([1, 0])] => Vec::<AnchorKind>::new();
    "inverse transposes cancel"
)]
#[test_case(
    vec![AnchorKind::transpose([1, 2, 0]), AnchorKind::transpose([1, 2, 0])]
        => vec![AnchorKind::transpose([2, 0, 1])];
    "transposes compose"
)]
#[test_case(
    vec![AnchorKind::transpose([1, 0]), AnchorKind::transpose([2, 0, 1])]
        => vec![AnchorKind::transpose([1, 0]), AnchorKind::transpose([2, 0, 1])];
    "different ranks stay apart"
)]
#[test_case(
    vec![AnchorKind::reshape([6]), AnchorKind::Identity, AnchorKind::reshape([2, 3])]
        => vec![AnchorKind::reshape([2, 3])];
    "later reshape wins"
)]
#[test_case(
    vec![AnchorKind::FixPoint { fix_point: 1 }, AnchorKind::FixPoint { fix_point: 4 }]
        => vec![AnchorKind::FixPoint { fix_point: 4 }];
    "later fix point wins"
)]
#[test_case(
    vec![AnchorKind::reshape([6]), AnchorKind::transpose([0]), AnchorKind::reshape([3, 2])]
        => vec![AnchorKind::reshape([3, 2])];
    "identity transpose exposes neighbours"
)]
fn test_optimize(kinds: Vec<AnchorKind>) -> Vec<AnchorKind> {
    steps(kinds)
}

#[test]
fn test_custom_steps_are_kept() {
    let custom = AnchorKind::custom("quantize", [("bits", AttrValue::Int(8))]);
    let kinds = vec![AnchorKind::reshape([4]), custom.clone(), AnchorKind::reshape([2, 2])];
    assert_eq!(steps(kinds.clone()), kinds);
    assert_eq!(custom.to_string(), "quantize{\"bits\": Int(8)}");
}

#[test]
fn test_replay_shape() {
    let point = AnchorPoint::new(None, [AnchorKind::transpose([2, 0, 1]), AnchorKind::FixPoint { fix_point: 2 }]);
    let replayed = point.replay_shape(Some([2, 3, 4].into_iter().collect()));
    assert_eq!(replayed.map(|s| s.into_vec()), Some(vec![4, 2, 3]));
    assert_eq!(point.replay_shape(None), None);
    assert_eq!(point.fix_point(), Some(2));

    let reshaped = point.append(&AnchorPoint::new(None, [AnchorKind::reshape([24])]));
    assert_eq!(reshaped.replay_shape(None).map(|s| s.into_vec()), Some(vec![24]));
}

#[test_case(vec![AnchorKind::transpose([0, 1]), AnchorKind::transpose([1, 0])]; "leading identity transpose")]
#[test_case(vec![AnchorKind::transpose([1, 0]), AnchorKind::reshape([6]), AnchorKind::transpose([0])]; "rank changes")]
#[test_case(
    vec![AnchorKind::reshape([3, 2]), AnchorKind::transpose([1, 0]), AnchorKind::transpose([1, 0])];
    "inverse transposes cancel"
)]
fn test_rank_consistent_chain_replays_like_its_normal_form(kinds: Vec<AnchorKind>) {
    let point = AnchorPoint::new(None, kinds);
    let shape = Some([2, 3].into_iter().collect());
    assert!(point.replay_shape(shape.clone()).is_some());
    assert_eq!(point.optimize().replay_shape(shape.clone()), point.replay_shape(shape));
}

#[test]
fn test_chain_walks_ancestors_first() {
    let mut graph = Graph::new("ids");
    let a = graph.new_arg("a", f32_type([2, 3])).unwrap();
    let b = graph.new_arg("b", f32_type([3, 2])).unwrap();
    let c = graph.new_arg("c", f32_type([6])).unwrap();

    let mut log = ProvenanceLog::default();
    log.annotate(a, AnchorKind::FixPoint { fix_point: 3 }, "fold");
    log.record(b, AnchorEvent { from: Some(a), kind: AnchorKind::transpose([1, 0]), pass: "t".into() });
    log.record(c, AnchorEvent { from: Some(b), kind: AnchorKind::reshape([6]), pass: "r".into() });

    let chain = log.chain(c);
    assert_eq!(chain.origin, Some(a));
    assert_eq!(
        chain.steps,
        vec![AnchorKind::FixPoint { fix_point: 3 }, AnchorKind::transpose([1, 0]), AnchorKind::reshape([6])]
    );
    assert_eq!(log.fix_point(c), Some(3));
    assert_eq!(log.origin(c), a);
    assert_eq!(log.origin(a), a);
    let transposed = log.chain(b).replay_shape(Some([2, 3].into_iter().collect()));
    assert_eq!(transposed.map(|s| s.into_vec()), Some(vec![3, 2]));

    let rendered = format_chain(&log, c);
    assert!(rendered.starts_with(&format!("{c}: {a} -> fix_point(3) -> transpose[1, 0] -> reshape[6]")), "{rendered}");
    assert!(rendered.contains("[0] "), "{rendered}");
}

#[test]
fn test_retain_reachable() {
    let mut graph = Graph::new("ids");
    let a = graph.new_arg("a", f32_type([1])).unwrap();
    let b = graph.new_arg("b", f32_type([1])).unwrap();
    let stray = graph.new_arg("stray", f32_type([1])).unwrap();

    let mut log = ProvenanceLog::default();
    log.record(b, AnchorEvent { from: Some(a), kind: AnchorKind::Identity, pass: "p".into() });
    log.annotate(a, AnchorKind::FixPoint { fix_point: 1 }, "p");
    log.annotate(stray, AnchorKind::Identity, "p");
    assert_eq!(log.len(), 3);

    let dropped = log.retain_reachable(&[b].into_iter().collect());
    assert_eq!(dropped, 1);
    assert_eq!(log.len(), 2);
    assert_eq!(log.fix_point(b), Some(1));
    assert!(log.events(stray).is_empty());
}

#[test]
fn test_graph_level_fix_point_query() {
    let graph = fix_roundtrip(6, 6);
    let q = graph.find_node_arg("quant").unwrap();
    let x = graph.find_node_arg("x").unwrap();
    assert_eq!(graph.fix_point(q), Some(6));
    assert_eq!(graph.fix_point(x), None);
}
