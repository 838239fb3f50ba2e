use serde::Serialize;
use smallvec::smallvec;
use test_case::test_case;

use crate::error::Error;
use crate::graph::DOMAIN_GRAFT;
use crate::pattern::binary::{FORMAT, VERSION};
use crate::pattern::{Pattern, PatternBuilder, PatternId, PatternKind};

/// Hand-built blob with the on-disk field names.
#[derive(Serialize)]
struct RawBlob {
    format: String,
    version: u32,
    root: PatternId,
    kinds: Vec<PatternKind>,
    names: Vec<(PatternId, String)>,
}

fn id(raw: u32) -> PatternId {
    PatternId::from_raw(raw)
}

fn relu(operand: u32) -> PatternKind {
    PatternKind::Node {
        op_type: "Relu".into(),
        domain: String::new(),
        operands: smallvec![id(operand)],
        optional: smallvec![false],
        attrs: Vec::new(),
    }
}

fn encode(blob: &RawBlob) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::into_writer(blob, &mut bytes).unwrap();
    bytes
}

fn valid() -> RawBlob {
    RawBlob {
        format: FORMAT.into(),
        version: VERSION,
        root: id(1),
        kinds: vec![PatternKind::Wildcard, relu(0)],
        names: vec![(id(0), "x".into())],
    }
}

#[test]
fn test_round_trip_keeps_names_and_structure() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let x = p.named(x, "x");
    let c = p.constant();
    let fix = p.op("fix").domain(DOMAIN_GRAFT).operand(x).optional_operand(c).attr("fix_point", 2i64).finish();
    let fix = p.named(fix, "fix");
    let pattern = p.build(fix);

    let decoded = Pattern::from_binary(&pattern.to_binary().unwrap()).unwrap();
    assert_eq!(decoded, pattern);
    assert_eq!(decoded.id_of("fix"), Some(fix));
    assert_eq!(decoded.name_of(x), Some("x"));
    assert_eq!(decoded.reachable_ids(), pattern.reachable_ids());
}

#[test]
fn test_hand_built_blob_decodes() {
    let pattern = Pattern::from_binary(&encode(&valid())).unwrap();
    assert_eq!(pattern.to_string(), "Relu(x:_)");
}

#[test]
fn test_fingerprint_distinguishes_patterns() {
    let mut p = PatternBuilder::new();
    let x = p.wildcard();
    let relu = p.node("Relu", [x]);
    let neg = p.node("Neg", [x]);
    let a = p.build(relu).fingerprint().unwrap();
    let b = p.build(neg).fingerprint().unwrap();
    assert_ne!(a, b);
    assert_eq!(a, p.build(relu).fingerprint().unwrap());
}

#[test]
fn test_garbage_is_a_decode_error() {
    assert!(matches!(Pattern::from_binary(b"\xff\x00garbage"), Err(Error::PatternDecode { .. })));
}

#[test]
fn test_header_is_checked() {
    let wrong_format = RawBlob { format: "other".into(), ..valid() };
    assert!(matches!(Pattern::from_binary(&encode(&wrong_format)), Err(Error::PatternFormat { .. })));

    let wrong_version = RawBlob { version: VERSION + 1, ..valid() };
    assert!(matches!(Pattern::from_binary(&encode(&wrong_version)), Err(Error::PatternVersion { .. })));
}

#[test_case(RawBlob { root: id(7), ..valid() }; "root out of range")]
#[test_case(RawBlob { kinds: vec![relu(1), PatternKind::Wildcard], root: id(0), ..valid() }; "child after parent")]
#[test_case(RawBlob { kinds: vec![relu(0), PatternKind::Wildcard], ..valid() }; "self reference")]
#[test_case(RawBlob { kinds: vec![PatternKind::Wildcard, PatternKind::Or(smallvec![])], ..valid() }; "empty or")]
#[test_case(RawBlob { names: vec![(id(0), "x".into()), (id(1), "x".into())], ..valid() }; "duplicate name")]
#[test_case(RawBlob { names: vec![(id(9), "x".into())], ..valid() }; "name out of range")]
fn test_malformed_blobs_rejected(blob: RawBlob) {
    let err = Pattern::from_binary(&encode(&blob)).unwrap_err();
    assert!(matches!(err, Error::PatternMalformed { .. }), "{err}");
}

#[test]
fn test_operand_flags_must_agree() {
    let node = PatternKind::Node {
        op_type: "Add".into(),
        domain: String::new(),
        operands: smallvec![id(0), id(0)],
        optional: smallvec![false],
        attrs: Vec::new(),
    };
    let blob = RawBlob { kinds: vec![PatternKind::Wildcard, node], ..valid() };
    assert!(matches!(Pattern::from_binary(&encode(&blob)), Err(Error::PatternMalformed { .. })));
}
