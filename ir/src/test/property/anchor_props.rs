//! AnchorPoint algebra properties.

use proptest::prelude::*;

use graft_dtype::test::generators::static_shape;

use super::generators::{arb_anchor_kind, arb_anchor_point};
use crate::provenance::{AnchorKind, AnchorPoint};

/// Three rank-consistent chains plus a starting shape of that rank.
fn chains() -> impl Strategy<Value = (AnchorPoint, AnchorPoint, AnchorPoint, graft_dtype::Dims)> {
    (1usize..5).prop_flat_map(|rank| {
        (arb_anchor_point(rank), arb_anchor_point(rank), arb_anchor_point(rank), static_shape(rank))
    })
}

proptest! {
    #[test]
    fn append_is_associative((a, b, c, _) in chains()) {
        prop_assert_eq!(a.append(&b).append(&c), a.append(&b.append(&c)));
    }

    #[test]
    fn optimize_respects_append((a, b, c, _) in chains()) {
        let whole = a.append(&b).append(&c).optimize();
        let parts = a.optimize().append(&b.optimize()).append(&c.optimize()).optimize();
        prop_assert_eq!(whole, parts);
    }

    #[test]
    fn optimize_is_idempotent((a, _, _, _) in chains()) {
        let once = a.optimize();
        prop_assert_eq!(once.optimize(), once);
    }

    #[test]
    fn replay_matches_optimized_replay((a, b, _, shape) in chains()) {
        let chain = a.append(&b);
        prop_assert_eq!(chain.optimize().replay_shape(Some(shape.clone())), chain.replay_shape(Some(shape)));
    }

    #[test]
    fn optimize_keeps_latest_fix_point((a, _, _, _) in chains()) {
        prop_assert_eq!(a.optimize().fix_point(), a.fix_point());
    }

    #[test]
    fn optimized_chain_has_no_identity(kinds in prop::collection::vec(arb_anchor_kind(3), 0..10)) {
        let optimized = AnchorPoint::new(None, kinds).optimize();
        prop_assert!(!optimized.steps.contains(&AnchorKind::Identity));
    }
}
