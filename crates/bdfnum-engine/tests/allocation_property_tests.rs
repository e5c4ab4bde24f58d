use bdfnum_deck::Namespace;
use bdfnum_engine::plan::{allocate_simple, round_up_magnitude};
use bdfnum_engine::{IdMap, IdRange};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn id_set() -> impl Strategy<Value = BTreeSet<u32>> {
    proptest::collection::btree_set(1u32..1_000_000, 0..200)
}

fn namespaces() -> impl Strategy<Value = Vec<Namespace>> {
    proptest::sample::subsequence(Namespace::ALL.to_vec(), 1..=Namespace::ALL.len())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn map_is_a_bijection_onto_a_prefix_of_the_range(ids in id_set(), start in 1u32..500_000) {
        let range = IdRange::new(start, start + 999);
        let map = IdMap::build(range, &ids);
        prop_assert_eq!(map.len(), ids.len());

        let news: BTreeSet<u32> = map.iter().map(|(_, new)| new).collect();
        prop_assert_eq!(news.len(), ids.len());
        let expected: BTreeSet<u32> = (0..ids.len() as u32).map(|i| start + i).collect();
        prop_assert_eq!(news, expected);

        for (new, old) in map.inverse() {
            prop_assert_eq!(map.get(old), Some(new));
        }
    }

    #[test]
    fn map_preserves_relative_order(ids in id_set(), start in 1u32..500_000) {
        let map = IdMap::build(IdRange::new(start, u32::MAX), &ids);
        let pairs: Vec<(u32, u32)> = map.iter().collect();
        for w in pairs.windows(2) {
            prop_assert!(w[0].0 < w[1].0);
            prop_assert!(w[0].1 < w[1].1);
        }
    }

    #[test]
    fn building_twice_gives_the_same_map(ids in id_set(), start in 1u32..500_000) {
        let range = IdRange::new(start, start + 10_000);
        prop_assert_eq!(IdMap::build(range, &ids), IdMap::build(range, &ids));
    }

    #[test]
    fn simple_blocks_tile_the_span(start in 1u32..1_000_000, width in 0u32..100_000, present in namespaces()) {
        let span = IdRange::new(start, start + width);
        let blocks = allocate_simple(span, &present);
        prop_assert_eq!(blocks.len(), present.len());

        let order: Vec<Namespace> = blocks.iter().map(|(ns, _)| *ns).collect();
        prop_assert_eq!(&order, &present);
        prop_assert_eq!(blocks[0].1.start, span.start);
        prop_assert_eq!(blocks[blocks.len() - 1].1.end, span.end);

        // Contiguous and disjoint whenever every block is non-empty.
        if span.capacity() >= present.len() as u64 {
            for w in blocks.windows(2) {
                prop_assert_eq!(w[0].1.end + 1, w[1].1.start);
                prop_assert!(!w[0].1.overlaps(&w[1].1));
            }
            let total: u64 = blocks.iter().map(|(_, r)| r.capacity()).sum();
            prop_assert_eq!(total, span.capacity());
        }
    }

    #[test]
    fn overlap_is_symmetric_and_matches_membership(
        a in (1u32..2_000, 0u32..500),
        b in (1u32..2_000, 0u32..500),
    ) {
        let ra = IdRange::new(a.0, a.0 + a.1);
        let rb = IdRange::new(b.0, b.0 + b.1);
        prop_assert_eq!(ra.overlaps(&rb), rb.overlaps(&ra));
        let shared = (ra.start..=ra.end).any(|id| rb.contains(id));
        prop_assert_eq!(ra.overlaps(&rb), shared);
    }

    #[test]
    fn magnitude_rounding_never_shrinks(value in 1u64..10_000_000_000) {
        let rounded = round_up_magnitude(value);
        prop_assert!(rounded >= value);
        // one significant digit
        let mut lead = rounded;
        while lead >= 10 && lead % 10 == 0 {
            lead /= 10;
        }
        prop_assert!(lead < 10);
    }
}
