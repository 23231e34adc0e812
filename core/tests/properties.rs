use mitmhash_core::{
    brute_force, build_table, compute_inverse, is_inverse, width_mask, Direction, MatchOrder,
    Preset, Search, SearchSpace, SegmentSet, Variant, VariantBuilder,
};
use proptest::prelude::*;

fn any_variant() -> impl Strategy<Value = Variant> {
    prop_oneof![
        Just(Preset::OneAtATime32.variant()),
        Just(Preset::OneAtATime64.variant()),
        Just(VariantBuilder::new().width(16).build().unwrap()),
    ]
}

fn any_segment_set() -> impl Strategy<Value = SegmentSet> {
    prop::collection::vec(prop::collection::vec(b'a'..=b'f', 0..4), 1..4)
        .prop_map(|candidates| SegmentSet::new(candidates))
}

fn any_search_space() -> impl Strategy<Value = SearchSpace> {
    prop::collection::vec(any_segment_set(), 0..3).prop_map(SearchSpace::new)
}

proptest! {
    #[test]
    fn inverse_of_odd_constants(constant in any::<u64>(), width in 1u32..=64) {
        let constant = (constant | 1) & width_mask(width);
        let inverse = compute_inverse(constant, width).unwrap();

        prop_assert!(is_inverse(constant, inverse, width));
        prop_assert_eq!(inverse & width_mask(width), inverse);
        prop_assert_eq!(Ok(constant), compute_inverse(inverse, width));
    }

    #[test]
    fn multiplication_is_undone(constant in any::<u64>(), x in any::<u64>(), width in 1u32..=64) {
        let mask = width_mask(width);
        let constant = (constant | 1) & mask;
        let x = x & mask;
        let inverse = compute_inverse(constant, width).unwrap();

        prop_assert_eq!(x, x.wrapping_mul(constant).wrapping_mul(inverse) & mask);
    }

    #[test]
    fn loop_stage_round_trip(variant in any_variant(), state in any::<u64>(), bytes in any::<Vec<u8>>()) {
        let state = state & variant.mask();
        let hashed = variant.loop_stage(state, &bytes).unwrap();

        prop_assert_eq!(Ok(state), variant.inverse_loop_stage(hashed, &bytes));
    }

    #[test]
    fn final_stage_round_trip(variant in any_variant(), state in any::<u64>()) {
        let state = state & variant.mask();

        prop_assert_eq!(
            Ok(state),
            variant.inverse_final_stage(variant.final_stage(state).unwrap())
        );
        prop_assert_eq!(
            Ok(state),
            variant.final_stage(variant.inverse_final_stage(state).unwrap())
        );
    }

    #[test]
    fn inverse_hash_recovers_the_seed(variant in any_variant(), seed in any::<u64>(), text in any::<Vec<u8>>()) {
        let seed = seed & variant.mask();
        let target = variant.forward_hash(seed, &text).unwrap();

        prop_assert_eq!(Ok(seed), variant.inverse_hash(&text, target));
    }

    #[test]
    fn loop_stage_splits(variant in any_variant(), prefix in any::<Vec<u8>>(), suffix in any::<Vec<u8>>()) {
        let middle = variant.loop_stage(0, &prefix).unwrap();
        let expected = variant.final_stage(variant.loop_stage(middle, &suffix).unwrap());

        prop_assert_eq!(expected, variant.forward_hash(0, &[prefix, suffix].concat()));
    }

    #[test]
    fn forward_tables_walk_back_to_the_seed(variant in any_variant(), seed in any::<u64>(), space in any_search_space()) {
        let seed = seed & variant.mask();
        let table = build_table(&variant, seed, &space, Direction::Forward).unwrap();

        prop_assert!(table.is_complete());
        prop_assert!(table.verify(&variant));
        for candidate in table.iter() {
            prop_assert_eq!(Ok(seed), variant.inverse_loop_stage(candidate.hash(), candidate.text()));
        }
    }

    #[test]
    fn search_agrees_with_brute_force(
        variant in any_variant(),
        prefix in any_search_space(),
        suffix in any_search_space(),
        sequential in any::<bool>(),
    ) {
        let text = prefix
            .texts()
            .next()
            .into_iter()
            .chain(suffix.texts().last())
            .flatten()
            .collect::<Vec<_>>();
        let target = variant.forward_hash(0, &text).unwrap();

        let outcome = Search::new(variant, 0, target, prefix.clone(), suffix.clone())
            .order(MatchOrder::Lexicographic)
            .parallel(!sequential)
            .run()
            .unwrap();
        let expected = brute_force(&variant, 0, target, &prefix, &suffix).unwrap();

        prop_assert!(outcome.is_complete());
        prop_assert!(!outcome.matches.is_empty());
        prop_assert_eq!(expected, outcome.matches.into_vec());
    }
}
