//! Index arithmetic: factorial orderings and the mixed-radix define space.

use std::collections::HashSet;
use std::sync::Arc;

use lfsperm_harness::space::{decode_mixed_radix, encode_mixed_radix};
use lfsperm_harness::{
    CasePlan, Define, DefineTable, ErrorKind, Geometry, PermError, PermutationSpace, factorial,
    permutation,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn every_index_yields_a_bijection(n in 0_usize..9, seed in any::<usize>()) {
        let count = factorial(n).expect("small n");
        let i = seed % count;
        let mut ordering = permutation(i, n).expect("in range");
        ordering.sort_unstable();
        let identity: Vec<u32> = (0..u32::try_from(n).expect("small")).collect();
        prop_assert_eq!(ordering, identity);
    }

    #[test]
    fn mixed_radix_digits_round_trip(
        radices in proptest::collection::vec(1_usize..6, 1..5),
        seed in any::<usize>(),
    ) {
        let count: usize = radices.iter().product();
        let p = seed % count;
        let digits = decode_mixed_radix(p, &radices);
        for (digit, radix) in digits.iter().zip(&radices) {
            prop_assert!(digit < radix);
        }
        prop_assert_eq!(encode_mixed_radix(&digits, &radices), Some(p));
    }
}

#[test]
fn all_orderings_are_distinct() {
    for n in 0..=6 {
        let count = factorial(n).expect("small n");
        let seen: HashSet<Vec<u32>> = (0..count)
            .map(|i| permutation(i, n).expect("in range"))
            .collect();
        assert_eq!(seen.len(), count, "n = {n}");
    }
}

#[test]
fn index_zero_is_identity() {
    assert_eq!(permutation(0, 5).expect("valid"), vec![0, 1, 2, 3, 4]);
    assert_eq!(permutation(1, 2).expect("valid"), vec![1, 0]);
    assert!(permutation(0, 0).expect("empty").is_empty());
}

#[test]
fn factorial_index_past_the_end_is_rejected() {
    let err = permutation(24, 4).expect_err("4! = 24 orderings");
    assert!(matches!(err, PermError::PermutationOutOfRange { index: 24, count: 24 }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn factorial_overflow_is_an_error() {
    assert!(factorial(20).is_ok());
    let err = factorial(21).expect_err("21! overflows 64 bits");
    assert!(matches!(err, PermError::FactorialOverflow { n: 21 }));
}

#[test]
fn space_count_is_the_product_of_candidate_counts() {
    let table = Arc::new(DefineTable::with_suite_names(["A", "B", "C"]).expect("names"));
    let defines = [
        Define::list("A", vec![1, 2]),
        Define::list("B", vec![10, 20, 30]),
        Define::list("C", vec![100, 200, 300, 400]),
    ];
    let geometry = Geometry::by_name("default").expect("preset");
    let plan = CasePlan::new("abc", table, &defines, &[geometry], &[]).expect("plan");
    assert_eq!(plan.count(), 2 * 3 * 4);

    let mut seen = HashSet::new();
    for p in 0..plan.count() {
        let mut set = plan.define_set(p).expect("in range");
        let triple = (
            set.get_by_name("A").expect("A"),
            set.get_by_name("B").expect("B"),
            set.get_by_name("C").expect("C"),
        );
        assert!(seen.insert(triple), "permutation {p} repeats {triple:?}");
    }
    assert_eq!(seen.len(), 24);
    assert!(plan.define_set(24).is_err());
}

#[test]
fn first_declared_define_varies_fastest() {
    let table = Arc::new(DefineTable::with_suite_names(["A", "B"]).expect("names"));
    let defines = [Define::list("A", vec![1, 2]), Define::list("B", vec![10, 20])];
    let geometry = Geometry::by_name("default").expect("preset");
    let plan = CasePlan::new("ab", table, &defines, &[geometry], &[]).expect("plan");
    let values: Vec<(i64, i64)> = (0..plan.count())
        .map(|p| {
            let mut set = plan.define_set(p).expect("in range");
            (
                set.get_by_name("A").expect("A"),
                set.get_by_name("B").expect("B"),
            )
        })
        .collect();
    assert_eq!(values, vec![(1, 10), (2, 10), (1, 20), (2, 20)]);
}

#[test]
fn oversized_space_is_rejected() {
    let err = PermutationSpace::new("huge", vec![usize::MAX, 2]).expect_err("overflow");
    assert!(matches!(err, PermError::PermutationSpaceOverflow { .. }));
}
