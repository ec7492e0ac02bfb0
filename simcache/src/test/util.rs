use crate::util::{derive_seed, Xorshift64};

#[test]
fn bounded_values_stay_in_range_and_cover_it() {
    let mut rng = Xorshift64::new(3);
    let mut counts = [0u32; 3];
    for _ in 0..30_000 {
        counts[rng.next_bounded(3) as usize] += 1;
    }
    for count in counts {
        assert!((9_000..11_000).contains(&count), "counts {counts:?} are not uniform");
    }
    for _ in 0..100 {
        assert_eq!(rng.next_bounded(1), 0);
    }
}

#[test]
fn bounded_handles_bounds_near_the_top_of_the_range() {
    // Half of all raw outputs get rejected at this bound
    let bound = (1u64 << 63) + 1;
    let mut rng = Xorshift64::new(77);
    for _ in 0..1_000 {
        assert!(rng.next_bounded(bound) < bound);
        assert!(rng.next_bounded(u64::MAX) < u64::MAX);
    }
}

#[test]
fn zero_seed_is_remapped_and_derived_seeds_differ() {
    let mut rng = Xorshift64::new(0);
    assert_ne!(rng.next_u64(), 0);
    assert_ne!(derive_seed(5, 0), derive_seed(5, 1));
    assert_eq!(derive_seed(5, 1), derive_seed(5, 1));
}
