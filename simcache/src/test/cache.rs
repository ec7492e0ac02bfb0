use proptest::prelude::*;
use std::collections::HashSet;
use crate::block::Block;
use crate::cache::{Cache, CacheLine, CacheTrait, GenericCache, Geometry};
use crate::config::ReplacementPolicyConfig;
use crate::replacement_policies::{LeastFrequentlyUsed, LeastRecentlyUsed};

const POLICIES: [ReplacementPolicyConfig; 4] = [
    ReplacementPolicyConfig::LeastRecentlyUsed,
    ReplacementPolicyConfig::LeastFrequentlyUsed,
    ReplacementPolicyConfig::FirstInFirstOut,
    ReplacementPolicyConfig::Random,
];

fn block_of(values: &[i64]) -> Block {
    Block::from_values(values.iter().copied())
}

#[test]
fn read_misses_then_hits_after_load() {
    let geometry = Geometry::new(8, 2, Some(2)).unwrap();
    let mut cache = GenericCache::new(geometry, ReplacementPolicyConfig::LeastRecentlyUsed, 0);
    assert!(cache.read(5).is_none());
    assert_eq!(cache.resident_count(), 0);

    assert!(cache.load(5, block_of(&[40, 50])).is_none());
    let block = cache.read(5).unwrap();
    assert_eq!(block.word(geometry.offset_of(5)), Some(50));
    assert_eq!(block.word(geometry.offset_of(4)), Some(40));
    assert!(cache.contains(4));
    assert_eq!(cache.resident_count(), 1);
}

#[test]
fn overwrite_only_hits_resident_lines() {
    let geometry = Geometry::new(8, 2, Some(2)).unwrap();
    let mut cache = GenericCache::new(geometry, ReplacementPolicyConfig::FirstInFirstOut, 0);
    assert!(!cache.overwrite(3, 1));
    assert_eq!(cache.resident_count(), 0);

    cache.load(2, Block::new(2));
    assert!(cache.overwrite(3, 1));
    let lines = cache.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].0, 2);
    assert!(lines[0].1.dirty);
    assert_eq!(lines[0].1.block.words(), &[None, Some(1)]);
}

#[test]
fn load_evicts_and_reports_victim() {
    // Direct mapped, 2 sets: addresses 0 and 4 share set 0
    let geometry = Geometry::new(4, 2, Some(1)).unwrap();
    let mut cache = GenericCache::new(geometry, ReplacementPolicyConfig::LeastRecentlyUsed, 0);
    cache.load(0, block_of(&[1, 2]));
    cache.overwrite(1, 9);
    let evicted = cache.load(4, block_of(&[3, 4])).unwrap();
    assert_eq!(evicted.address, 0);
    assert_eq!(evicted.line, CacheLine::dirty(block_of(&[1, 9])));
    assert!(!cache.contains(0));
    assert!(cache.contains(5));
    assert_eq!(cache.set_occupancy(0), 1);
}

#[test]
fn lru_cache_evicts_first_loaded_without_hits() {
    // Fully associative, one word blocks: tag equals address
    let geometry = Geometry::new(4, 1, None).unwrap();
    let mut cache = Cache::<LeastRecentlyUsed>::new(geometry, 0);
    for address in 0..4 {
        assert!(cache.load(address, Block::new(1)).is_none());
    }
    assert_eq!(cache.load(4, Block::new(1)).unwrap().address, 0);
}

#[test]
fn lfu_cache_keeps_frequently_read_line() {
    let geometry = Geometry::new(2, 1, None).unwrap();
    let mut cache = Cache::<LeastFrequentlyUsed>::new(geometry, 0);
    cache.load(1, Block::new(1));
    cache.load(2, Block::new(1));
    for _ in 0..3 {
        assert!(cache.read(1).is_some());
    }
    assert_eq!(cache.load(3, Block::new(1)).unwrap().address, 2);
    assert!(cache.contains(1));
}

#[test]
fn reloading_resident_tag_overwrites_in_place() {
    let geometry = Geometry::new(4, 2, None).unwrap();
    for policy in POLICIES {
        let mut cache = GenericCache::new(geometry, policy, 1);
        cache.load(0, block_of(&[1, 1]));
        cache.load(2, block_of(&[2, 2]));
        assert!(cache.overwrite(0, 5));
        assert!(cache.load(0, block_of(&[7, 7])).is_none(), "{policy:?} evicted on reload");
        assert_eq!(cache.resident_count(), 2);
        let lines = cache.lines();
        assert_eq!(lines[0], (0, CacheLine::clean(block_of(&[7, 7]))));
        assert!(cache.contains(2));
    }
}

#[test]
fn take_dirty_lines_cleans_them() {
    let geometry = Geometry::new(8, 2, Some(2)).unwrap();
    let mut cache = GenericCache::new(geometry, ReplacementPolicyConfig::LeastRecentlyUsed, 0);
    cache.load(0, Block::new(2));
    cache.load(2, Block::new(2));
    cache.overwrite(3, 8);
    let mut expected = Block::new(2);
    expected.set_word(1, 8);
    assert_eq!(cache.take_dirty_lines(), vec![(2, expected)]);
    assert!(cache.take_dirty_lines().is_empty());
    assert_eq!(cache.resident_count(), 2);
}

#[test]
fn policy_kind_is_reported() {
    let geometry = Geometry::new(8, 2, Some(2)).unwrap();
    for policy in POLICIES {
        assert_eq!(GenericCache::new(geometry, policy, 0).policy(), policy);
    }
}

proptest! {
    #[test]
    fn occupancy_never_exceeds_associativity(
        policy_index in 0usize..4,
        ways_exp in 0u32..4,
        addresses in prop::collection::vec(0u64..256, 1..200),
    ) {
        // One set, so every load competes for the same lines
        let associativity = 1u64 << ways_exp;
        let geometry = Geometry::new(associativity, 1, None).unwrap();
        let mut cache = GenericCache::new(geometry, POLICIES[policy_index], 5);
        let mut distinct = HashSet::new();
        for address in addresses {
            distinct.insert(address);
            if !cache.contains(address) {
                cache.load(address, Block::new(1));
            }
            prop_assert!(cache.set_occupancy(0) as u64 <= associativity);
            prop_assert_eq!(cache.resident_count(), distinct.len().min(associativity as usize));
        }
    }
}
