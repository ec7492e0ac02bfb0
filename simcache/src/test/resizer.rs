use crate::cache::{CacheTrait, GenericCache, Geometry};
use crate::config::{AdaptiveConfig, ReplacementPolicyConfig, SimulatorConfig, WritePolicyConfig};
use crate::coordinator::AccessCoordinator;
use crate::error::Result;
use crate::memory::Memory;
use crate::resizer::{scheduled_size, ResizeStrategy, Resizer};
use crate::simulator::Simulator;
use crate::util::Xorshift64;

fn filled_coordinator(cache_size: u64, blocks: u64, write_policy: WritePolicyConfig) -> Result<AccessCoordinator> {
    let geometry = Geometry::new(cache_size, 2, Some(2))?;
    let memory = Memory::new(64, 2)?;
    let cache = GenericCache::new(geometry, ReplacementPolicyConfig::LeastRecentlyUsed, 0);
    let mut cpu = AccessCoordinator::new(cache, memory, write_policy).with_seed(21);
    cpu.allocate(32)?;
    for block in 0..blocks {
        cpu.write(block * 2, block as i64 + 100)?;
    }
    Ok(cpu)
}

#[test]
fn growing_keeps_every_line() -> Result<()> {
    let mut cpu = filled_coordinator(8, 4, WritePolicyConfig::WriteThrough)?;
    assert_eq!(cpu.cache().resident_count(), 4);
    let event = cpu.resize_to(32)?.unwrap();
    assert_eq!((event.from, event.to, event.migrated, event.discarded), (8, 32, 4, 0));
    assert_eq!(cpu.cache().geometry().num_sets(), 8);
    assert_eq!(cpu.cache_size(), 32);
    cpu.reset_stats();
    for block in 0..4 {
        assert_eq!(cpu.read(block * 2)?, Some(block as i64 + 100));
    }
    assert_eq!(cpu.stats().misses, 0);
    Ok(())
}

#[test]
fn shrinking_a_full_cache_drops_the_excess() -> Result<()> {
    // 4 sets of 2, every set full
    let mut cpu = filled_coordinator(16, 8, WritePolicyConfig::WriteThrough)?;
    assert_eq!(cpu.cache().resident_count(), 8);
    let event = cpu.resize_to(8)?.unwrap();
    assert_eq!(event.migrated, 4);
    assert_eq!(event.discarded, 8 - 4);
    assert_eq!(cpu.cache().resident_count(), 4);
    for set in 0..2 {
        assert_eq!(cpu.cache().set_occupancy(set), 2);
    }
    // Write-through memory is current, so discarded lines are still readable
    for block in 0..8 {
        assert_eq!(cpu.read(block * 2)?, Some(block as i64 + 100));
    }
    Ok(())
}

#[test]
fn shrinking_without_overflow_drops_nothing() -> Result<()> {
    let mut cpu = filled_coordinator(16, 2, WritePolicyConfig::WriteThrough)?;
    let event = cpu.resize_to(4)?.unwrap();
    assert_eq!((event.migrated, event.discarded), (2, 0));
    assert_eq!(cpu.cache().geometry().num_sets(), 1);
    assert!(cpu.cache().contains(0));
    assert!(cpu.cache().contains(2));
    Ok(())
}

#[test]
fn shrinking_write_back_flushes_discarded_dirty_lines() -> Result<()> {
    let mut cpu = filled_coordinator(16, 8, WritePolicyConfig::WriteBack)?;
    for block in 0..8 {
        assert_eq!(cpu.memory().read_block(block * 2)?.word(0), None);
    }
    cpu.resize_to(4)?;
    for block in 0..8 {
        let address = block * 2;
        let in_memory = cpu.memory().read_block(address)?.word(0) == Some(block as i64 + 100);
        assert!(cpu.cache().contains(address) != in_memory, "block {block} lost or duplicated");
    }
    Ok(())
}

#[test]
fn resize_to_same_size_is_a_no_op() -> Result<()> {
    let mut cpu = filled_coordinator(8, 2, WritePolicyConfig::WriteThrough)?;
    assert!(cpu.resize_to(8)?.is_none());
    assert_eq!(cpu.resize_count(), 0);
    assert!(cpu.last_resize().is_none());
    assert!(cpu.resize_to(128).is_err());
    assert!(cpu.resize_to(2).is_err());
    assert_eq!(cpu.cache_size(), 8);
    Ok(())
}

#[test]
fn migration_leaves_the_source_untouched() -> Result<()> {
    let geometry = Geometry::new(8, 2, Some(2))?;
    let mut cache = GenericCache::new(geometry, ReplacementPolicyConfig::FirstInFirstOut, 0);
    for block in 0..4u64 {
        cache.load(block * 2, crate::block::Block::from_values([block as i64, 0]));
    }
    let before = cache.lines();
    let migration = crate::resizer::migrate(&cache, 4, &mut Xorshift64::new(1))?;
    assert_eq!(cache.lines(), before);
    assert_eq!(migration.cache.policy(), ReplacementPolicyConfig::FirstInFirstOut);
    assert_eq!(migration.cache.resident_count() + migration.discarded.len(), 4);
    Ok(())
}

#[test]
fn stochastic_targets_are_clamped() {
    let always_shrink = ResizeStrategy::Stochastic { resize_probability: 1.0, shrink_probability: 1.0 };
    let mut resizer = Resizer::with_limits(always_shrink, 4, 16, 1);
    assert_eq!(resizer.target_size(16, 2, 0), 8);
    assert_eq!(resizer.target_size(4, 2, 0), 4);

    let always_grow = ResizeStrategy::Stochastic { resize_probability: 1.0, shrink_probability: 0.0 };
    let mut resizer = Resizer::with_limits(always_grow, 4, 16, 1);
    assert_eq!(resizer.target_size(8, 2, 0), 16);
    assert_eq!(resizer.target_size(16, 2, 0), 16);

    let never = ResizeStrategy::Stochastic { resize_probability: 0.0, shrink_probability: 0.5 };
    let mut resizer = Resizer::with_limits(never, 4, 16, 1);
    for _ in 0..100 {
        assert_eq!(resizer.target_size(8, 2, 0), 8);
    }
}

#[test]
fn scheduled_profile_ramps_down() {
    // m = 4, m^2.5 = 32
    assert_eq!(scheduled_size(1, 4, 0), 4);
    assert_eq!(scheduled_size(1, 4, 31), 4);
    assert_eq!(scheduled_size(1, 4, 40), 16);
    assert_eq!(scheduled_size(1, 4, 50), 8);
    assert_eq!(scheduled_size(1, 4, 60), 4);
    assert_eq!(scheduled_size(1, 4, 1_000), 4);
    // An overflowing plateau saturates instead of wrapping to zero
    assert_eq!(scheduled_size(u64::MAX / 2, 4, 0), 1 << 63);
}

#[test]
fn resizer_limits_follow_geometry() -> Result<()> {
    let geometry = Geometry::new(64, 4, Some(2))?;
    let resizer = Resizer::new(&AdaptiveConfig::stochastic().with_upper_limit(4096), &geometry, 1024, 0);
    assert_eq!(resizer.lower_limit(), 8);
    assert_eq!(resizer.upper_limit(), 1024);
    Ok(())
}

fn adaptive_workload(config: &SimulatorConfig) -> Result<Simulator> {
    let mut simulator = Simulator::new(config)?;
    let base = simulator.allocate(256)?;
    let mut model = vec![None; 256];
    let mut rng = Xorshift64::new(8);
    for step in 0..3000 {
        let offset = rng.next_bounded(256);
        if rng.chance(0.3) {
            simulator.write(base + offset, step)?;
            model[offset as usize] = Some(step);
        } else {
            assert_eq!(simulator.read(base + offset)?, model[offset as usize]);
        }
        let size = simulator.coordinator().cache_size();
        assert!(size.is_power_of_two());
        assert!((4..=64).contains(&size), "cache size {size} escaped its limits");
        if let Some(event) = simulator.coordinator().last_resize() {
            assert_ne!(event.from, event.to);
            assert_eq!(event.to, size);
            if event.to > event.from {
                assert_eq!(event.discarded, 0);
            }
        }
    }
    Ok(simulator)
}

#[test]
fn stochastic_adaptive_simulation_stays_consistent() -> Result<()> {
    for write_policy in [WritePolicyConfig::WriteThrough, WritePolicyConfig::WriteBack] {
        for policy in [ReplacementPolicyConfig::LeastRecentlyUsed, ReplacementPolicyConfig::Random] {
            let config = SimulatorConfig::new(1024, 16, 2, Some(2))
                .with_replacement_policy(policy)
                .with_write_policy(write_policy)
                .with_adaptive(AdaptiveConfig::stochastic().with_upper_limit(64))
                .with_seed(3);
            let simulator = adaptive_workload(&config)?;
            assert!(simulator.coordinator().resize_count() > 0);
        }
    }
    Ok(())
}

#[test]
fn scheduled_adaptive_simulation_stays_consistent() -> Result<()> {
    let config = SimulatorConfig::new(1024, 64, 2, Some(2))
        .with_write_policy(WritePolicyConfig::WriteBack)
        .with_adaptive(AdaptiveConfig::scheduled(2).with_upper_limit(64));
    let simulator = adaptive_workload(&config)?;
    // m = 4 words, so the profile bottoms out at the lower limit well before the end
    assert_eq!(simulator.coordinator().cache_size(), 4);
    Ok(())
}

#[test]
fn long_adaptive_run_keeps_only_the_latest_resize() -> Result<()> {
    let config = SimulatorConfig::new(4096, 16, 4, Some(2))
        .with_adaptive(AdaptiveConfig::stochastic().with_upper_limit(1024))
        .with_seed(9);
    let mut simulator = Simulator::new(&config)?;
    let base = simulator.allocate(4096)?;
    // The range is four times the upper limit, so every strided read misses
    for step in 0..50_000u64 {
        simulator.read(base + (step * 4) % 4096)?;
    }
    let coordinator = simulator.coordinator();
    assert_eq!(coordinator.stats().misses, 50_000);
    assert!(coordinator.resize_count() > 1_000, "only {} resizes", coordinator.resize_count());
    let last = coordinator.last_resize().unwrap();
    assert_eq!(last.to, coordinator.cache_size());
    Ok(())
}
