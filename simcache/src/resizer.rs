//! Adaptive cache resizing
//!
//! After every miss the coordinator asks the [`Resizer`] for a target capacity. When the target
//! differs from the current capacity, a new cache is built and the resident lines are migrated into
//! it. The coordinator only swaps the new cache in once migration has fully succeeded, so a
//! half-migrated cache is never observable.
//!
//! Migration keeps the block size, associativity and replacement policy. Each resident line's
//! address is recovered from the old geometry and reloaded through the new one, which may place it
//! in a different set. When shrinking, a destination set can receive more lines than it can hold;
//! a uniformly random subset of them is kept and the rest are discarded. Growing by a power of two
//! splits every old set across several new ones, so it never discards anything.

use std::collections::BTreeMap;
use crate::cache::{CacheLine, CacheTrait, GenericCache, Geometry};
use crate::config::{AdaptiveConfig, ResizeStrategyConfig};
use crate::error::Result;
use crate::util::{floor_power_of_two, Xorshift64};

/// How the next capacity is chosen
#[derive(Debug, Clone, PartialEq)]
pub enum ResizeStrategy {
    /// With probability `resize_probability` resize at all, then halve with probability
    /// `shrink_probability` or double otherwise
    Stochastic { resize_probability: f64, shrink_probability: f64 },
    /// Capacity follows a ramp of the elapsed access count: a plateau at `c1 * block_size`, a
    /// linear ramp down, then a floor at one block
    Scheduled { c1: u64 },
}

impl From<&ResizeStrategyConfig> for ResizeStrategy {
    fn from(value: &ResizeStrategyConfig) -> Self {
        match *value {
            ResizeStrategyConfig::Stochastic { resize_probability, shrink_probability } => {
                ResizeStrategy::Stochastic { resize_probability, shrink_probability }
            }
            ResizeStrategyConfig::Scheduled { c1 } => ResizeStrategy::Scheduled { c1 },
        }
    }
}

/// Summary of one completed resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub from: u64,
    pub to: u64,
    pub migrated: usize,
    pub discarded: usize,
}

/// A fully built replacement cache, and the lines which didn't fit in it
pub struct Migration {
    pub cache: GenericCache,
    /// Discarded lines with their addresses. Dirty ones still need writing back under write-back
    pub discarded: Vec<(u64, CacheLine)>,
    pub event: ResizeEvent,
}

/// Decides target capacities and migrates cache contents between geometries
pub struct Resizer {
    strategy: ResizeStrategy,
    lower_limit: u64,
    upper_limit: u64,
    rng: Xorshift64,
}

impl Resizer {
    /// Creates a resizer for caches shaped like `geometry`
    ///
    /// The lower limit is one full set (`associativity * block_size`), the upper limit is the
    /// configured ceiling capped at the memory size
    pub fn new(config: &AdaptiveConfig, geometry: &Geometry, memory_size: u64, seed: u64) -> Self {
        Self::with_limits(
            ResizeStrategy::from(&config.strategy),
            geometry.associativity() * geometry.block_size(),
            config.upper_limit.min(memory_size),
            seed,
        )
    }

    pub fn with_limits(strategy: ResizeStrategy, lower_limit: u64, upper_limit: u64, seed: u64) -> Self {
        assert!(lower_limit <= upper_limit, "resize lower limit {lower_limit} is above the upper limit {upper_limit}");
        Self {
            strategy,
            lower_limit,
            upper_limit,
            rng: Xorshift64::new(seed),
        }
    }

    pub fn lower_limit(&self) -> u64 {
        self.lower_limit
    }

    pub fn upper_limit(&self) -> u64 {
        self.upper_limit
    }

    pub fn strategy(&self) -> &ResizeStrategy {
        &self.strategy
    }

    /// Chooses the next capacity. Returning `current_size` means no resize
    ///
    /// # Arguments
    ///
    /// * `current_size`: The current cache capacity in words
    /// * `block_size`: Words per block
    /// * `elapsed`: Accesses made so far, used by the scheduled strategy
    ///
    /// returns: u64
    pub fn target_size(&mut self, current_size: u64, block_size: u64, elapsed: u64) -> u64 {
        let candidate = match self.strategy {
            ResizeStrategy::Stochastic { resize_probability, shrink_probability } => {
                if !self.rng.chance(resize_probability) {
                    return current_size;
                }
                if self.rng.chance(shrink_probability) {
                    current_size / 2
                } else {
                    current_size.saturating_mul(2)
                }
            }
            ResizeStrategy::Scheduled { c1 } => scheduled_size(c1, block_size, elapsed),
        };
        candidate.clamp(self.lower_limit, self.upper_limit)
    }

    /// Builds a cache of `new_size` holding as much of `old` as fits, see [`migrate`]
    pub fn migrate(&mut self, old: &GenericCache, new_size: u64) -> Result<Migration> {
        migrate(old, new_size, &mut self.rng)
    }
}

/// Builds a cache of `new_size` with the same block size, associativity and policy as `old`,
/// holding as much of `old` as fits
///
/// `old` is left untouched, the caller decides whether to swap the result in
pub fn migrate(old: &GenericCache, new_size: u64, rng: &mut Xorshift64) -> Result<Migration> {
    let old_geometry = *old.geometry();
    let new_geometry = old_geometry.with_cache_size(new_size)?;
    let mut cache = GenericCache::new(new_geometry, old.policy(), rng.next_u64());
    let associativity = new_geometry.associativity() as usize;

    // Addresses are already recovered through the old geometry
    let mut groups: BTreeMap<usize, Vec<(u64, CacheLine)>> = BTreeMap::new();
    for (address, line) in old.lines() {
        groups.entry(new_geometry.set_of(address)).or_default().push((address, line));
    }

    let mut discarded = Vec::new();
    let mut migrated = 0;
    for (_, mut group) in groups {
        if group.len() > associativity {
            // Partial Fisher-Yates, the first `associativity` entries become a uniform sample
            for i in 0..associativity {
                let j = i + rng.next_bounded((group.len() - i) as u64) as usize;
                group.swap(i, j);
            }
            discarded.extend(group.drain(associativity..));
        }
        for (address, line) in group {
            let evicted = cache.load_line(address, line);
            debug_assert!(evicted.is_none(), "migration overfilled a set");
            migrated += 1;
        }
    }

    let event = ResizeEvent {
        from: old_geometry.cache_size(),
        to: new_size,
        migrated,
        discarded: discarded.len(),
    };
    Ok(Migration { cache, discarded, event })
}

/// The scheduled capacity profile, rounded down to a power of two
///
/// With `m = c1 * block_size` and `t` accesses elapsed, the capacity is `m` until `m^2.5`, then
/// `2 * m^2.5 - t` until that reaches `block_size`, then `block_size`
pub fn scheduled_size(c1: u64, block_size: u64, elapsed: u64) -> u64 {
    let m = c1.saturating_mul(block_size) as f64;
    let block = block_size as f64;
    let peak = m.powf(2.5);
    let t = elapsed as f64;
    let size = if t < peak {
        m
    } else if t < 2.0 * peak - block {
        2.0 * peak - t
    } else {
        block
    };
    floor_power_of_two(size as u64)
}
