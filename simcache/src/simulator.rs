use std::time::{Duration, Instant};
use tracing::{debug, info};
use crate::block::Word;
use crate::cache::GenericCache;
use crate::config::SimulatorConfig;
use crate::coordinator::AccessCoordinator;
use crate::error::Result;
use crate::memory::Memory;
use crate::resizer::Resizer;
use crate::stats::{AccessStats, AccessSummary};
use crate::util::derive_seed;

/// A single access in a replayed sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(u64),
    Write(u64, i64),
}

/// The simulator builds a coordinator from a configuration, hands out flat addresses, and
/// collects results.
///
/// It supports calling replay multiple times, and will update the time taken to simulate and the
/// counters accordingly
pub struct Simulator {
    coordinator: AccessCoordinator,
    next_address: u64,
    simulation_time: Duration,
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A simulator configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, Error>
    ///
    /// # Examples
    ///
    /// ```
    /// use simcache::config::SimulatorConfig;
    /// use simcache::simulator::Simulator;
    ///
    /// let mut simulator = Simulator::new(&SimulatorConfig::new(32, 8, 2, Some(2))).unwrap();
    /// let base = simulator.allocate(4).unwrap();
    /// simulator.write(base + 1, 42).unwrap();
    /// assert_eq!(simulator.read(base + 1).unwrap(), Some(42));
    /// assert_eq!(simulator.summary().unwrap().total_access, 2);
    /// ```
    pub fn new(config: &SimulatorConfig) -> Result<Self> {
        let geometry = config.validate()?;
        let cache = GenericCache::new(geometry, config.replacement_policy, config.seed);
        let memory = Memory::new(config.memory_size, config.block_size)?;
        let mut coordinator = AccessCoordinator::new(cache, memory, config.write_policy)
            .with_seed(derive_seed(config.seed, 1));
        if let Some(adaptive) = &config.adaptive {
            let resizer = Resizer::new(adaptive, &geometry, config.memory_size, derive_seed(config.seed, 2));
            coordinator = coordinator.with_resizer(resizer);
        }
        info!(
            memory_size = config.memory_size,
            cache_size = geometry.cache_size(),
            block_size = geometry.block_size(),
            associativity = geometry.associativity(),
            sets = geometry.num_sets(),
            policy = ?config.replacement_policy,
            write_policy = ?config.write_policy,
            adaptive = config.adaptive.is_some(),
            "created simulator"
        );
        Ok(Self {
            coordinator,
            next_address: 0,
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Reserves `word_count` consecutive words and returns the first address
    ///
    /// Memory grows by exactly the blocks needed to cover the new range. Allocations are packed, so
    /// consecutive allocations may share a block
    pub fn allocate(&mut self, word_count: u64) -> Result<u64> {
        let base = self.next_address;
        let end = base.saturating_add(word_count);
        let block_size = self.coordinator.memory().block_size();
        let needed_blocks = end / block_size + u64::from(end % block_size != 0);
        let allocated = self.coordinator.memory().allocated_blocks();
        self.coordinator.allocate(needed_blocks.saturating_sub(allocated))?;
        self.next_address = end;
        debug!(base, words = word_count, "allocated array");
        Ok(base)
    }

    /// Allocates and initialises every word to `value`
    ///
    /// The initialising writes go through the cache and are counted like any other access
    pub fn allocate_with(&mut self, word_count: u64, value: i64) -> Result<u64> {
        let base = self.allocate(word_count)?;
        for address in base..base + word_count {
            self.coordinator.write(address, value)?;
        }
        Ok(base)
    }

    pub fn read(&mut self, address: u64) -> Result<Word> {
        self.coordinator.read(address)
    }

    pub fn write(&mut self, address: u64, value: i64) -> Result<()> {
        self.coordinator.write(address, value)
    }

    /// Runs a sequence of accesses, timing the simulation
    ///
    /// Values read are discarded; this is for measuring hit rates of an access pattern
    pub fn replay<I: IntoIterator<Item = Access>>(&mut self, accesses: I) -> Result<&AccessStats> {
        let start = Instant::now();
        let result = accesses.into_iter().try_for_each(|access| match access {
            Access::Read(address) => self.coordinator.read(address).map(|_| ()),
            Access::Write(address, value) => self.coordinator.write(address, value),
        });
        self.simulation_time += start.elapsed();
        result?;
        Ok(self.coordinator.stats())
    }

    pub fn summary(&self) -> Result<AccessSummary> {
        self.coordinator.summary()
    }

    pub fn reset_stats(&mut self) {
        self.coordinator.reset_stats()
    }

    /// Gets the wall-clock execution time spent in replay
    pub fn execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// The next address [`Simulator::allocate`] would hand out
    pub fn next_address(&self) -> u64 {
        self.next_address
    }

    pub fn coordinator(&self) -> &AccessCoordinator {
        &self.coordinator
    }

    /// Direct access to the coordinator, for flushing or forcing a resize between runs
    pub fn coordinator_mut(&mut self) -> &mut AccessCoordinator {
        &mut self.coordinator
    }
}
