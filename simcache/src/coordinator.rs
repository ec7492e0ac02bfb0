use tracing::{debug, trace};
use crate::block::Word;
use crate::cache::{CacheLine, CacheTrait, Evicted, GenericCache};
use crate::config::WritePolicyConfig;
use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::resizer::{migrate, Migration, ResizeEvent, Resizer};
use crate::stats::{AccessStats, AccessSummary};
use crate::util::Xorshift64;

/// Mediates every access through the cache, falling back to memory on a miss
///
/// The coordinator owns both the cache and the memory, and is the only thing which mutates either.
/// Every access takes `&mut self`, so parallel experiments each build their own
pub struct AccessCoordinator {
    cache: GenericCache,
    memory: Memory,
    write_policy: WritePolicyConfig,
    stats: AccessStats,
    resizer: Option<Resizer>,
    resize_count: usize,
    last_resize: Option<ResizeEvent>,
    rng: Xorshift64,
}

impl AccessCoordinator {
    pub fn new(cache: GenericCache, memory: Memory, write_policy: WritePolicyConfig) -> Self {
        debug_assert_eq!(cache.geometry().block_size(), memory.block_size());
        Self {
            cache,
            memory,
            write_policy,
            stats: AccessStats::default(),
            resizer: None,
            resize_count: 0,
            last_resize: None,
            rng: Xorshift64::new(0),
        }
    }

    /// Enables adaptive resizing, run after every miss
    pub fn with_resizer(mut self, resizer: Resizer) -> Self {
        self.resizer = Some(resizer);
        self
    }

    /// Seeds the generator used by [`AccessCoordinator::resize_to`]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Xorshift64::new(seed);
        self
    }

    /// Grows memory by `num_blocks` blocks. The cache is not involved
    pub fn allocate(&mut self, num_blocks: u64) -> Result<()> {
        self.memory.allocate(num_blocks)
    }

    /// Reads the word at `address`
    ///
    /// Invalid addresses fail before anything is counted. On a miss the block is fetched from
    /// memory and loaded, then the resize hook runs
    ///
    /// returns: Result<Word, Error>, `None` for a word which was never written
    pub fn read(&mut self, address: u64) -> Result<Word> {
        self.memory.check_address(address)?;
        let offset = self.cache.geometry().offset_of(address);
        if let Some(block) = self.cache.read(address) {
            let value = block.word(offset);
            self.stats.record_hit();
            return Ok(value);
        }

        self.stats.record_miss();
        trace!(address, "read miss");
        let block = self.memory.read_block(address)?;
        let value = block.word(offset);
        let evicted = self.cache.load(address, block);
        self.handle_eviction(evicted)?;
        self.maybe_resize()?;
        Ok(value)
    }

    /// Writes `value` to `address`
    ///
    /// A miss fetches the block, applies the write to it, and loads it. Under write-through memory
    /// is updated on every write, under write-back the loaded line is dirty and memory is only
    /// updated when it leaves the cache
    pub fn write(&mut self, address: u64, value: i64) -> Result<()> {
        self.memory.check_address(address)?;
        if self.cache.overwrite(address, value) {
            self.stats.record_hit();
            if self.write_policy == WritePolicyConfig::WriteThrough {
                self.memory.write_word(address, value)?;
            }
            return Ok(());
        }

        self.stats.record_miss();
        trace!(address, "write miss");
        let mut block = self.memory.read_block(address)?;
        block.set_word(self.cache.geometry().offset_of(address), value);
        let evicted = match self.write_policy {
            WritePolicyConfig::WriteThrough => {
                self.memory.write_word(address, value)?;
                self.cache.load(address, block)
            }
            WritePolicyConfig::WriteBack => {
                self.cache.load_line(address, CacheLine::dirty(block))
            }
        };
        self.handle_eviction(evicted)?;
        self.maybe_resize()
    }

    /// Summarises the counters. Fails if nothing has been accessed since the last reset
    pub fn summary(&self) -> Result<AccessSummary> {
        self.stats.summary()
    }

    /// Zeroes the counters. Cache contents are kept
    pub fn reset_stats(&mut self) {
        self.stats = AccessStats::default();
    }

    /// Writes every dirty line back to memory. Lines stay resident and become clean
    pub fn flush(&mut self) -> Result<()> {
        for (address, block) in self.cache.take_dirty_lines() {
            self.memory.write_block(address, block)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> &AccessStats {
        &self.stats
    }

    pub fn cache(&self) -> &GenericCache {
        &self.cache
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn write_policy(&self) -> WritePolicyConfig {
        self.write_policy
    }

    /// Current cache capacity in words
    pub fn cache_size(&self) -> u64 {
        self.cache.geometry().cache_size()
    }

    /// Number of resizes performed so far
    pub fn resize_count(&self) -> usize {
        self.resize_count
    }

    /// The most recent resize, if any
    pub fn last_resize(&self) -> Option<&ResizeEvent> {
        self.last_resize.as_ref()
    }

    /// Migrates to a cache of `new_size` immediately, regardless of any resize strategy
    ///
    /// returns: Result<Option<ResizeEvent>, Error>, `None` if the size is unchanged
    pub fn resize_to(&mut self, new_size: u64) -> Result<Option<ResizeEvent>> {
        if new_size == self.cache_size() {
            return Ok(None);
        }
        if new_size > self.memory.memory_size() {
            return Err(Error::invalid_config(format!(
                "cache size {new_size} is larger than the memory size {}",
                self.memory.memory_size()
            )));
        }
        let migration = migrate(&self.cache, new_size, &mut self.rng)?;
        self.apply_migration(migration).map(Some)
    }

    fn handle_eviction(&mut self, evicted: Option<Evicted>) -> Result<()> {
        if let Some(Evicted { address, line }) = evicted {
            if line.dirty && self.write_policy == WritePolicyConfig::WriteBack {
                trace!(address, "writing back dirty victim");
                self.memory.write_block(address, line.block)?;
            }
        }
        Ok(())
    }

    fn maybe_resize(&mut self) -> Result<()> {
        let Some(resizer) = self.resizer.as_mut() else {
            return Ok(());
        };
        let geometry = *self.cache.geometry();
        let target = resizer.target_size(geometry.cache_size(), geometry.block_size(), self.stats.total_access);
        if target == geometry.cache_size() {
            return Ok(());
        }
        let migration = resizer.migrate(&self.cache, target)?;
        self.apply_migration(migration).map(|_| ())
    }

    fn apply_migration(&mut self, migration: Migration) -> Result<ResizeEvent> {
        if self.write_policy == WritePolicyConfig::WriteBack {
            for (address, line) in migration.discarded.into_iter().filter(|(_, l)| l.dirty) {
                self.memory.write_block(address, line.block)?;
            }
        }
        // Nothing above touched the live cache, so this swap is the only visible change
        self.cache = migration.cache;
        let event = migration.event;
        debug!(from = event.from, to = event.to, migrated = event.migrated, discarded = event.discarded, "resized cache");
        self.resize_count += 1;
        self.last_resize = Some(event);
        Ok(event)
    }
}
