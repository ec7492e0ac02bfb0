use std::collections::BTreeMap;
use tracing::trace;
use crate::block::Block;
use crate::config::ReplacementPolicyConfig;
use crate::error::{Error, Result};
use crate::replacement_policies::{FirstInFirstOut, LeastFrequentlyUsed, LeastRecentlyUsed, RandomReplacement, ReplacementPolicy};
use crate::util::derive_seed;

/// The shape of a cache, and the address decomposition it implies
///
/// All shift amounts and masks are derived once here. A geometry can only be obtained through
/// [`Geometry::new`], so every instance satisfies the power-of-two constraints
///
/// # Examples
///
/// ```
/// use simcache::cache::Geometry;
/// // 8 words, 2 words per block, 2-way: 2 sets
/// let geometry = Geometry::new(8, 2, Some(2)).unwrap();
/// assert_eq!(geometry.num_sets(), 2);
/// assert_eq!(geometry.offset_of(7), 1);
/// assert_eq!(geometry.set_of(7), 1);
/// assert_eq!(geometry.tag_of(7), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    cache_size: u64,
    block_size: u64,
    associativity: u64,
    num_sets: u64,
    tag_shift: u32,
    set_shift: u32,
    set_mask: u64,
    offset_mask: u64,
}

impl Geometry {
    /// Validates and builds a geometry
    ///
    /// # Arguments
    ///
    /// * `cache_size`: Capacity in words
    /// * `block_size`: Words per block
    /// * `associativity`: Lines per set, `None` for fully associative
    ///
    /// returns: Result<Geometry, Error>
    pub fn new(cache_size: u64, block_size: u64, associativity: Option<u64>) -> Result<Self> {
        if !block_size.is_power_of_two() {
            return Err(Error::invalid_config(format!("block size {block_size} is not a power of two")));
        }
        if !cache_size.is_power_of_two() {
            return Err(Error::invalid_config(format!("cache size {cache_size} is not a power of two")));
        }
        if block_size > cache_size {
            return Err(Error::invalid_config(format!(
                "block size {block_size} is larger than the cache size {cache_size}"
            )));
        }
        let lines = cache_size / block_size;
        let associativity = associativity.unwrap_or(lines);
        if !associativity.is_power_of_two() {
            return Err(Error::invalid_config(format!("associativity {associativity} is not a power of two")));
        }
        if associativity > lines || lines % associativity != 0 {
            return Err(Error::invalid_config(format!(
                "associativity {associativity} does not divide the {lines} lines of the cache"
            )));
        }
        let num_sets = lines / associativity;
        Ok(Self {
            cache_size,
            block_size,
            associativity,
            num_sets,
            tag_shift: (cache_size / associativity).trailing_zeros(),
            set_shift: block_size.trailing_zeros(),
            set_mask: num_sets - 1,
            offset_mask: block_size - 1,
        })
    }

    /// The same block size and associativity with a different capacity
    pub fn with_cache_size(&self, cache_size: u64) -> Result<Self> {
        Self::new(cache_size, self.block_size, Some(self.associativity))
    }

    pub fn tag_of(&self, address: u64) -> u64 {
        address >> self.tag_shift
    }

    pub fn set_of(&self, address: u64) -> usize {
        ((address >> self.set_shift) & self.set_mask) as usize
    }

    pub fn offset_of(&self, address: u64) -> usize {
        (address & self.offset_mask) as usize
    }

    /// Recovers the block-aligned address of a line from its tag and set
    pub fn physical_address(&self, tag: u64, set_index: usize) -> u64 {
        (tag << self.tag_shift) | ((set_index as u64) << self.set_shift)
    }

    pub fn cache_size(&self) -> u64 {
        self.cache_size
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn associativity(&self) -> u64 {
        self.associativity
    }

    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }

    /// Total number of lines the cache can hold
    pub fn line_capacity(&self) -> u64 {
        self.num_sets * self.associativity
    }

    pub fn tag_shift(&self) -> u32 {
        self.tag_shift
    }

    pub fn set_shift(&self) -> u32 {
        self.set_shift
    }
}

/// A resident block and whether it differs from the copy in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLine {
    pub block: Block,
    pub dirty: bool,
}

impl CacheLine {
    pub fn clean(block: Block) -> Self {
        Self { block, dirty: false }
    }

    pub fn dirty(block: Block) -> Self {
        Self { block, dirty: true }
    }
}

/// A line pushed out of the cache to make room, with its recovered address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evicted {
    pub address: u64,
    pub line: CacheLine,
}

/// A generic trait for caches
///
/// Implemented by [`Cache`] for each replacement policy, and by [`GenericCache`] which branches
/// over all of them
pub trait CacheTrait {
    fn geometry(&self) -> &Geometry;

    /// Looks up the line holding `address`
    ///
    /// On a hit the replacement policy is told about the access and the block is returned, the
    /// caller indexes it with the offset. Occupancy never changes
    fn read(&mut self, address: u64) -> Option<&Block>;

    /// Writes one word into a resident line, marking it dirty. Returns false on a miss, in which
    /// case nothing is inserted
    fn overwrite(&mut self, address: u64, value: i64) -> bool;

    /// Inserts a clean block for `address`, evicting a victim if the set is full
    ///
    /// This, and [`CacheTrait::load_line`], are the only ways to change occupancy. Loading a tag which is already
    /// resident replaces its data in place and evicts nothing
    ///
    /// returns: Option<Evicted>, the victim if one was needed
    fn load(&mut self, address: u64, block: Block) -> Option<Evicted> {
        self.load_line(address, CacheLine::clean(block))
    }

    /// As [`CacheTrait::load`], but keeps the dirty flag of the supplied line
    fn load_line(&mut self, address: u64, line: CacheLine) -> Option<Evicted>;

    /// Whether `address` is resident, without touching the replacement policy
    fn contains(&self, address: u64) -> bool;

    fn resident_count(&self) -> usize;

    /// Number of resident lines in one set
    fn set_occupancy(&self, set_index: usize) -> usize;

    /// Copies of every resident line with its physical address, in set then tag order
    fn lines(&self) -> Vec<(u64, CacheLine)>;

    /// Marks every dirty line clean, returning the blocks which need writing back
    fn take_dirty_lines(&mut self) -> Vec<(u64, Block)>;
}

struct CacheSet<R> {
    lines: BTreeMap<u64, CacheLine>,
    policy: R,
}

/// A set-associative cache, parameterised by a replacement policy
///
/// Each set owns its lines keyed by tag, and one policy instance tracking those tags. The policy
/// never stores anything about the lines themselves, it only answers which tag goes next
pub struct Cache<R: ReplacementPolicy> {
    geometry: Geometry,
    sets: Vec<CacheSet<R>>,
}

impl<R: ReplacementPolicy> Cache<R> {
    /// Creates an empty cache. Each set's policy gets its own seed derived from `seed`
    pub fn new(geometry: Geometry, seed: u64) -> Self {
        let associativity = geometry.associativity() as usize;
        let sets = (0..geometry.num_sets())
            .map(|set| CacheSet {
                lines: BTreeMap::new(),
                policy: R::new(associativity, derive_seed(seed, set)),
            })
            .collect();
        Self { geometry, sets }
    }
}

impl<R: ReplacementPolicy> CacheTrait for Cache<R> {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn read(&mut self, address: u64) -> Option<&Block> {
        let tag = self.geometry.tag_of(address);
        let set = &mut self.sets[self.geometry.set_of(address)];
        match set.lines.get(&tag) {
            Some(line) => {
                set.policy.update_access(tag);
                Some(&line.block)
            }
            None => None,
        }
    }

    fn overwrite(&mut self, address: u64, value: i64) -> bool {
        let tag = self.geometry.tag_of(address);
        let offset = self.geometry.offset_of(address);
        let set = &mut self.sets[self.geometry.set_of(address)];
        match set.lines.get_mut(&tag) {
            Some(line) => {
                line.block.set_word(offset, value);
                line.dirty = true;
                set.policy.update_access(tag);
                true
            }
            None => false,
        }
    }

    fn load_line(&mut self, address: u64, line: CacheLine) -> Option<Evicted> {
        debug_assert_eq!(line.block.len() as u64, self.geometry.block_size());
        let geometry = self.geometry;
        let tag = geometry.tag_of(address);
        let set_index = geometry.set_of(address);
        let set = &mut self.sets[set_index];

        if let Some(existing) = set.lines.get_mut(&tag) {
            *existing = line;
            set.policy.update_access(tag);
            return None;
        }

        let mut evicted = None;
        if set.policy.is_full() {
            let victim_tag = set.policy.remove_one();
            let victim = set.lines.remove(&victim_tag)
                .expect("replacement policy chose a tag with no resident line");
            let victim_address = geometry.physical_address(victim_tag, set_index);
            trace!(set = set_index, victim = victim_address, dirty = victim.dirty, "evicted line");
            evicted = Some(Evicted { address: victim_address, line: victim });
        }
        set.policy.add_in(tag);
        set.lines.insert(tag, line);
        debug_assert_eq!(set.policy.len(), set.lines.len());
        evicted
    }

    fn contains(&self, address: u64) -> bool {
        self.sets[self.geometry.set_of(address)].lines.contains_key(&self.geometry.tag_of(address))
    }

    fn resident_count(&self) -> usize {
        self.sets.iter().map(|s| s.lines.len()).sum()
    }

    fn set_occupancy(&self, set_index: usize) -> usize {
        self.sets[set_index].lines.len()
    }

    fn lines(&self) -> Vec<(u64, CacheLine)> {
        self.sets
            .iter()
            .enumerate()
            .flat_map(|(set_index, set)| {
                set.lines
                    .iter()
                    .map(move |(tag, line)| (self.geometry.physical_address(*tag, set_index), line.clone()))
            })
            .collect()
    }

    fn take_dirty_lines(&mut self) -> Vec<(u64, Block)> {
        let geometry = self.geometry;
        let mut out = Vec::new();
        for (set_index, set) in self.sets.iter_mut().enumerate() {
            for (tag, line) in set.lines.iter_mut().filter(|(_, l)| l.dirty) {
                line.dirty = false;
                out.push((geometry.physical_address(*tag, set_index), line.block.clone()));
            }
        }
        out
    }
}

/// Enum for all 4 replacement policies provided by the library
///
/// Using trait objects would reduce boilerplate, but every simulated access would go through a
/// vtable the compiler can't see into. Branching explicitly keeps the concrete types visible, so
/// the policy calls can be inlined
///
/// This is also what the coordinator owns, which lets a resize build a new cache of the same kind
/// without knowing the policy type
pub enum GenericCache {
    LeastRecentlyUsed(Cache<LeastRecentlyUsed>),
    LeastFrequentlyUsed(Cache<LeastFrequentlyUsed>),
    FirstInFirstOut(Cache<FirstInFirstOut>),
    Random(Cache<RandomReplacement>),
}

impl GenericCache {
    /// Creates an empty cache with the configured policy
    pub fn new(geometry: Geometry, policy: ReplacementPolicyConfig, seed: u64) -> Self {
        match policy {
            ReplacementPolicyConfig::LeastRecentlyUsed => Cache::<LeastRecentlyUsed>::new(geometry, seed).into(),
            ReplacementPolicyConfig::LeastFrequentlyUsed => Cache::<LeastFrequentlyUsed>::new(geometry, seed).into(),
            ReplacementPolicyConfig::FirstInFirstOut => Cache::<FirstInFirstOut>::new(geometry, seed).into(),
            ReplacementPolicyConfig::Random => Cache::<RandomReplacement>::new(geometry, seed).into(),
        }
    }

    pub fn policy(&self) -> ReplacementPolicyConfig {
        match self {
            GenericCache::LeastRecentlyUsed(_) => ReplacementPolicyConfig::LeastRecentlyUsed,
            GenericCache::LeastFrequentlyUsed(_) => ReplacementPolicyConfig::LeastFrequentlyUsed,
            GenericCache::FirstInFirstOut(_) => ReplacementPolicyConfig::FirstInFirstOut,
            GenericCache::Random(_) => ReplacementPolicyConfig::Random,
        }
    }
}

impl From<Cache<LeastRecentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastRecentlyUsed>) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<Cache<LeastFrequentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastFrequentlyUsed>) -> Self {
        Self::LeastFrequentlyUsed(value)
    }
}

impl From<Cache<FirstInFirstOut>> for GenericCache {
    fn from(value: Cache<FirstInFirstOut>) -> Self {
        Self::FirstInFirstOut(value)
    }
}

impl From<Cache<RandomReplacement>> for GenericCache {
    fn from(value: Cache<RandomReplacement>) -> Self {
        Self::Random(value)
    }
}

impl CacheTrait for GenericCache {
    fn geometry(&self) -> &Geometry {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.geometry(),
            GenericCache::LeastFrequentlyUsed(c) => c.geometry(),
            GenericCache::FirstInFirstOut(c) => c.geometry(),
            GenericCache::Random(c) => c.geometry(),
        }
    }

    fn read(&mut self, address: u64) -> Option<&Block> {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.read(address),
            GenericCache::LeastFrequentlyUsed(c) => c.read(address),
            GenericCache::FirstInFirstOut(c) => c.read(address),
            GenericCache::Random(c) => c.read(address),
        }
    }

    fn overwrite(&mut self, address: u64, value: i64) -> bool {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.overwrite(address, value),
            GenericCache::LeastFrequentlyUsed(c) => c.overwrite(address, value),
            GenericCache::FirstInFirstOut(c) => c.overwrite(address, value),
            GenericCache::Random(c) => c.overwrite(address, value),
        }
    }

    fn load_line(&mut self, address: u64, line: CacheLine) -> Option<Evicted> {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.load_line(address, line),
            GenericCache::LeastFrequentlyUsed(c) => c.load_line(address, line),
            GenericCache::FirstInFirstOut(c) => c.load_line(address, line),
            GenericCache::Random(c) => c.load_line(address, line),
        }
    }

    fn contains(&self, address: u64) -> bool {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.contains(address),
            GenericCache::LeastFrequentlyUsed(c) => c.contains(address),
            GenericCache::FirstInFirstOut(c) => c.contains(address),
            GenericCache::Random(c) => c.contains(address),
        }
    }

    fn resident_count(&self) -> usize {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.resident_count(),
            GenericCache::LeastFrequentlyUsed(c) => c.resident_count(),
            GenericCache::FirstInFirstOut(c) => c.resident_count(),
            GenericCache::Random(c) => c.resident_count(),
        }
    }

    fn set_occupancy(&self, set_index: usize) -> usize {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.set_occupancy(set_index),
            GenericCache::LeastFrequentlyUsed(c) => c.set_occupancy(set_index),
            GenericCache::FirstInFirstOut(c) => c.set_occupancy(set_index),
            GenericCache::Random(c) => c.set_occupancy(set_index),
        }
    }

    fn lines(&self) -> Vec<(u64, CacheLine)> {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.lines(),
            GenericCache::LeastFrequentlyUsed(c) => c.lines(),
            GenericCache::FirstInFirstOut(c) => c.lines(),
            GenericCache::Random(c) => c.lines(),
        }
    }

    fn take_dirty_lines(&mut self) -> Vec<(u64, Block)> {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.take_dirty_lines(),
            GenericCache::LeastFrequentlyUsed(c) => c.take_dirty_lines(),
            GenericCache::FirstInFirstOut(c) => c.take_dirty_lines(),
            GenericCache::Random(c) => c.take_dirty_lines(),
        }
    }
}
