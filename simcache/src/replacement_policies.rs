use std::collections::VecDeque;
use crate::util::Xorshift64;

/// A generic trait for implementing new replacement policies. Can be used to parameterise a Cache.
///
/// One instance tracks a single set. It only knows about tags, never about the lines themselves,
/// and its membership must always mirror the tags resident in that set
pub trait ReplacementPolicy {
    /// Creates an empty policy for a set holding at most `capacity` lines
    ///
    /// # Arguments
    ///
    /// * `capacity`: The associativity of the cache
    /// * `seed`: Seed for policies which make random choices, ignored by the others
    ///
    /// returns: Self
    fn new(capacity: usize, seed: u64) -> Self where Self: Sized;

    fn capacity(&self) -> usize;

    /// The number of tags currently tracked
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Updates the policy when a resident line is accessed
    ///
    /// Not applicable for some policies, a default which does nothing is provided
    ///
    /// # Arguments
    ///
    /// * `tag`: The tag of the line which was accessed
    ///
    /// returns: ()
    fn update_access(&mut self, _tag: u64) {}

    /// Starts tracking a newly inserted tag
    ///
    /// The cache must have made room first, so calling this on a full policy panics
    fn add_in(&mut self, tag: u64);

    /// Chooses a victim, stops tracking it, and returns its tag
    ///
    /// Panics if nothing is tracked
    fn remove_one(&mut self) -> u64;
}

/// Least Recently Used replacement policy
///
/// Tags are kept in recency order, least recently used at the front. Sets are small so the linear
/// search on a hit is cheaper than maintaining a linked hash map
pub struct LeastRecentlyUsed {
    order: VecDeque<u64>,
    capacity: usize,
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn new(capacity: usize, _seed: u64) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn update_access(&mut self, tag: u64) {
        if let Some(position) = self.order.iter().position(|t| *t == tag) {
            self.order.remove(position);
            self.order.push_back(tag);
        }
    }

    fn add_in(&mut self, tag: u64) {
        assert!(!self.is_full(), "add_in called on a full LRU policy (capacity {})", self.capacity);
        self.order.push_back(tag);
    }

    fn remove_one(&mut self) -> u64 {
        self.order.pop_front().expect("remove_one called on an empty LRU policy")
    }
}

/// Least Frequently Used replacement policy
///
/// Counters are kept in insertion order, so ties on the smallest count always go to the tag which
/// was inserted first
pub struct LeastFrequentlyUsed {
    usages: Vec<(u64, u64)>,
    capacity: usize,
}

impl ReplacementPolicy for LeastFrequentlyUsed {
    fn new(capacity: usize, _seed: u64) -> Self {
        Self {
            usages: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.usages.len()
    }

    fn update_access(&mut self, tag: u64) {
        if let Some((_, count)) = self.usages.iter_mut().find(|(t, _)| *t == tag) {
            *count += 1;
        }
    }

    fn add_in(&mut self, tag: u64) {
        assert!(!self.is_full(), "add_in called on a full LFU policy (capacity {})", self.capacity);
        self.usages.push((tag, 0));
    }

    fn remove_one(&mut self) -> u64 {
        let mut min_value = u64::MAX;
        let mut min_index = usize::MAX;
        for (index, (_, count)) in self.usages.iter().enumerate() {
            // Strictly less, the first minimum wins
            if *count < min_value {
                min_value = *count;
                min_index = index;
            }
        }
        assert!(min_index != usize::MAX, "remove_one called on an empty LFU policy");
        self.usages.remove(min_index).0
    }
}

/// First In First Out replacement policy. Accesses never change the eviction order
pub struct FirstInFirstOut {
    queue: VecDeque<u64>,
    capacity: usize,
}

impl ReplacementPolicy for FirstInFirstOut {
    fn new(capacity: usize, _seed: u64) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn add_in(&mut self, tag: u64) {
        assert!(!self.is_full(), "add_in called on a full FIFO policy (capacity {})", self.capacity);
        self.queue.push_back(tag);
    }

    fn remove_one(&mut self) -> u64 {
        self.queue.pop_front().expect("remove_one called on an empty FIFO policy")
    }
}

/// Random replacement policy
///
/// Tags live in a dense vector, so a victim is picked and removed in O(1) by swapping the last
/// element into its slot
pub struct RandomReplacement {
    tags: Vec<u64>,
    capacity: usize,
    rng: Xorshift64,
}

impl ReplacementPolicy for RandomReplacement {
    fn new(capacity: usize, seed: u64) -> Self {
        Self {
            tags: Vec::with_capacity(capacity),
            capacity,
            rng: Xorshift64::new(seed),
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.tags.len()
    }

    fn add_in(&mut self, tag: u64) {
        assert!(!self.is_full(), "add_in called on a full random policy (capacity {})", self.capacity);
        self.tags.push(tag);
    }

    fn remove_one(&mut self) -> u64 {
        assert!(!self.tags.is_empty(), "remove_one called on an empty random policy");
        let position = self.rng.next_bounded(self.tags.len() as u64) as usize;
        self.tags.swap_remove(position)
    }
}
