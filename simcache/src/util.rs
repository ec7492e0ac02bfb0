/// Deterministic xorshift64 generator
///
/// Random replacement and adaptive resizing both need a source of randomness, and simulations
/// should be reproducible for a given seed, so every random decision in the crate goes through
/// one of these rather than an OS-seeded generator
#[derive(Debug, Clone)]
pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    /// Creates a generator from a seed. A zero seed would produce zeros forever, so it is remapped
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform value in `[0, bound)`. `bound` must be non-zero
    pub fn next_bounded(&mut self, bound: u64) -> u64 {
        debug_assert!(bound > 0);
        // Multiply-shift, rejecting the low products which would over-represent some outputs
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let product = u128::from(self.next_u64()) * u128::from(bound);
            if product as u64 >= threshold {
                return (product >> 64) as u64;
            }
        }
    }

    /// Uniform value in `[0, 1)`, using the top 53 bits
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Returns true with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Mixes a base seed with an index so each set's generator produces a different sequence
pub fn derive_seed(seed: u64, index: u64) -> u64 {
    // splitmix64 finaliser
    let mut z = seed.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Largest power of two less than or equal to `value`, or 0 for 0
///
/// # Examples
///
/// ```
/// use simcache::util::floor_power_of_two;
/// assert_eq!(floor_power_of_two(48), 32);
/// assert_eq!(floor_power_of_two(64), 64);
/// ```
pub fn floor_power_of_two(value: u64) -> u64 {
    if value == 0 {
        0
    } else {
        1 << (u64::BITS - 1 - value.leading_zeros())
    }
}
