use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use serde::Deserialize;
use crate::cache::Geometry;
use crate::error::{Error, Result};

/// Configuration for a complete simulator: backing memory, one cache, and the access policy
///
/// Sizes are counted in words, not bytes
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    pub memory_size: u64,
    pub cache_size: u64,
    pub block_size: u64,
    /// Lines per set. 1 is direct mapped, omitted is fully associative
    #[serde(default)]
    pub associativity: Option<u64>,
    #[serde(default)]
    pub replacement_policy: ReplacementPolicyConfig,
    #[serde(default)]
    pub write_policy: WritePolicyConfig,
    /// Enables adaptive resizing when present
    #[serde(default)]
    pub adaptive: Option<AdaptiveConfig>,
    /// Seed for random replacement and resizing decisions
    #[serde(default)]
    pub seed: u64,
}

/// The replacement policy - lru, lfu, fifo, or random. Defaults to lru.
#[derive(Debug, Copy, Clone, Default, Deserialize, PartialEq, Eq)]
pub enum ReplacementPolicyConfig {
    #[default]
    #[serde(alias = "lru", alias = "LRU")]
    LeastRecentlyUsed,
    #[serde(alias = "lfu", alias = "LFU")]
    LeastFrequentlyUsed,
    #[serde(alias = "fifo", alias = "FIFO")]
    FirstInFirstOut,
    #[serde(alias = "random", alias = "rand", alias = "RANDOM")]
    Random,
}

/// When writes reach memory. Defaults to write through.
#[derive(Debug, Copy, Clone, Default, Deserialize, PartialEq, Eq)]
pub enum WritePolicyConfig {
    /// Every write updates the backing memory immediately
    #[default]
    #[serde(alias = "write_through", alias = "WRITE_THROUGH", alias = "wt")]
    WriteThrough,
    /// Writes stay in the cache until the line is evicted or discarded
    #[serde(alias = "write_back", alias = "WRITE_BACK", alias = "wb")]
    WriteBack,
}

/// Adaptive resizing settings
#[derive(Debug, Clone, Deserialize)]
pub struct AdaptiveConfig {
    #[serde(flatten)]
    pub strategy: ResizeStrategyConfig,
    /// Largest capacity the cache may grow to, capped at the memory size
    #[serde(default = "default_upper_limit")]
    pub upper_limit: u64,
}

/// How the target capacity is chosen after each miss
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ResizeStrategyConfig {
    /// Randomly halve or double
    Stochastic {
        #[serde(default = "default_resize_probability")]
        resize_probability: f64,
        #[serde(default = "default_shrink_probability")]
        shrink_probability: f64,
    },
    /// Follow a fixed profile of the elapsed access count
    Scheduled {
        #[serde(default = "default_c1")]
        c1: u64,
    },
}

fn default_upper_limit() -> u64 {
    4096
}

fn default_resize_probability() -> f64 {
    1.0
}

fn default_shrink_probability() -> f64 {
    0.7
}

fn default_c1() -> u64 {
    4
}

impl SimulatorConfig {
    /// A configuration with the default policies and no adaptive resizing
    pub fn new(memory_size: u64, cache_size: u64, block_size: u64, associativity: Option<u64>) -> Self {
        Self {
            memory_size,
            cache_size,
            block_size,
            associativity,
            replacement_policy: ReplacementPolicyConfig::default(),
            write_policy: WritePolicyConfig::default(),
            adaptive: None,
            seed: 0,
        }
    }

    pub fn with_replacement_policy(mut self, policy: ReplacementPolicyConfig) -> Self {
        self.replacement_policy = policy;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicyConfig) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_adaptive(mut self, adaptive: AdaptiveConfig) -> Self {
        self.adaptive = Some(adaptive);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parses a JSON configuration
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Opens and parses a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Checks every geometry constraint, returning the cache geometry on success
    ///
    /// Nothing is ever silently corrected: an invalid configuration fails here before anything is
    /// constructed
    pub fn validate(&self) -> Result<Geometry> {
        if !self.memory_size.is_power_of_two() {
            return Err(Error::invalid_config(format!("memory size {} is not a power of two", self.memory_size)));
        }
        let geometry = Geometry::new(self.cache_size, self.block_size, self.associativity)?;
        if self.cache_size > self.memory_size {
            return Err(Error::invalid_config(format!(
                "cache size {} is larger than the memory size {}",
                self.cache_size, self.memory_size
            )));
        }
        if let Some(adaptive) = &self.adaptive {
            adaptive.validate(&geometry)?;
        }
        Ok(geometry)
    }
}

impl FromStr for SimulatorConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl AdaptiveConfig {
    pub fn stochastic() -> Self {
        Self {
            strategy: ResizeStrategyConfig::Stochastic {
                resize_probability: default_resize_probability(),
                shrink_probability: default_shrink_probability(),
            },
            upper_limit: default_upper_limit(),
        }
    }

    pub fn scheduled(c1: u64) -> Self {
        Self {
            strategy: ResizeStrategyConfig::Scheduled { c1 },
            upper_limit: default_upper_limit(),
        }
    }

    pub fn with_upper_limit(mut self, upper_limit: u64) -> Self {
        self.upper_limit = upper_limit;
        self
    }

    fn validate(&self, geometry: &Geometry) -> Result<()> {
        let lower_limit = geometry.associativity() * geometry.block_size();
        if !self.upper_limit.is_power_of_two() || self.upper_limit < lower_limit {
            return Err(Error::invalid_config(format!(
                "upper limit {} must be a power of two no smaller than {lower_limit}",
                self.upper_limit
            )));
        }
        match self.strategy {
            ResizeStrategyConfig::Stochastic { resize_probability, shrink_probability } => {
                for (name, p) in [("resize", resize_probability), ("shrink", shrink_probability)] {
                    if !(0.0..=1.0).contains(&p) {
                        return Err(Error::invalid_config(format!("{name} probability {p} is not in [0, 1]")));
                    }
                }
            }
            ResizeStrategyConfig::Scheduled { c1 } => {
                if c1 == 0 {
                    return Err(Error::invalid_config("c1 must be positive"));
                }
                match c1.checked_mul(geometry.block_size()) {
                    Some(plateau) if plateau <= self.upper_limit => {}
                    _ => {
                        return Err(Error::invalid_config(format!(
                            "c1 {c1} times block size {} is above the upper limit {}",
                            geometry.block_size(),
                            self.upper_limit
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}
