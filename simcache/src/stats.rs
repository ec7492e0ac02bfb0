use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Running access counters kept by the coordinator
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessStats {
    pub hits: u64,
    pub misses: u64,
    pub total_access: u64,
}

/// The result of a simulation. Can be serialised for reporting
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AccessSummary {
    pub hits: u64,
    pub misses: u64,
    pub total_access: u64,
    pub hit_rate: f64,
}

impl AccessStats {
    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
        self.total_access += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
        self.total_access += 1;
    }

    /// Summarises the counters
    ///
    /// Fails rather than reporting 0 or NaN when nothing has been accessed yet
    ///
    /// # Examples
    ///
    /// ```
    /// use simcache::stats::AccessStats;
    /// let stats = AccessStats { hits: 3, misses: 1, total_access: 4 };
    /// assert_eq!(stats.summary().unwrap().hit_rate, 0.75);
    /// assert!(AccessStats::default().summary().is_err());
    /// ```
    pub fn summary(&self) -> Result<AccessSummary> {
        if self.total_access == 0 {
            return Err(Error::UndefinedHitRate);
        }
        Ok(AccessSummary {
            hits: self.hits,
            misses: self.misses,
            total_access: self.total_access,
            hit_rate: self.hits as f64 / self.total_access as f64,
        })
    }
}
