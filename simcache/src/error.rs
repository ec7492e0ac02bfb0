use thiserror::Error;

/// Result type alias using the simulator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the simulator
///
/// Normal hits and misses are never errors, they are reported through the access counters.
/// Replacement policy capacity breaches are not listed here either: they can only be caused by a
/// bug in the cache itself and panic instead
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry or policy constraints violated at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Address outside of the flat address space
    #[error("Address {address:#x} is out of range for a memory of {memory_size} words")]
    AddressOutOfRange { address: u64, memory_size: u64 },

    /// Address inside the address space, but its block has not been allocated yet
    #[error("Address {address:#x} has not been allocated ({allocated_words} words allocated)")]
    Unallocated { address: u64, allocated_words: u64 },

    /// Allocation would grow memory beyond its configured size
    #[error("Cannot allocate {requested} blocks, only {available} blocks remain")]
    OutOfMemory { requested: u64, available: u64 },

    /// The hit rate was requested before any access was made
    #[error("Hit rate is undefined when no accesses have been made")]
    UndefinedHitRate,

    /// The configuration could not be parsed
    #[error("Couldn't parse the configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading a configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig(reason.into())
    }
}
