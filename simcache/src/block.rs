/// A single word of simulated memory. `None` means the word has never been written
pub type Word = Option<i64>;

/// A fixed-size run of words, the unit of transfer between memory and the cache
///
/// Blocks are moved between memory and cache lines by value; the cache never aliases the copy held
/// by memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    words: Vec<Word>,
}

impl Block {
    /// Creates a block of `size` uninitialised words
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![None; size],
        }
    }

    /// Creates a block from existing values
    pub fn from_values(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            words: values.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Gets the word at `offset`. Offsets are always derived from the owning geometry, so an out of
    /// bounds offset is a bug and panics
    pub fn word(&self, offset: usize) -> Word {
        self.words[offset]
    }

    pub fn set_word(&mut self, offset: usize, value: i64) {
        self.words[offset] = Some(value);
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }
}
