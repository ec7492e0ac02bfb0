use tracing::debug;
use crate::block::Block;
use crate::error::{Error, Result};

/// Flat backing store, organised into fixed-size blocks
///
/// Memory starts empty and grows through [`Memory::allocate`]. It never shrinks, and addresses
/// must be allocated before they are read
#[derive(Debug, Clone)]
pub struct Memory {
    memory_size: u64,
    block_size: u64,
    blocks: Vec<Block>,
}

impl Memory {
    pub fn new(memory_size: u64, block_size: u64) -> Result<Self> {
        if !memory_size.is_power_of_two() || !block_size.is_power_of_two() || block_size > memory_size {
            return Err(Error::invalid_config(format!(
                "memory size {memory_size} and block size {block_size} must be powers of two with the block no larger than memory"
            )));
        }
        Ok(Self {
            memory_size,
            block_size,
            blocks: Vec::new(),
        })
    }

    /// Appends `num_blocks` uninitialised blocks
    pub fn allocate(&mut self, num_blocks: u64) -> Result<()> {
        let available = self.max_blocks() - self.blocks.len() as u64;
        if num_blocks > available {
            return Err(Error::OutOfMemory { requested: num_blocks, available });
        }
        let block_size = self.block_size as usize;
        self.blocks.extend((0..num_blocks).map(|_| Block::new(block_size)));
        debug!(blocks = num_blocks, total = self.blocks.len(), "allocated memory");
        Ok(())
    }

    /// Returns a copy of the block containing `address`
    pub fn read_block(&self, address: u64) -> Result<Block> {
        let index = self.block_index(address)?;
        Ok(self.blocks[index].clone())
    }

    /// Replaces the block containing `address`
    pub fn write_block(&mut self, address: u64, block: Block) -> Result<()> {
        debug_assert_eq!(block.len() as u64, self.block_size);
        let index = self.block_index(address)?;
        self.blocks[index] = block;
        Ok(())
    }

    /// Writes a single word
    pub fn write_word(&mut self, address: u64, value: i64) -> Result<()> {
        let index = self.block_index(address)?;
        let offset = (address & (self.block_size - 1)) as usize;
        self.blocks[index].set_word(offset, value);
        Ok(())
    }

    /// Checks `address` is inside the address space and allocated
    pub fn check_address(&self, address: u64) -> Result<()> {
        self.block_index(address).map(|_| ())
    }

    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn allocated_blocks(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn allocated_words(&self) -> u64 {
        self.allocated_blocks() * self.block_size
    }

    fn max_blocks(&self) -> u64 {
        self.memory_size / self.block_size
    }

    fn block_index(&self, address: u64) -> Result<usize> {
        if address >= self.memory_size {
            return Err(Error::AddressOutOfRange { address, memory_size: self.memory_size });
        }
        let index = address / self.block_size;
        if index >= self.blocks.len() as u64 {
            return Err(Error::Unallocated { address, allocated_words: self.allocated_words() });
        }
        Ok(index as usize)
    }
}
