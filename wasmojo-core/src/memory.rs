//! Bounded access to guest linear memory.
//!
//! Every read and write is checked against the memory size at the time of
//! the call. The accessor never allocates; callers supply addresses obtained
//! from the [`BumpAllocator`](crate::alloc::BumpAllocator) or from the guest.

use crate::error::{HarnessError, Result};
use crate::imports::HostState;
use wasmtime::{AsContext, AsContextMut, Memory};

/// A checked view of a guest's exported linear memory.
#[derive(Debug, Clone, Copy)]
pub struct LinearMemory {
    memory: Memory,
}

impl LinearMemory {
    /// Wrap a wasmtime memory handle.
    pub const fn new(memory: Memory) -> Self {
        Self { memory }
    }

    /// Get the underlying wasmtime memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Current size of linear memory in bytes.
    pub fn size(&self, store: impl AsContext<Data = HostState>) -> u64 {
        self.memory.data_size(&store) as u64
    }

    /// Read `len` bytes starting at `offset`.
    pub fn read(
        &self,
        store: impl AsContext<Data = HostState>,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>> {
        let data = self.memory.data(&store);
        let range = checked_range(offset, len, data.len())?;
        Ok(data[range].to_vec())
    }

    /// Write `bytes` starting at `offset`.
    pub fn write(
        &self,
        mut store: impl AsContextMut<Data = HostState>,
        offset: u64,
        bytes: &[u8],
    ) -> Result<()> {
        let data = self.memory.data_mut(&mut store);
        let range = checked_range(offset, bytes.len() as u64, data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Fill `len` bytes at `offset` with `byte`.
    pub fn fill(
        &self,
        mut store: impl AsContextMut<Data = HostState>,
        offset: u64,
        len: u64,
        byte: u8,
    ) -> Result<()> {
        let data = self.memory.data_mut(&mut store);
        let range = checked_range(offset, len, data.len())?;
        data[range].fill(byte);
        Ok(())
    }

    /// Read a little-endian `i64`.
    pub fn read_i64_le(&self, store: impl AsContext<Data = HostState>, offset: u64) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_word(store, offset)?))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&self, store: impl AsContext<Data = HostState>, offset: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_word(store, offset)?))
    }

    /// Write a little-endian `i64`.
    pub fn write_i64_le(
        &self,
        store: impl AsContextMut<Data = HostState>,
        offset: u64,
        value: i64,
    ) -> Result<()> {
        self.write(store, offset, &value.to_le_bytes())
    }

    /// Write a little-endian `u64`.
    pub fn write_u64_le(
        &self,
        store: impl AsContextMut<Data = HostState>,
        offset: u64,
        value: u64,
    ) -> Result<()> {
        self.write(store, offset, &value.to_le_bytes())
    }

    fn read_word(&self, store: impl AsContext<Data = HostState>, offset: u64) -> Result<[u8; 8]> {
        let data = self.memory.data(&store);
        let range = checked_range(offset, 8, data.len())?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[range]);
        Ok(word)
    }
}

/// Convert a guest pointer (always passed as a signed 64-bit value by the
/// ABI) into an unsigned offset, rejecting negative addresses.
pub fn guest_offset(ptr: i64, len: u64, size: u64) -> Result<u64> {
    u64::try_from(ptr).map_err(|_| HarnessError::Bounds {
        offset: i128::from(ptr),
        len: i128::from(len),
        size,
    })
}

/// Validate `[offset, offset + len)` against a memory of `size` bytes.
fn checked_range(offset: u64, len: u64, size: usize) -> Result<std::ops::Range<usize>> {
    let out_of_bounds = || HarnessError::Bounds {
        offset: i128::from(offset),
        len: i128::from(len),
        size: size as u64,
    };
    let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
    if end > size as u64 {
        return Err(out_of_bounds());
    }
    // Both fit in usize because end <= size.
    Ok(offset as usize..end as usize)
}
