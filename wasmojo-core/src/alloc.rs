//! Host-side bump allocator over guest linear memory.
//!
//! The guest's compiler runtime delegates aligned allocation to the host.
//! Sessions are short-lived, so the allocator only ever advances a cursor:
//! `aligned_free` is accepted and ignored, and no range is handed out twice.
//! There is no capacity check here; an allocation past the end of memory
//! surfaces later as a bounds error on the first read or write.

use crate::error::{HarnessError, Result};

/// Monotonic allocator handing out aligned offsets.
#[derive(Debug, Clone, Default)]
pub struct BumpAllocator {
    cursor: u64,
}

impl BumpAllocator {
    /// Create an allocator whose first allocation starts at `base`.
    pub const fn new(base: u64) -> Self {
        Self { cursor: base }
    }

    /// Current cursor position.
    pub const fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Move the cursor forward to `base`.
    ///
    /// Used once after instantiation to start handing out memory at the
    /// guest's `__heap_base`. The cursor never moves backward, so a base
    /// below the current cursor is ignored.
    pub fn seed(&mut self, base: u64) {
        self.cursor = self.cursor.max(base);
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// `align` must be a power of two. Returns the start offset of the
    /// allocation.
    pub fn aligned_alloc(&mut self, align: u64, size: u64) -> Result<u64> {
        if !align.is_power_of_two() {
            return Err(HarnessError::InvalidAlignment {
                align: i64::try_from(align).unwrap_or(i64::MAX),
            });
        }

        let remainder = self.cursor % align;
        let padding = if remainder == 0 { 0 } else { align - remainder };
        let exhausted = || HarnessError::AllocatorExhausted {
            cursor: self.cursor,
            requested: padding.saturating_add(size),
        };

        let ptr = self.cursor.checked_add(padding).ok_or_else(exhausted)?;
        let next = ptr.checked_add(size).ok_or_else(exhausted)?;
        self.cursor = next;

        tracing::trace!(align, size, ptr, "aligned_alloc");
        Ok(ptr)
    }

    /// Allocation entry point with the guest ABI's signed arguments.
    pub fn aligned_alloc_signed(&mut self, align: i64, size: i64) -> Result<u64> {
        let align = u64::try_from(align).map_err(|_| HarnessError::InvalidAlignment { align })?;
        let size = u64::try_from(size).map_err(|_| HarnessError::AllocatorExhausted {
            cursor: self.cursor,
            requested: size as u64,
        })?;
        self.aligned_alloc(align, size)
    }

    /// Release an allocation. Never reclaims; always succeeds.
    pub fn aligned_free(&mut self, _ptr: u64) -> bool {
        true
    }
}
