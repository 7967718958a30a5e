//! Marshalling of the guest's 24-byte `String` struct.
//!
//! Layout (little-endian, 8-byte aligned):
//!
//! ```text
//! offset  0..8   data pointer (heap form) | first inline bytes (inline form)
//! offset  8..16  length       (heap form) | more inline bytes  (inline form)
//! offset 16..24  capacity; bit 63 = inline flag, bits 56..=60 = inline length
//! ```
//!
//! The inline flag decides the form. Length is never used to guess it.
//!
//! Strings written by the host are always heap form. Only guest code
//! produces inline structs, so a struct fresh from [`write_string_struct`]
//! must not be assumed to be inline even when the text would fit.

use crate::error::{HarnessError, Result};
use crate::imports::HostState;
use crate::memory::LinearMemory;
use wasmtime::{AsContext, AsContextMut};

/// Size of the string struct in bytes.
pub const STRING_STRUCT_SIZE: u64 = 24;

/// Alignment of the string struct.
pub const STRING_STRUCT_ALIGN: u64 = 8;

/// Capacity bit marking the inline form.
pub const SSO_FLAG: u64 = 0x8000_0000_0000_0000;

/// Capacity bits holding the inline length.
pub const SSO_LEN_MASK: u64 = 0x1F00_0000_0000_0000;

const SSO_LEN_SHIFT: u32 = 56;

/// Where a string's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRepr {
    /// Bytes are stored inside the struct, starting at its base address.
    Inline {
        /// Length from the capacity word's 5-bit field.
        len: u8,
    },
    /// Bytes are stored elsewhere in linear memory.
    Heap {
        /// Address of the first byte.
        ptr: i64,
        /// Byte length (signed, as stored by the guest).
        len: i64,
    },
}

/// A decoded 24-byte string struct header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringHeader {
    /// First word: data pointer or inline bytes.
    pub word0: u64,
    /// Second word: length or inline bytes.
    pub word1: u64,
    /// Capacity word including the inline flag.
    pub capacity: u64,
}

impl StringHeader {
    /// Header for a heap string of `len` bytes at `ptr` with room for a NUL.
    pub const fn heap(ptr: u64, len: u64) -> Self {
        Self {
            word0: ptr,
            word1: len,
            capacity: len + 1,
        }
    }

    /// Parse a header from the raw struct bytes.
    pub fn from_bytes(raw: &[u8; 24]) -> Self {
        let word = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&raw[i * 8..i * 8 + 8]);
            u64::from_le_bytes(buf)
        };
        Self {
            word0: word(0),
            word1: word(1),
            capacity: word(2),
        }
    }

    /// Serialize this header to its wire layout.
    pub fn to_bytes(&self) -> [u8; 24] {
        let mut raw = [0u8; 24];
        raw[0..8].copy_from_slice(&self.word0.to_le_bytes());
        raw[8..16].copy_from_slice(&self.word1.to_le_bytes());
        raw[16..24].copy_from_slice(&self.capacity.to_le_bytes());
        raw
    }

    /// Whether the inline flag is set.
    pub const fn is_inline(&self) -> bool {
        self.capacity & SSO_FLAG != 0
    }

    /// Resolve the representation, consulting the flag bit first.
    pub const fn repr(&self) -> StringRepr {
        if self.is_inline() {
            StringRepr::Inline {
                len: ((self.capacity & SSO_LEN_MASK) >> SSO_LEN_SHIFT) as u8,
            }
        } else {
            StringRepr::Heap {
                ptr: self.word0 as i64,
                len: self.word1 as i64,
            }
        }
    }
}

/// Encode `s` into a freshly allocated heap-form string struct.
///
/// Writes the UTF-8 bytes followed by a NUL terminator, then a 24-byte
/// struct `[data_ptr][len][len + 1]`. Returns the struct address.
pub fn write_string_struct(
    mut store: impl AsContextMut<Data = HostState>,
    memory: &LinearMemory,
    s: &str,
) -> Result<u64> {
    let bytes = s.as_bytes();
    let len = bytes.len() as u64;

    let data_ptr = store
        .as_context_mut()
        .data_mut()
        .allocator
        .aligned_alloc(1, len + 1)?;
    memory.write(&mut store, data_ptr, bytes)?;
    memory.write(&mut store, data_ptr + len, &[0])?;

    let struct_ptr = store
        .as_context_mut()
        .data_mut()
        .allocator
        .aligned_alloc(STRING_STRUCT_ALIGN, STRING_STRUCT_SIZE)?;
    let header = StringHeader::heap(data_ptr, len);
    memory.write(&mut store, struct_ptr, &header.to_bytes())?;

    tracing::trace!(struct_ptr, data_ptr, len, "wrote string struct");
    Ok(struct_ptr)
}

/// Allocate a zeroed string struct for the guest to fill as an out-param.
pub fn alloc_string_struct(
    mut store: impl AsContextMut<Data = HostState>,
    memory: &LinearMemory,
) -> Result<u64> {
    let struct_ptr = store
        .as_context_mut()
        .data_mut()
        .allocator
        .aligned_alloc(STRING_STRUCT_ALIGN, STRING_STRUCT_SIZE)?;
    memory.fill(&mut store, struct_ptr, STRING_STRUCT_SIZE, 0)?;
    Ok(struct_ptr)
}

/// Read the header of the string struct at `struct_ptr`.
pub fn read_string_header(
    store: impl AsContext<Data = HostState>,
    memory: &LinearMemory,
    struct_ptr: u64,
) -> Result<StringHeader> {
    let raw = memory.read(store, struct_ptr, STRING_STRUCT_SIZE)?;
    let mut buf = [0u8; 24];
    buf.copy_from_slice(&raw);
    Ok(StringHeader::from_bytes(&buf))
}

/// Decode the string struct at `struct_ptr` into a host string.
///
/// Fails with an encoding error if the bytes are not valid UTF-8; every
/// producer of these structs is either this module or conforming guest
/// code, so malformed data indicates an ABI mismatch.
pub fn read_string_struct(
    store: impl AsContext<Data = HostState>,
    memory: &LinearMemory,
    struct_ptr: u64,
) -> Result<String> {
    let header = read_string_header(&store, memory, struct_ptr)?;

    let (data_ptr, len) = match header.repr() {
        StringRepr::Inline { len } => (struct_ptr, i64::from(len)),
        StringRepr::Heap { ptr, len } => (ptr as u64, len),
    };
    if len <= 0 {
        return Ok(String::new());
    }

    let raw = memory.read(&store, data_ptr, len as u64)?;
    String::from_utf8(raw).map_err(|source| HarnessError::Encoding { struct_ptr, source })
}
