//! Bounds-checked access to a guest's linear memory.
//!
//! A [`GuestMemory`] borrows the memory bytes for the duration of a single
//! host call. The guest may grow its memory between calls, which can move
//! the underlying buffer, so a view must never outlive the call it was
//! created for.
//!
//! All integers use little-endian byte order, the layout of `wasm32`.
//! Failed writes leave memory untouched.

use std::ops::Range;

use thiserror::Error;

/// Errors raised by the memory accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// `offset + len` falls outside the memory buffer.
    #[error("out of bounds memory access: offset {offset} len {len} exceeds size {size}")]
    OutOfBounds { offset: u32, len: u32, size: usize },
}

/// A transient view over guest linear memory.
#[derive(Debug)]
pub struct GuestMemory<'a> {
    data: &'a mut [u8],
}

impl<'a> GuestMemory<'a> {
    /// Wrap the current memory bytes.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Size of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolve `offset..offset + len` against the buffer.
    pub fn check(&self, offset: u32, len: u32) -> Result<Range<usize>, MemoryError> {
        let start = offset as usize;
        let out_of_bounds = MemoryError::OutOfBounds {
            offset,
            len,
            size: self.data.len(),
        };
        let end = start.checked_add(len as usize).ok_or(out_of_bounds)?;
        if end > self.data.len() {
            return Err(out_of_bounds);
        }
        Ok(start..end)
    }

    pub fn read_bytes(&self, offset: u32, len: u32) -> Result<&[u8], MemoryError> {
        let range = self.check(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let len = u32::try_from(bytes.len()).map_err(|_| MemoryError::OutOfBounds {
            offset,
            len: u32::MAX,
            size: self.data.len(),
        })?;
        let range = self.check(offset, len)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Hand the span `offset..offset + len` to `f` for in-place mutation.
    ///
    /// `f` is only called once the whole span is known to be in bounds.
    pub fn fill_with<F>(&mut self, offset: u32, len: u32, f: F) -> Result<(), MemoryError>
    where
        F: FnOnce(&mut [u8]),
    {
        let range = self.check(offset, len)?;
        f(&mut self.data[range]);
        Ok(())
    }

    pub fn read_u32(&self, offset: u32) -> Result<u32, MemoryError> {
        let bytes = self.read_bytes(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_u32(&mut self, offset: u32, value: u32) -> Result<(), MemoryError> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn read_u64(&self, offset: u32) -> Result<u64, MemoryError> {
        let bytes = self.read_bytes(offset, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn write_u64(&mut self, offset: u32, value: u64) -> Result<(), MemoryError> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Read `count` `(ptr, len)` pairs starting at `offset`.
    ///
    /// This is the `iovec`/`ciovec` array layout: two little-endian u32s per
    /// entry, 8 bytes apart.
    pub fn read_iovecs(&self, offset: u32, count: u32) -> Result<Vec<(u32, u32)>, MemoryError> {
        let total = count.checked_mul(8).ok_or(MemoryError::OutOfBounds {
            offset,
            len: u32::MAX,
            size: self.data.len(),
        })?;
        let raw = self.read_bytes(offset, total)?;
        Ok(raw
            .chunks_exact(8)
            .map(|entry| {
                let ptr = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
                let len = u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]);
                (ptr, len)
            })
            .collect())
    }
}
