//! Random-access byte sources.
//!
//! A cluster never owns the archive; it reads through a [`ByteSource`]
//! handle that can be narrowed to sub-ranges and shared across threads.

mod file;
mod memory;
mod reader;

pub use file::FileSource;
pub use memory::MemorySource;
pub use reader::SourceReader;

use std::io;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

/// Read-only, randomly addressable byte range with a known size.
pub trait ByteSource: Send + Sync {
    /// Total size of this range in bytes.
    fn size(&self) -> u64;

    /// Bounded view over `[offset, offset + length)` of this range.
    fn sub_range(&self, offset: u64, length: u64) -> io::Result<Arc<dyn ByteSource>>;

    /// Bytes of `[offset, offset + length)`, loaded or sliced as needed.
    fn materialize(&self, offset: u64, length: u64) -> io::Result<Bytes>;

    fn read_byte(&self, offset: u64) -> io::Result<u8> {
        Ok(self.materialize(offset, 1)?[0])
    }

    fn read_u32_le(&self, offset: u64) -> io::Result<u32> {
        Ok(LittleEndian::read_u32(&self.materialize(offset, 4)?))
    }

    fn read_u64_le(&self, offset: u64) -> io::Result<u64> {
        Ok(LittleEndian::read_u64(&self.materialize(offset, 8)?))
    }
}

/// Reject ranges that leave `[0, size)`.
pub(crate) fn check_range(offset: u64, length: u64, size: u64) -> io::Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("range {offset}+{length} exceeds source of {size} bytes"),
        )),
    }
}
