use std::io;
use std::sync::Arc;

use bytes::Bytes;

use super::{check_range, ByteSource};

/// In-memory source.  Sub-ranges and materialized buffers are zero-copy
/// slices of the same allocation.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn into_shared(self) -> Arc<dyn ByteSource> {
        Arc::new(self)
    }

    fn slice(&self, offset: u64, length: u64) -> io::Result<Bytes> {
        check_range(offset, length, self.size())?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + length as usize))
    }
}

impl ByteSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn sub_range(&self, offset: u64, length: u64) -> io::Result<Arc<dyn ByteSource>> {
        Ok(Arc::new(MemorySource { data: self.slice(offset, length)? }))
    }

    fn materialize(&self, offset: u64, length: u64) -> io::Result<Bytes> {
        self.slice(offset, length)
    }
}
