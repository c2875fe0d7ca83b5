use std::io::{self, Read};
use std::sync::Arc;

use bytes::{Buf, Bytes};

use super::ByteSource;

/// Forward-only `Read` over a [`ByteSource`], pulling `chunk_size` bytes at
/// a time.  This is the input side of every stream decoder.
pub struct SourceReader {
    source:     Arc<dyn ByteSource>,
    position:   u64,
    chunk_size: u64,
    pending:    Bytes,
}

impl SourceReader {
    pub fn new(source: Arc<dyn ByteSource>, chunk_size: usize) -> Self {
        Self {
            source,
            position:   0,
            chunk_size: chunk_size.max(1) as u64,
            pending:    Bytes::new(),
        }
    }

    /// Bytes pulled from the source so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            let remaining = self.source.size().saturating_sub(self.position);
            if remaining == 0 {
                return Ok(0);
            }
            let len = remaining.min(self.chunk_size);
            self.pending = self.source.materialize(self.position, len)?;
            self.position += len;
        }
        let n = buf.len().min(self.pending.len());
        self.pending.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}
