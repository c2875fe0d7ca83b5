//! Sequential decode stream: a byte source pushed through a decoder, read
//! strictly front to back.

use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;

use super::{get_codec, CodecError, Compression, DecodeOutput};
use crate::cluster::OffsetWidth;
use crate::io::{ByteSource, SourceReader};

pub struct DecodeStream {
    inner:    DecodeOutput,
    consumed: u64,
}

impl DecodeStream {
    /// Open a decoder for `kind` over the whole of `source`.
    pub fn open(source: Arc<dyn ByteSource>, kind: Compression, chunk_size: usize) -> Result<Self, CodecError> {
        let codec = get_codec(kind)?;
        let input = SourceReader::new(source, chunk_size);
        Ok(Self::from_reader(codec.decoder(Box::new(input))?))
    }

    pub fn from_reader(inner: DecodeOutput) -> Self {
        Self { inner, consumed: 0 }
    }

    /// Decoded bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Read one offset-table entry.
    pub fn read_offset(&mut self, width: OffsetWidth) -> io::Result<u64> {
        let value = width.read_from(&mut self.inner)?;
        self.consumed += width.bytes();
        Ok(value)
    }

    /// Read the next `size` decoded bytes into an owned buffer.
    ///
    /// The buffer grows as data arrives, so a corrupt size cannot force a
    /// large allocation before the stream runs dry.
    pub fn read_blob(&mut self, size: u64) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        let got = (&mut self.inner).take(size).read_to_end(&mut buf)? as u64;
        self.consumed += got;
        if got != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("decode stream ended after {got} of {size} blob bytes"),
            ));
        }
        Ok(Bytes::from(buf))
    }
}
