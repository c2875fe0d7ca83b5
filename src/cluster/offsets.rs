//! Offset table: the cluster header listing cumulative blob boundaries.
//!
//! # Layout
//! `entry_count = first / width` little-endian entries.  The first entry is
//! both the header's own byte length and the offset where blob data begins.
//! Entries never decrease; two equal neighbours denote an empty blob.
//!
//! Offsets are stored normalised to the data region, so `offsets[0] == 0`
//! and `offsets.len() == blob_count + 1`.

use std::io::{self, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use tracing::warn;

use super::ClusterError;
use crate::codec::DecodeStream;
use crate::io::ByteSource;

/// Upper bound on entries reserved up front.  Larger tables still parse;
/// they just grow as entries are validated.
const MAX_RESERVED_ENTRIES: usize = 64 * 1024;

/// Width of one offset-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetWidth {
    /// 4-byte entries.
    Narrow,
    /// 8-byte entries (extended clusters).
    Wide,
}

impl OffsetWidth {
    pub fn for_extended(extended: bool) -> Self {
        if extended { OffsetWidth::Wide } else { OffsetWidth::Narrow }
    }

    #[inline]
    pub fn bytes(self) -> u64 {
        match self {
            OffsetWidth::Narrow => 4,
            OffsetWidth::Wide   => 8,
        }
    }

    /// Decode one entry from the front of `buf`.
    fn decode(self, buf: &[u8]) -> u64 {
        match self {
            OffsetWidth::Narrow => u64::from(LittleEndian::read_u32(buf)),
            OffsetWidth::Wide   => LittleEndian::read_u64(buf),
        }
    }

    /// Read one entry from a forward-only reader.
    pub fn read_from<R: Read>(self, reader: &mut R) -> io::Result<u64> {
        match self {
            OffsetWidth::Narrow => reader.read_u32::<LittleEndian>().map(u64::from),
            OffsetWidth::Wide   => reader.read_u64::<LittleEndian>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    header_size: u64,
    offsets:     Vec<u64>,
}

impl OffsetTable {
    /// Parse the table from the start of a stored cluster's payload.
    ///
    /// Every entry must lie within `source`, so the data region is known to
    /// be addressable once this returns.
    pub fn parse_stored(source: &dyn ByteSource, width: OffsetWidth) -> Result<Self, ClusterError> {
        let limit = source.size();
        if limit < width.bytes() {
            return Err(ClusterError::HeaderOutOfBounds { header: width.bytes(), limit });
        }
        let first = match width {
            OffsetWidth::Narrow => u64::from(source.read_u32_le(0)?),
            OffsetWidth::Wide   => source.read_u64_le(0)?,
        };
        let mut builder = TableBuilder::start(first, width, Some(limit))?;
        if first > limit {
            warn!(header = first, limit, "offset table exceeds cluster region");
            return Err(ClusterError::HeaderOutOfBounds { header: first, limit });
        }

        let header = source.materialize(0, first)?;
        let step = width.bytes() as usize;
        for index in 1..builder.entry_count {
            let at = index * step;
            builder.push(width.decode(&header[at..at + step]))?;
        }
        Ok(builder.finish())
    }

    /// Parse the table by reading entries off a decode stream.  On success
    /// the stream sits at the first byte of blob 0.
    pub fn read_streamed(stream: &mut DecodeStream, width: OffsetWidth) -> Result<Self, ClusterError> {
        let first = stream.read_offset(width).map_err(ClusterError::Decode)?;
        let mut builder = TableBuilder::start(first, width, None)?;
        for _ in 1..builder.entry_count {
            let raw = stream.read_offset(width).map_err(ClusterError::Decode)?;
            builder.push(raw)?;
        }
        Ok(builder.finish())
    }

    /// Byte length of the header, which is also where blob data begins.
    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    /// Total byte length of the data region.
    pub fn data_size(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn blob_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Start of blob `index` relative to the data region.
    pub fn blob_start(&self, index: usize) -> Option<u64> {
        if index < self.blob_count() { self.offsets.get(index).copied() } else { None }
    }

    pub fn blob_size(&self, index: usize) -> Option<u64> {
        let end = *self.offsets.get(index.checked_add(1)?)?;
        Some(end - self.offsets[index])
    }

    /// Normalised offsets, `blob_count + 1` entries starting at 0.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

struct TableBuilder {
    header_size: u64,
    entry_count: usize,
    previous:    u64,
    limit:       Option<u64>,
    offsets:     Vec<u64>,
}

impl TableBuilder {
    fn start(first: u64, width: OffsetWidth, limit: Option<u64>) -> Result<Self, ClusterError> {
        let entry_count = usize::try_from(first / width.bytes()).unwrap_or(usize::MAX);
        if entry_count == 0 {
            warn!(first, width = width.bytes(), "offset table has no entries");
            return Err(ClusterError::HeaderTooShort { first, width: width.bytes() });
        }
        let mut offsets = Vec::with_capacity(entry_count.min(MAX_RESERVED_ENTRIES));
        offsets.push(0);
        Ok(Self { header_size: first, entry_count, previous: first, limit, offsets })
    }

    fn push(&mut self, offset: u64) -> Result<(), ClusterError> {
        let index = self.offsets.len();
        if offset < self.previous {
            warn!(index, offset, previous = self.previous, "offset table decreases");
            return Err(ClusterError::DecreasingOffset { index, previous: self.previous, offset });
        }
        if let Some(limit) = self.limit {
            if offset > limit {
                warn!(index, offset, limit, "offset entry beyond cluster region");
                return Err(ClusterError::OffsetOutOfBounds { index, offset, limit });
            }
        }
        self.previous = offset;
        self.offsets.push(offset - self.header_size);
        Ok(())
    }

    fn finish(self) -> OffsetTable {
        OffsetTable { header_size: self.header_size, offsets: self.offsets }
    }
}
