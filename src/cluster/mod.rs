//! Cluster decoding: one archive region turned into addressable blobs.
//!
//! # Layout
//! ```text
//! +------+------------------------------------------------+
//! | info | payload (stored verbatim, or one codec stream) |
//! +------+------------------------------------------------+
//!          offset table | blob 0 | blob 1 | ... | blob n-1
//! ```
//! The info byte carries the compression kind in bits 0..3 and the
//! extended-offset flag in bit 4; bits 5..7 are ignored on read.
//!
//! Stored clusters ([`StoredCluster`]) parse their table eagerly and serve
//! blobs as windows into the source.  Compressed clusters
//! ([`StreamedCluster`]) read the table off the decoder and materialise blobs
//! lazily, in index order, behind a per-cluster lock.

mod offsets;
mod stored;
mod streamed;

pub use offsets::{OffsetTable, OffsetWidth};
pub use stored::StoredCluster;
pub use streamed::StreamedCluster;

use std::io;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::blob::Blob;
use crate::codec::{CodecError, Compression};
use crate::io::ByteSource;

/// Mask for the compression kind in the info byte.
pub const COMPRESSION_MASK: u8 = 0x0F;
/// Extended-offset flag in the info byte.
pub const EXTENDED_FLAG: u8 = 0x10;
/// Default bytes pulled from the source per decoder input read: 64 KiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Invalid compression flag: {0:#04x}")]
    InvalidCompression(u8),
    #[error("Invalid cluster bounds {start}..{end} in a {size}-byte source")]
    InvalidBounds { start: u64, end: u64, size: u64 },
    #[error("Offset table header too short: first entry {first}, entry width {width}")]
    HeaderTooShort { first: u64, width: u64 },
    #[error("Offset table header of {header} bytes exceeds the {limit}-byte cluster region")]
    HeaderOutOfBounds { header: u64, limit: u64 },
    #[error("Offset entry {index} ({offset}) is below the previous entry ({previous})")]
    DecreasingOffset { index: usize, previous: u64, offset: u64 },
    #[error("Offset entry {index} ({offset}) lies beyond the {limit}-byte cluster region")]
    OffsetOutOfBounds { index: usize, offset: u64, limit: u64 },
    /// The decoder failed or ran dry.  Permanent for the cluster instance.
    #[error("Decode stream error: {0}")]
    Decode(#[source] io::Error),
    #[error("{0} compression is not available in this build")]
    Unsupported(Compression),
    #[error("Blob index {index} out of range ({count} blobs)")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of a [`ClusterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or inconsistent cluster data; the archive is corrupt here.
    Format,
    /// Compression kind recognised but not decodable by this build.
    UnsupportedFeature,
    IndexOutOfRange,
    /// The byte source itself failed.
    Io,
}

impl ClusterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClusterError::Unsupported(_)          => ErrorKind::UnsupportedFeature,
            ClusterError::IndexOutOfRange { .. }  => ErrorKind::IndexOutOfRange,
            ClusterError::Io(_)                   => ErrorKind::Io,
            _                                     => ErrorKind::Format,
        }
    }
}

impl From<CodecError> for ClusterError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Unavailable(kind) | CodecError::NotAStreamCodec(kind) => {
                ClusterError::Unsupported(kind)
            }
            CodecError::Io(e) => ClusterError::Decode(e),
        }
    }
}

// ── Info byte ────────────────────────────────────────────────────────────────

/// Decoded cluster info byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterInfo {
    pub compression: Compression,
    pub extended:    bool,
}

impl ClusterInfo {
    pub fn parse(byte: u8) -> Result<Self, ClusterError> {
        let flag = byte & COMPRESSION_MASK;
        let compression = Compression::from_flag(flag)
            .ok_or(ClusterError::InvalidCompression(flag))?;
        Ok(Self { compression, extended: byte & EXTENDED_FLAG != 0 })
    }

    pub fn to_byte(self) -> u8 {
        self.compression as u8 | if self.extended { EXTENDED_FLAG } else { 0 }
    }

    pub fn offset_width(self) -> OffsetWidth {
        OffsetWidth::for_extended(self.extended)
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Tuning for [`read_cluster_with_options`].
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    /// Bytes pulled from the source per decoder input read.
    pub read_chunk_size: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self { read_chunk_size: DEFAULT_READ_CHUNK_SIZE }
    }
}

// ── Cluster contract ─────────────────────────────────────────────────────────

/// A decoded cluster.  Shared across readers as `Arc<dyn Cluster>`.
///
/// Out-of-range blob requests are forgiving: `blob` and `blob_range` return
/// an empty blob for an index past the end or an offset past the blob end.
/// Only `blob_size` reports [`ClusterError::IndexOutOfRange`].
pub trait Cluster: Send + Sync {
    fn info(&self) -> ClusterInfo;

    fn compression(&self) -> Compression {
        self.info().compression
    }

    fn is_compressed(&self) -> bool {
        self.compression().is_compressed()
    }

    fn is_extended(&self) -> bool {
        self.info().extended
    }

    fn blob_count(&self) -> usize;

    fn blob_size(&self, index: usize) -> Result<u64, ClusterError>;

    fn blob(&self, index: usize) -> Result<Blob, ClusterError>;

    /// Window `[offset, offset + size)` of blob `index`, with `size` clamped
    /// to the blob end.
    fn blob_range(&self, index: usize, offset: u64, size: u64) -> Result<Blob, ClusterError>;

    /// Offset of blob `index` from the start of the cluster payload, for
    /// callers that read stored blobs straight from the archive.  `None` for
    /// compressed clusters.
    fn blob_offset(&self, _index: usize) -> Option<u64> {
        None
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Read the cluster starting at `offset` and running to the end of `source`.
pub fn read_cluster(source: &dyn ByteSource, offset: u64) -> Result<Arc<dyn Cluster>, ClusterError> {
    read_cluster_with_options(source, offset, None, &ClusterOptions::default())
}

/// Read the cluster occupying `[offset, end)`, where `end` is typically the
/// next cluster's offset.
pub fn read_cluster_bounded(
    source: &dyn ByteSource,
    offset: u64,
    end:    u64,
) -> Result<Arc<dyn Cluster>, ClusterError> {
    read_cluster_with_options(source, offset, Some(end), &ClusterOptions::default())
}

pub fn read_cluster_with_options(
    source: &dyn ByteSource,
    offset: u64,
    end:    Option<u64>,
    opts:   &ClusterOptions,
) -> Result<Arc<dyn Cluster>, ClusterError> {
    let info = ClusterInfo::parse(source.read_byte(offset)?)?;

    let size  = source.size();
    let start = offset.saturating_add(1);
    let end   = end.unwrap_or(size);
    if end < start || end > size {
        return Err(ClusterError::InvalidBounds { start, end, size });
    }
    let region = source.sub_range(start, end - start)?;

    let cluster: Arc<dyn Cluster> = if info.compression.is_compressed() {
        Arc::new(StreamedCluster::new(region, info, opts)?)
    } else {
        Arc::new(StoredCluster::new(region, info)?)
    };

    debug!(
        offset,
        compression = %info.compression,
        extended    = info.extended,
        blobs       = cluster.blob_count(),
        "cluster opened"
    );
    Ok(cluster)
}
