use std::io;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::{Cluster, ClusterError, ClusterInfo, ClusterOptions, OffsetTable};
use crate::blob::Blob;
use crate::codec::DecodeStream;
use crate::io::ByteSource;

/// Compressed cluster.
///
/// The offset table is read off the decoder at construction, so counts and
/// sizes are known up front.  Blob bytes are decoded on demand, strictly in
/// index order, into an append-only cache.  All access that may decode holds
/// one per-cluster lock.
pub struct StreamedCluster {
    info:  ClusterInfo,
    table: OffsetTable,
    state: Mutex<DecodeState>,
}

struct DecodeState {
    stream:  DecodeStream,
    /// Entry `i` is blob `i`; never rebuilt once pushed.
    blobs:   Vec<Bytes>,
    /// First decode failure.  The stream is misaligned after one, so every
    /// later decode reports it instead of reading on.
    failure: Option<(io::ErrorKind, String)>,
}

impl StreamedCluster {
    /// Open a decoder over `region` (the cluster payload, info byte
    /// excluded) and read the offset table from it.
    pub fn new(region: Arc<dyn ByteSource>, info: ClusterInfo, opts: &ClusterOptions) -> Result<Self, ClusterError> {
        let mut stream = DecodeStream::open(region, info.compression, opts.read_chunk_size)?;
        let table = OffsetTable::read_streamed(&mut stream, info.offset_width())?;
        Ok(Self::with_table(info, table, stream))
    }

    /// Build over a decoder already positioned at blob 0.
    pub fn with_table(info: ClusterInfo, table: OffsetTable, stream: DecodeStream) -> Self {
        Self {
            info,
            table,
            state: Mutex::new(DecodeState { stream, blobs: Vec::new(), failure: None }),
        }
    }

    pub fn offset_table(&self) -> &OffsetTable {
        &self.table
    }

    /// Number of blobs decoded and cached so far.
    pub fn decoded_blobs(&self) -> usize {
        self.state.lock().blobs.len()
    }

    fn decoded(&self, index: usize) -> Result<Option<Bytes>, ClusterError> {
        if index >= self.blob_count() {
            return Ok(None);
        }
        let mut state = self.state.lock();
        state.ensure_decoded(index, &self.table).map(Some)
    }
}

impl DecodeState {
    fn ensure_decoded(&mut self, index: usize, table: &OffsetTable) -> Result<Bytes, ClusterError> {
        while self.blobs.len() <= index {
            if let Some((kind, msg)) = &self.failure {
                return Err(ClusterError::Decode(io::Error::new(*kind, msg.clone())));
            }
            let next = self.blobs.len();
            let size = table.blob_size(next).ok_or(ClusterError::IndexOutOfRange {
                index: next,
                count: table.blob_count(),
            })?;
            match self.stream.read_blob(size) {
                Ok(data) => {
                    trace!(index = next, size, "blob decoded");
                    self.blobs.push(data);
                }
                Err(e) => {
                    warn!(index = next, size, error = %e, "decode stream failed, cluster unreadable past this blob");
                    self.failure = Some((e.kind(), e.to_string()));
                    return Err(ClusterError::Decode(e));
                }
            }
        }
        Ok(self.blobs[index].clone())
    }
}

impl Cluster for StreamedCluster {
    fn info(&self) -> ClusterInfo {
        self.info
    }

    fn blob_count(&self) -> usize {
        self.table.blob_count()
    }

    fn blob_size(&self, index: usize) -> Result<u64, ClusterError> {
        self.table.blob_size(index).ok_or(ClusterError::IndexOutOfRange {
            index,
            count: self.blob_count(),
        })
    }

    fn blob(&self, index: usize) -> Result<Blob, ClusterError> {
        Ok(self.decoded(index)?.map(Blob::from).unwrap_or_default())
    }

    /// Decodes the whole blob, then slices.
    fn blob_range(&self, index: usize, offset: u64, size: u64) -> Result<Blob, ClusterError> {
        Ok(self.blob(index)?.sub_blob(offset, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::OffsetWidth;
    use crate::codec::Compression;
    use std::io::{Cursor, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plain reader that counts decoded bytes handed out.
    struct Counting {
        inner: Cursor<Vec<u8>>,
        read:  Arc<AtomicUsize>,
    }

    impl Read for Counting {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.read.fetch_add(n, Ordering::SeqCst);
            Ok(n)
        }
    }

    fn payload(blobs: &[&[u8]]) -> Vec<u8> {
        let header = 4 * (blobs.len() as u32 + 1);
        let mut out = Vec::new();
        let mut offset = header;
        out.extend_from_slice(&offset.to_le_bytes());
        for b in blobs {
            offset += b.len() as u32;
            out.extend_from_slice(&offset.to_le_bytes());
        }
        for b in blobs {
            out.extend_from_slice(b);
        }
        out
    }

    fn open(raw: Vec<u8>) -> (StreamedCluster, Arc<AtomicUsize>) {
        let read = Arc::new(AtomicUsize::new(0));
        let reader = Counting { inner: Cursor::new(raw), read: Arc::clone(&read) };
        let mut stream = DecodeStream::from_reader(Box::new(reader));
        let table = OffsetTable::read_streamed(&mut stream, OffsetWidth::Narrow).unwrap();
        let info = ClusterInfo { compression: Compression::Zstd, extended: false };
        (StreamedCluster::with_table(info, table, stream), read)
    }

    #[test]
    fn table_known_before_any_decode() {
        let (cluster, read) = open(payload(&[b"one", b"", b"three"]));
        assert_eq!(cluster.blob_count(), 3);
        assert_eq!(cluster.blob_size(2).unwrap(), 5);
        assert_eq!(cluster.decoded_blobs(), 0);
        assert_eq!(read.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn decodes_in_order_once() {
        let (cluster, read) = open(payload(&[b"one", b"", b"three"]));
        assert_eq!(cluster.blob(2).unwrap().data(), b"three");
        assert_eq!(cluster.decoded_blobs(), 3);
        let after_first = read.load(Ordering::SeqCst);

        assert_eq!(cluster.blob(0).unwrap().data(), b"one");
        assert!(cluster.blob(1).unwrap().is_empty());
        assert_eq!(cluster.blob_range(2, 1, 3).unwrap().data(), b"hre");
        assert_eq!(read.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn out_of_range_does_not_decode() {
        let (cluster, _) = open(payload(&[b"abc"]));
        assert!(cluster.blob(1).unwrap().is_empty());
        assert!(cluster.blob_range(5, 0, 1).unwrap().is_empty());
        assert_eq!(cluster.decoded_blobs(), 0);
        assert!(cluster.blob_range(0, 4, 1).unwrap().is_empty());
        assert!(matches!(cluster.blob_size(1), Err(ClusterError::IndexOutOfRange { .. })));
    }

    #[test]
    fn truncated_stream_fails_permanently() {
        let mut raw = payload(&[b"abc", b"defgh"]);
        raw.truncate(raw.len() - 2);
        let (cluster, read) = open(raw);

        assert_eq!(cluster.blob(0).unwrap().data(), b"abc");
        let err = cluster.blob(1).unwrap_err();
        assert_eq!(err.kind(), crate::cluster::ErrorKind::Format);

        let consumed = read.load(Ordering::SeqCst);
        assert!(matches!(cluster.blob(1), Err(ClusterError::Decode(_))));
        assert_eq!(read.load(Ordering::SeqCst), consumed);
        assert_eq!(cluster.blob(0).unwrap().data(), b"abc");
    }

    #[test]
    fn decreasing_header_rejected() {
        let mut raw = Vec::new();
        for e in [12u32, 17, 15] {
            raw.extend_from_slice(&e.to_le_bytes());
        }
        raw.extend_from_slice(b"abcde");
        let mut stream = DecodeStream::from_reader(Box::new(Cursor::new(raw)));
        assert!(matches!(
            OffsetTable::read_streamed(&mut stream, OffsetWidth::Narrow),
            Err(ClusterError::DecreasingOffset { index: 2, .. })
        ));
    }
}
