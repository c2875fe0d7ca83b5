//! Immutable view onto a blob's bytes.

use std::ops::Deref;

use bytes::Bytes;

/// One blob, or a sub-range of one.
///
/// Backed by a reference-counted buffer: a window into the archive source
/// for stored clusters, or a slice of a decode-cache entry for compressed
/// ones.  Cloning never copies the bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    data: Bytes,
}

impl Blob {
    /// The empty blob returned for out-of-range requests.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Clamp `(offset, size)` against this blob and return the window.
    /// An offset past the end yields an empty blob.
    pub fn sub_blob(&self, offset: u64, size: u64) -> Blob {
        let len = self.size();
        if offset > len {
            return Blob::empty();
        }
        let size = size.min(len - offset);
        let start = offset as usize;
        Blob { data: self.data.slice(start..start + size as usize) }
    }
}

impl From<Bytes> for Blob {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
