use std::sync::Arc;

use super::{Cluster, ClusterError, ClusterInfo, OffsetTable};
use crate::blob::Blob;
use crate::io::ByteSource;

/// Uncompressed cluster.  Immutable once built; blob reads are independent
/// sub-range reads of the data region and need no locking.
pub struct StoredCluster {
    info:  ClusterInfo,
    table: OffsetTable,
    /// The data region `[header_size, header_size + data_size)` only.
    data:  Arc<dyn ByteSource>,
}

impl StoredCluster {
    /// Parse the offset table of `region` (the cluster payload, info byte
    /// excluded) and rebind to its data region.
    pub fn new(region: Arc<dyn ByteSource>, info: ClusterInfo) -> Result<Self, ClusterError> {
        let table = OffsetTable::parse_stored(&*region, info.offset_width())?;
        let data = region.sub_range(table.header_size(), table.data_size())?;
        Ok(Self { info, table, data })
    }

    pub fn offset_table(&self) -> &OffsetTable {
        &self.table
    }
}

impl Cluster for StoredCluster {
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
        self.blob_range(index, 0, u64::MAX)
    }

    fn blob_range(&self, index: usize, offset: u64, size: u64) -> Result<Blob, ClusterError> {
        let (Some(start), Some(blob_size)) = (self.table.blob_start(index), self.table.blob_size(index)) else {
            return Ok(Blob::empty());
        };
        if offset > blob_size {
            return Ok(Blob::empty());
        }
        let size = size.min(blob_size - offset);
        if usize::try_from(size).is_err() {
            return Ok(Blob::empty());
        }
        Ok(Blob::from(self.data.materialize(start + offset, size)?))
    }

    fn blob_offset(&self, index: usize) -> Option<u64> {
        self.table.blob_start(index).map(|start| self.table.header_size() + start)
    }
}
