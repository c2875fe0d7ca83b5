pub mod blob;
pub mod cluster;
pub mod codec;
pub mod io;

pub use blob::Blob;
pub use cluster::{
    read_cluster, read_cluster_bounded, read_cluster_with_options, Cluster, ClusterError,
    ClusterInfo, ClusterOptions, ErrorKind, StoredCluster, StreamedCluster,
};
pub use codec::{get_codec, Compression};
pub use io::{ByteSource, FileSource, MemorySource};
