use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use super::{check_range, ByteSource};

/// File-backed source using positional reads.  Sub-ranges share the
/// underlying handle, so narrowing a view never reopens the file.
#[derive(Debug, Clone)]
pub struct FileSource {
    file:  Arc<File>,
    start: u64,
    size:  u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::from_file(File::open(path)?)
    }

    pub fn from_file(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self { file: Arc::new(file), start: 0, size })
    }

    pub fn into_shared(self) -> Arc<dyn ByteSource> {
        Arc::new(self)
    }

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut done = 0;
            while done < buf.len() {
                match self.file.seek_read(&mut buf[done..], offset + done as u64)? {
                    0 => return Err(io::ErrorKind::UnexpectedEof.into()),
                    n => done += n,
                }
            }
            Ok(())
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &*self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf)
        }
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn sub_range(&self, offset: u64, length: u64) -> io::Result<Arc<dyn ByteSource>> {
        check_range(offset, length, self.size)?;
        Ok(Arc::new(FileSource {
            file:  Arc::clone(&self.file),
            start: self.start + offset,
            size:  length,
        }))
    }

    fn materialize(&self, offset: u64, length: u64) -> io::Result<Bytes> {
        check_range(offset, length, self.size)?;
        let len = usize::try_from(length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large for memory"))?;
        let mut buf = vec![0u8; len];
        self.read_exact_at(&mut buf, self.start + offset)?;
        Ok(Bytes::from(buf))
    }
}
