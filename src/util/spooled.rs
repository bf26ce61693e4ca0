//! Byte buffer that spills from memory to a temporary file.
//!
//! Response bodies and change-set payloads can grow to many megabytes; a
//! [`SpooledBuffer`] keeps small payloads in memory and transparently moves
//! to an unnamed temporary file once a configurable threshold is crossed.
//! The temporary file is deleted when the buffer is dropped.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use bytes::{Bytes, BytesMut};

/// Default spill threshold: 2 MiB.
pub const DEFAULT_SPILL_THRESHOLD: usize = 2 * 1024 * 1024;

enum Storage {
    Memory(BytesMut),
    Disk(File),
}

/// An append-only byte buffer backed by memory below a threshold and by an
/// anonymous temporary file above it.
pub struct SpooledBuffer {
    storage: Storage,
    threshold: usize,
    len: usize,
}

impl SpooledBuffer {
    /// Create an empty buffer with the given spill threshold in bytes.
    pub fn new(threshold: usize) -> Self {
        Self {
            storage: Storage::Memory(BytesMut::new()),
            threshold,
            len: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` once the buffer has moved to disk.
    pub fn spilled(&self) -> bool {
        matches!(self.storage, Storage::Disk(_))
    }

    /// Append a chunk, spilling to a temporary file if the threshold would
    /// be exceeded.
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match &mut self.storage {
            Storage::Memory(buf) => {
                if self.len + chunk.len() > self.threshold {
                    let mut file = tempfile::tempfile()?;
                    file.write_all(buf)?;
                    file.write_all(chunk)?;
                    self.storage = Storage::Disk(file);
                } else {
                    buf.extend_from_slice(chunk);
                }
            }
            Storage::Disk(file) => {
                file.write_all(chunk)?;
            }
        }
        self.len += chunk.len();
        Ok(())
    }

    /// Read back the full contents without consuming the buffer.
    ///
    /// Appends remain possible afterwards; the file cursor is restored to
    /// the end of the buffer.
    pub fn to_bytes(&mut self) -> io::Result<Bytes> {
        match &mut self.storage {
            Storage::Memory(buf) => Ok(Bytes::copy_from_slice(buf)),
            Storage::Disk(file) => {
                file.seek(SeekFrom::Start(0))?;
                let mut out = Vec::with_capacity(self.len);
                file.read_to_end(&mut out)?;
                file.seek(SeekFrom::End(0))?;
                Ok(Bytes::from(out))
            }
        }
    }
}
