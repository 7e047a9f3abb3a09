//! Zero-copy byte source abstraction.
//!
//! A [`ByteSource`] is an immutable handle to binary content of known total
//! size, backed either by an in-memory buffer or a memory-mapped file. Slicing
//! produces a new handle over the same backing data; bytes are never copied.
//! A reader owns its source for its whole lifetime, and every fragment slice
//! or range slice shares the backing allocation through an `Arc`.

pub mod validation;

use crate::error::{LineSeekError, Result};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// Shared backing storage for a [`ByteSource`].
#[derive(Clone)]
enum Backing {
    /// Content loaded entirely into memory (small inputs, tests)
    InMemory(Arc<Vec<u8>>),
    /// Content accessed via memory mapping (large files)
    MemoryMapped(Arc<Mmap>),
}

impl Backing {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Backing::InMemory(vec) => vec.as_slice(),
            Backing::MemoryMapped(mmap) => &mmap[..],
        }
    }
}

/// Immutable, sliceable handle to binary content of known size.
///
/// Cloning and slicing are cheap: both produce handles referencing the same
/// backing data. Pages of a memory-mapped source are loaded by the OS on
/// first access, so constructing a source never scans the file.
#[derive(Clone)]
pub struct ByteSource {
    backing: Backing,
    start: usize,
    end: usize,
}

impl ByteSource {
    /// Open a file as a memory-mapped byte source.
    ///
    /// The file is validated (exists, regular, non-empty, readable) before
    /// mapping, mirroring the checks a caller would otherwise forget.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        validation::validate_file_path(path)?;

        let file = File::open(path).map_err(|e| {
            LineSeekError::file_error(format!("Failed to open file: {}", path.display()), e)
        })?;

        // SAFETY: the mapping is read-only and the file handle stays open for
        // the lifetime of the map. Truncation by another process is the usual
        // mmap caveat and out of scope here.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| {
                LineSeekError::file_error(
                    format!("Failed to memory map file: {}", path.display()),
                    e,
                )
            })?
        };

        // Indexing reads the file front to back once.
        #[cfg(unix)]
        if let Err(e) = mmap.advise(memmap2::Advice::Sequential) {
            log::warn!("failed to set mmap advice: {}", e);
        }

        let len = mmap.len();
        Ok(Self {
            backing: Backing::MemoryMapped(Arc::new(mmap)),
            start: 0,
            end: len,
        })
    }

    /// Wrap an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let vec: Vec<u8> = bytes.into();
        let len = vec.len();
        Self {
            backing: Backing::InMemory(Arc::new(vec)),
            start: 0,
            end: len,
        }
    }

    /// Total size of this source (or slice) in bytes.
    pub fn len(&self) -> u64 {
        (self.end - self.start) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.backing.as_bytes()[self.start..self.end]
    }

    /// A new handle over `range` of this source, referencing the same backing
    /// data. The range is clamped to the source bounds.
    pub fn slice(&self, range: Range<u64>) -> ByteSource {
        let len = self.len();
        let start = range.start.min(len) as usize;
        let end = range.end.clamp(range.start.min(len), len) as usize;
        ByteSource {
            backing: self.backing.clone(),
            start: self.start + start,
            end: self.start + end,
        }
    }

    /// Absolute offset of this slice within the root source.
    pub fn offset(&self) -> u64 {
        self.start as u64
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match self.backing {
            Backing::InMemory(_) => "in-memory",
            Backing::MemoryMapped(_) => "mmap",
        };
        f.debug_struct("ByteSource")
            .field("backing", &backing)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}
