//! Storage backends
//!
//! The loader only ever needs two primitives from storage: the size of a
//! named file and a bounded read of it into a caller buffer.

pub mod extent; // Named extents on a raw block device

use core::fmt;

pub use extent::{ExtentStorage, FileExtent};

/// Storage failures surfaced to the loader as `FirmError::Io`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No file with that path
    FileNotFound,
    /// Underlying device reported an error
    DeviceError,
    /// Destination buffer cannot hold the file
    BufferTooSmall,
    /// Fewer bytes read than requested
    ShortRead,
    /// Device block size larger than the read scratch buffer
    UnsupportedBlockSize,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound => write!(f, "file not found"),
            Self::DeviceError => write!(f, "device error"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::ShortRead => write!(f, "short read"),
            Self::UnsupportedBlockSize => write!(f, "unsupported block size"),
        }
    }
}

/// Trait for storage backends
pub trait FileStorage {
    /// Size in bytes of the file at `path`
    fn file_size(&mut self, path: &str) -> Result<u32, StorageError>;

    /// Read `size` bytes of `path` into the start of `dest`
    ///
    /// Returns the number of bytes actually read.
    fn read_file(&mut self, dest: &mut [u8], path: &str, size: u32) -> Result<usize, StorageError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Read a whole file into `dest`, checking capacity and the byte count
///
/// Returns the file size. This is the only read path the loader uses.
pub fn read_whole<S: FileStorage + ?Sized>(
    storage: &mut S,
    dest: &mut [u8],
    path: &str,
) -> Result<usize, StorageError> {
    let size = storage.file_size(path)?;
    if size as usize > dest.len() {
        return Err(StorageError::BufferTooSmall);
    }

    let read = storage.read_file(dest, path, size)?;
    if read != size as usize {
        return Err(StorageError::ShortRead);
    }

    Ok(read)
}
