//! Extent-backed storage
//!
//! Files are contiguous runs of blocks on a raw device, described by a
//! static table of (path, start LBA, size). The boot medium is prepared
//! offline so each payload occupies exactly one extent.

use super::{FileStorage, StorageError};
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

/// Largest device block size we can read through the scratch buffer
pub const MAX_BLOCK_SIZE: usize = 4096;

/// One named file on the device
#[derive(Debug, Clone, Copy)]
pub struct FileExtent<'a> {
    /// Absolute path, e.g. "/rei/firmware_patched.bin"
    pub path: &'a str,
    /// First block of the file
    pub start_lba: u64,
    /// Length in bytes
    pub size: u32,
}

impl<'a> FileExtent<'a> {
    pub const fn new(path: &'a str, start_lba: u64, size: u32) -> Self {
        Self { path, start_lba, size }
    }
}

/// Storage backend reading named extents from a block device
pub struct ExtentStorage<'a, B: BlockIo> {
    device: B,
    files: &'a [FileExtent<'a>],
}

impl<'a, B: BlockIo> ExtentStorage<'a, B> {
    pub fn new(device: B, files: &'a [FileExtent<'a>]) -> Self {
        Self { device, files }
    }

    /// Give the device back (tests inspect it)
    pub fn into_inner(self) -> B {
        self.device
    }

    fn lookup(&self, path: &str) -> Result<&FileExtent<'a>, StorageError> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .ok_or(StorageError::FileNotFound)
    }
}

impl<'a, B: BlockIo> FileStorage for ExtentStorage<'a, B> {
    fn file_size(&mut self, path: &str) -> Result<u32, StorageError> {
        Ok(self.lookup(path)?.size)
    }

    fn read_file(&mut self, dest: &mut [u8], path: &str, size: u32) -> Result<usize, StorageError> {
        let extent = *self.lookup(path)?;
        let wanted = size.min(extent.size) as usize;
        if dest.len() < wanted {
            return Err(StorageError::BufferTooSmall);
        }

        let block_size = self.device.block_size().to_u64() as usize;
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(StorageError::UnsupportedBlockSize);
        }

        // Allocate block buffer once outside the loop
        let mut scratch = [0u8; MAX_BLOCK_SIZE];
        let block = &mut scratch[..block_size];

        let block_count = wanted.div_ceil(block_size);
        for i in 0..block_count {
            self.device
                .read_blocks(Lba(extent.start_lba + i as u64), block)
                .map_err(|_| StorageError::DeviceError)?;

            let offset = i * block_size;
            let len = core::cmp::min(block_size, wanted - offset);
            dest[offset..offset + len].copy_from_slice(&block[..len]);
        }

        Ok(wanted)
    }

    fn name(&self) -> &str {
        "extent"
    }
}
