//! Common test utilities: block device, in-memory storage, mock platform

#![allow(dead_code)]

pub mod builder;
pub use builder::*;

use std::collections::HashMap;
use std::io;

use firmpatch::handoff::{MpuConfig, Platform};
use firmpatch::memory::{PatchArena, Region, RegionKind};
use firmpatch::patch::{PatchBlobs, PatchEngine, PatchTarget, REDIRECT_PATCHES, STRUCTURAL_PATCHES};
use firmpatch::storage::{FileStorage, StorageError};
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            block_size: 512, // SD sector size
        }
    }

    /// Device of `blocks` zeroed blocks
    pub fn zeroed(blocks: usize) -> Self {
        Self::new(vec![0u8; blocks * 512])
    }

    /// Place `bytes` at the start of block `lba`
    pub fn write_at(&mut self, lba: u64, bytes: &[u8]) {
        let offset = lba as usize * self.block_size;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Path-keyed files in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: HashMap<String, Vec<u8>>,
    /// Return one byte less than asked for
    pub short_reads: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, data: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), data);
        self
    }
}

impl FileStorage for MemoryStorage {
    fn file_size(&mut self, path: &str) -> Result<u32, StorageError> {
        self.files
            .get(path)
            .map(|d| d.len() as u32)
            .ok_or(StorageError::FileNotFound)
    }

    fn read_file(&mut self, dest: &mut [u8], path: &str, size: u32) -> Result<usize, StorageError> {
        let data = self.files.get(path).ok_or(StorageError::FileNotFound)?;
        let mut n = (size as usize).min(data.len());
        if self.short_reads {
            n = n.saturating_sub(1);
        }
        if dest.len() < n {
            return Err(StorageError::BufferTooSmall);
        }
        dest[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Payload of the panic `MockPlatform::transfer_control` raises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jumped(pub u32);

/// Everything the platform was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Mpu(MpuConfig),
    Copy { dest: u32, bytes: Vec<u8> },
    Word { address: u32, value: u32 },
}

/// Records instead of touching the machine
#[derive(Debug, Default)]
pub struct MockPlatform {
    pub events: Vec<PlatformEvent>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copies(&self) -> Vec<(u32, &[u8])> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PlatformEvent::Copy { dest, bytes } => Some((*dest, bytes.as_slice())),
                _ => None,
            })
            .collect()
    }
}

impl Platform for MockPlatform {
    fn configure_memory_protection(&mut self, mpu: &MpuConfig) {
        self.events.push(PlatformEvent::Mpu(*mpu));
    }

    unsafe fn copy_to_physical(&mut self, dest: u32, src: &[u8]) {
        self.events.push(PlatformEvent::Copy {
            dest,
            bytes: src.to_vec(),
        });
    }

    unsafe fn write_word(&mut self, address: u32, value: u32) {
        self.events.push(PlatformEvent::Word { address, value });
    }

    unsafe fn transfer_control(&mut self, entry: u32) -> ! {
        std::panic::panic_any(Jumped(entry))
    }
}

/// Run `f`, expecting it to end in a jump; returns the entry point
pub fn expect_jump<F: FnOnce()>(f: F) -> u32 {
    let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .expect_err("control should have been transferred");
    payload
        .downcast_ref::<Jumped>()
        .map(|j| j.0)
        .expect("panic was not a jump")
}

pub static NAND_REDIRECT_BLOB: [u8; 8] = [0xAA; 8];
pub static MPU_BLOB: [u8; 0x18] = [0xBB; 0x18];
pub static SIG_CHECK_BLOB: [u8; 4] = [0x00, 0x20, 0x70, 0x47];
pub static THREAD_HOOK_BLOBS: [[u8; 8]; 2] = [[0xCC; 8], [0xDD; 8]];

pub fn blobs() -> PatchBlobs<'static> {
    PatchBlobs {
        nand_redirect: &NAND_REDIRECT_BLOB,
        mpu: &MPU_BLOB,
        sig_checks: [&SIG_CHECK_BLOB, &SIG_CHECK_BLOB],
        thread_hooks: [&THREAD_HOOK_BLOBS[0], &THREAD_HOOK_BLOBS[1]],
    }
}

/// Engine whose ledger holds every mandatory patch, applied to scratch memory
pub fn patched_engine() -> PatchEngine {
    let mut scratch = vec![0u8; 0x40];
    let mut arena = PatchArena::new()
        .with(Region::new(RegionKind::Image, 0, &mut scratch))
        .unwrap();
    let mut engine = PatchEngine::new();
    for (i, name) in REDIRECT_PATCHES.iter().chain(&STRUCTURAL_PATCHES).enumerate() {
        let target = PatchTarget::new(*name, i as u32 * 4, 4);
        engine.write_word(&mut arena, &target, 0).unwrap();
    }
    engine
}
