// Firmware handoff
//
// The only place where physical addresses are written to. Everything the
// jump needs is snapshotted from the patched image into a HandoffPlan first,
// so the platform sees nothing but (address, bytes) pairs and an entry point.

pub mod mpu;

pub use mpu::{AccessPermission, MpuConfig, MpuRegion};

use core::convert::Infallible;

use heapless::Vec;

use crate::boot::{BootStage, StageTracker};
use crate::config::BootConfig;
use crate::error::{FirmError, FirmResult};
use crate::image::{FirmwareImage, MAX_SECTIONS};
use crate::patch::PatchEngine;

/// Cell the ARM11 core polls for its entry point
pub const BOOT_PARAM_ARM11_ENTRY: u32 = 0x1FFF_FFF8;

/// Privileged machine access needed for the jump
///
/// Implementations own every side effect on processor state. None of these
/// calls can be undone.
pub trait Platform {
    /// Install the region table, cacheability and access permissions
    fn configure_memory_protection(&mut self, mpu: &MpuConfig);

    /// Copy `src` to physical address `dest`
    ///
    /// # Safety
    /// `dest..dest + src.len()` must be writable memory not aliased by any
    /// live Rust reference.
    unsafe fn copy_to_physical(&mut self, dest: u32, src: &[u8]);

    /// Store a 32-bit value at physical address `address`
    ///
    /// # Safety
    /// `address` must be a writable, aligned word.
    unsafe fn write_word(&mut self, address: u32, value: u32);

    /// Jump to `entry`
    ///
    /// # Safety
    /// `entry` must point at code that expects to be entered this way.
    unsafe fn transfer_control(&mut self, entry: u32) -> !;
}

/// One section move: image bytes to their run address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionCopy {
    pub index: usize,
    pub src_offset: usize,
    pub len: usize,
    pub dest: u32,
}

/// Snapshot of everything the jump needs
#[derive(Debug)]
pub struct HandoffPlan<'i> {
    image: &'i [u8],
    copies: Vec<SectionCopy, MAX_SECTIONS>,
    arm11_entry: u32,
    arm9_entry: u32,
    boot_param_cell: u32,
    mpu: MpuConfig,
}

impl<'i> HandoffPlan<'i> {
    /// Snapshot the patched image
    ///
    /// The run must be at `Patched` and `engine` must hold every mandatory
    /// patch (the redirect set too when `config.redirect_nand`). The ARM9
    /// entry has to land inside a section destination and the MPU table has
    /// to be encodable.
    pub fn prepare(
        image: &'i FirmwareImage<'_>,
        stages: &StageTracker,
        engine: &PatchEngine,
        config: &BootConfig<'_>,
    ) -> FirmResult<Self> {
        stages.expect(BootStage::Patched)?;
        engine.check_mandatory(config.redirect_nand)?;

        if !config.mpu.is_valid() {
            return Err(FirmError::Consistency("mpu config"));
        }

        let header = image.header();
        if image.sections().find_containing(header.arm9_entry, 4).is_none() {
            return Err(FirmError::Consistency("arm9 entry"));
        }

        let mut copies = Vec::new();
        for (index, section) in image.sections().iter().enumerate() {
            let copy = SectionCopy {
                index,
                src_offset: section.offset as usize,
                len: section.size as usize,
                dest: section.address,
            };
            copies
                .push(copy)
                .map_err(|_| FirmError::Consistency("section count"))?;
        }

        Ok(Self {
            image: image.bytes(),
            copies,
            arm11_entry: header.arm11_entry,
            arm9_entry: header.arm9_entry,
            boot_param_cell: config.boot_param_cell,
            mpu: config.mpu,
        })
    }

    pub fn copies(&self) -> &[SectionCopy] {
        &self.copies
    }

    pub fn arm11_entry(&self) -> u32 {
        self.arm11_entry
    }

    pub fn arm9_entry(&self) -> u32 {
        self.arm9_entry
    }

    pub fn boot_param_cell(&self) -> u32 {
        self.boot_param_cell
    }

    pub fn mpu(&self) -> &MpuConfig {
        &self.mpu
    }

    /// Source bytes for one copy
    pub fn source(&self, copy: &SectionCopy) -> Option<&'i [u8]> {
        self.image.get(copy.src_offset..copy.src_offset + copy.len)
    }

    /// Protect, relocate, publish the ARM11 entry, jump
    ///
    /// Only returns on a precondition failure, before anything was touched.
    ///
    /// # Safety
    /// Section destinations and the boot parameter cell are written through
    /// `platform` as physical memory; they must not overlap the running
    /// loader or any live buffer.
    pub unsafe fn execute<P: Platform>(
        &self,
        platform: &mut P,
        stages: &mut StageTracker,
    ) -> FirmResult<Infallible> {
        stages.expect(BootStage::Patched)?;

        // Resolve every source before the first irreversible step
        let mut sources: Vec<(&'i [u8], u32), MAX_SECTIONS> = Vec::new();
        for copy in &self.copies {
            let src = self
                .source(copy)
                .ok_or(FirmError::Consistency("section source"))?;
            sources
                .push((src, copy.dest))
                .map_err(|_| FirmError::Consistency("section count"))?;
        }

        platform.configure_memory_protection(&self.mpu);

        for (src, dest) in &sources {
            platform.copy_to_physical(*dest, src);
        }
        stages.advance(BootStage::Relocated)?;

        platform.write_word(self.boot_param_cell, self.arm11_entry);
        stages.advance(BootStage::HandedOff)?;

        platform.transfer_control(self.arm9_entry)
    }
}
