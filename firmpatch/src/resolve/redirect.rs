//! NAND redirect (emunand) resolution
//!
//! The redirect code carries three placeholder words, tagged "SDMC",
//! "NAND" and "NCSD". Each is replaced with a value computed from the
//! firmware: the SD/MMC controller struct address, the first sector of the
//! emulated NAND and the sector of its NCSD header. The firmware's NAND
//! read/write routines are then hooked to jump into that code, and its MPU
//! table is patched so the code region is executable.

use super::{in_image, Resolver};
use crate::error::{FirmError, FirmResult};
use crate::image::utils::read_u32;
use crate::image::FirmwareImage;
use crate::layout::{LayoutConstants, NandLayout};
use crate::memory::Region;
use crate::patch::{PatchTarget, REDIRECT_PATCHES};
use crate::scan::{self, Signature};

pub const SDMC_TAG: Signature = Signature::new("SDMC", b"SDMC");
pub const NAND_TAG: Signature = Signature::new("NAND", b"NAND");
pub const NCSD_TAG: Signature = Signature::new("NCSD", b"NCSD");

/// Controller struct address is the sum of two words in the referencing code
const SDMMC_BASE_FIELD: usize = 0x0A;
const SDMMC_ADDEND_FIELD: usize = 0x0E;
const SDMMC_REF_LEN: usize = 0x12;

/// Everything the redirect patches need, resolved once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmuRedirectConfig {
    /// Tag cells inside the redirect code
    pub sdmmc_cell: u32,
    pub offset_cell: u32,
    pub header_cell: u32,
    /// SD/MMC controller struct address
    pub sdmmc: u32,
    pub nand: NandLayout,
    pub read_hook: PatchTarget,
    pub write_hook: PatchTarget,
    pub mpu_slot: PatchTarget,
}

impl EmuRedirectConfig {
    /// (cell target, value) for the three tag cells, in tag order
    pub fn cell_writes(&self) -> [(PatchTarget, u32); 3] {
        [
            (PatchTarget::new(REDIRECT_PATCHES[0], self.sdmmc_cell, 4), self.sdmmc),
            (PatchTarget::new(REDIRECT_PATCHES[1], self.offset_cell, 4), self.nand.offset),
            (PatchTarget::new(REDIRECT_PATCHES[2], self.header_cell, 4), self.nand.header),
        ]
    }
}

impl<'t> Resolver<'t> {
    /// Resolve the redirect configuration
    ///
    /// `code` is the region the redirect code was loaded into and
    /// `loaded_len` the number of bytes loaded at the layout's redirect code
    /// address. Only those bytes are searched.
    pub fn redirect(
        &self,
        image: &FirmwareImage<'_>,
        code: &Region<'_>,
        loaded_len: usize,
    ) -> FirmResult<EmuRedirectConfig> {
        let c = self.constants();

        let start = code
            .offset_of(c.redirect_code, loaded_len)
            .ok_or(FirmError::Consistency("redirect code"))?;
        let loaded = &code.data[start..start + loaded_len];

        let sdmmc_cell = scan::find_address(loaded, c.redirect_code, &SDMC_TAG, loaded_len)?;
        let offset_cell = scan::find_address(loaded, c.redirect_code, &NAND_TAG, loaded_len)?;
        let header_cell = scan::find_address(loaded, c.redirect_code, &NCSD_TAG, loaded_len)?;

        let (read_hook, write_hook) = emu_rw_hooks(image, c)?;

        Ok(EmuRedirectConfig {
            sdmmc_cell,
            offset_cell,
            header_cell,
            sdmmc: sdmmc_struct(image, c)?,
            nand: emunand_sectors(c),
            read_hook,
            write_hook,
            mpu_slot: mpu_slot(image, c)?,
        })
    }
}

/// SD/MMC controller struct address, read out of the firmware code
fn sdmmc_struct(image: &FirmwareImage<'_>, c: &LayoutConstants) -> FirmResult<u32> {
    const WHAT: &str = "sdmmc struct";

    let reference = image
        .translate(c.sdmmc_ref, SDMMC_REF_LEN)
        .and_then(|load| image.image_offset(load, SDMMC_REF_LEN))
        .ok_or(FirmError::Consistency(WHAT))?;

    let bytes = image.bytes();
    let base = read_u32(bytes, reference + SDMMC_BASE_FIELD).ok_or(FirmError::Consistency(WHAT))?;
    let addend = read_u32(bytes, reference + SDMMC_ADDEND_FIELD).ok_or(FirmError::Consistency(WHAT))?;
    let address = base.checked_add(addend).ok_or(FirmError::Consistency(WHAT))?;

    if !c.arm9_ram.contains(address, 4) {
        return Err(FirmError::Consistency(WHAT));
    }
    Ok(address)
}

/// Emulated NAND placement
fn emunand_sectors(c: &LayoutConstants) -> NandLayout {
    c.nand
}

/// NAND read and write routines to hook
fn emu_rw_hooks(image: &FirmwareImage<'_>, c: &LayoutConstants) -> FirmResult<(PatchTarget, PatchTarget)> {
    let window = c.windows.redirect_hook;
    Ok((
        in_image(image, REDIRECT_PATCHES[3], c.emu_read_hook, window)?,
        in_image(image, REDIRECT_PATCHES[4], c.emu_write_hook, window)?,
    ))
}

/// MPU region table the firmware installs
fn mpu_slot(image: &FirmwareImage<'_>, c: &LayoutConstants) -> FirmResult<PatchTarget> {
    in_image(image, REDIRECT_PATCHES[5], c.mpu_slot, c.windows.mpu_slot)
}
