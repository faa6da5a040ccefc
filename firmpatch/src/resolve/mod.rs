//! Patch target resolution
//!
//! Turns the per-build constants into load addresses inside the image (or
//! inside an external payload region) and refuses anything that does not
//! land where it should. Results are plain values handed to the patch step;
//! nothing here writes memory.

pub mod redirect;

pub use redirect::{EmuRedirectConfig, NAND_TAG, NCSD_TAG, SDMC_TAG};

use crate::error::{FirmError, FirmResult};
use crate::image::FirmwareImage;
use crate::layout::{self, Bounds, KnownFirmware, LayoutConstants};
use crate::patch::{PatchTarget, STRUCTURAL_PATCHES};

/// Structure-derived targets (no signature search involved)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralTargets {
    pub sig_checks: [PatchTarget; 2],
    pub thread_hooks: [PatchTarget; 2],
    /// Physical address the thread payload is loaded to
    pub thread_code: u32,
}

/// Resolver bound to one identified firmware build
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'t> {
    firmware: &'t KnownFirmware,
}

impl<'t> Resolver<'t> {
    /// Identify the image against `table`
    pub fn identify(image: &FirmwareImage<'_>, table: &'t [KnownFirmware]) -> FirmResult<Self> {
        Ok(Self::new(layout::identify(image, table)?))
    }

    /// Use a known build without checking the image
    pub fn new(firmware: &'t KnownFirmware) -> Self {
        Self { firmware }
    }

    pub fn firmware(&self) -> &'t KnownFirmware {
        self.firmware
    }

    pub fn constants(&self) -> &'t LayoutConstants {
        &self.firmware.constants
    }

    /// Signature checks, thread hooks and the thread payload address
    ///
    /// `thread_region` is the external memory the thread payload will be
    /// loaded into; the layout's thread code address must fall inside it.
    pub fn structural(
        &self,
        image: &FirmwareImage<'_>,
        thread_region: Bounds,
    ) -> FirmResult<StructuralTargets> {
        let c = self.constants();
        let w = &c.windows;

        let sig_checks = [
            in_image(image, STRUCTURAL_PATCHES[0], c.sig_checks[0], w.sig_check)?,
            in_image(image, STRUCTURAL_PATCHES[1], c.sig_checks[1], w.sig_check)?,
        ];
        let thread_hooks = [
            in_image(image, STRUCTURAL_PATCHES[2], c.thread_hooks[0], w.thread_hook)?,
            in_image(image, STRUCTURAL_PATCHES[3], c.thread_hooks[1], w.thread_hook)?,
        ];

        if !thread_region.contains(c.thread_code, 1) {
            return Err(FirmError::Consistency("thread code"));
        }

        Ok(StructuralTargets {
            sig_checks,
            thread_hooks,
            thread_code: c.thread_code,
        })
    }
}

/// Target at a firmware address, translated into the loaded image
pub(crate) fn in_image(
    image: &FirmwareImage<'_>,
    name: &'static str,
    address: u32,
    window: usize,
) -> FirmResult<PatchTarget> {
    let load_address = image
        .translate(address, window)
        .ok_or(FirmError::Consistency(name))?;
    Ok(PatchTarget::new(name, load_address, window))
}
