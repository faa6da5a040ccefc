//! One boot run, start to jump
//!
//! `prepare` loads the image and both payloads, resolves every target and
//! applies the patch plan. `hand_off` relocates the patched sections and
//! enters the firmware. Each step is checked against the stage tracker and
//! any error aborts the run with the log explaining why.

pub mod stage;
pub mod transform;

pub use stage::{BootStage, StageTracker};
pub use transform::{NoTransform, SectionTransform};

use alloc::format;

use core::convert::Infallible;

use crate::config::BootConfig;
use crate::error::{FirmError, FirmResult};
use crate::feedback::{BootLog, FeedbackCategory, RunSummary};
use crate::handoff::{HandoffPlan, Platform};
use crate::image::FirmwareImage;
use crate::layout::{Bounds, KnownFirmware};
use crate::memory::{PatchArena, Region, RegionKind};
use crate::patch::{PatchBlobs, PatchEngine, PatchPlan};
use crate::resolve::{Resolver, NAND_TAG, NCSD_TAG, SDMC_TAG};
use crate::scan;
use crate::storage::{self, FileStorage};

/// Memory handed to a run
///
/// On hardware these are the physical windows themselves (FCRAM for the
/// image, ARM9 RAM for both payloads).
pub struct Buffers<'m> {
    pub image: &'m mut [u8],
    pub redirect: &'m mut [u8],
    pub thread: &'m mut [u8],
}

/// Patched image waiting for handoff
pub struct PreparedBoot<'m> {
    image: FirmwareImage<'m>,
    summary: RunSummary,
}

impl<'m> PreparedBoot<'m> {
    pub fn image(&self) -> &FirmwareImage<'m> {
        &self.image
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

/// State of one boot attempt
pub struct BootRun<'c> {
    config: &'c BootConfig<'c>,
    table: &'c [KnownFirmware],
    stages: StageTracker,
    engine: PatchEngine,
    log: BootLog,
}

impl<'c> BootRun<'c> {
    pub fn new(config: &'c BootConfig<'c>, table: &'c [KnownFirmware]) -> Self {
        Self {
            config,
            table,
            stages: StageTracker::new(),
            engine: PatchEngine::new(),
            log: BootLog::default(),
        }
    }

    pub fn config(&self) -> &'c BootConfig<'c> {
        self.config
    }

    pub fn stage(&self) -> BootStage {
        self.stages.current()
    }

    pub fn log(&self) -> &BootLog {
        &self.log
    }

    pub fn engine(&self) -> &PatchEngine {
        &self.engine
    }

    /// Load, resolve and patch; on success the run is at `Patched`
    pub fn prepare<'m, S, T>(
        &mut self,
        storage: &mut S,
        transform: &mut T,
        buffers: Buffers<'m>,
        blobs: &PatchBlobs<'_>,
    ) -> FirmResult<PreparedBoot<'m>>
    where
        S: FileStorage + ?Sized,
        T: SectionTransform + ?Sized,
    {
        self.try_prepare(storage, transform, buffers, blobs)
            .map_err(|e| self.fail(e))
    }

    /// Relocate and jump
    ///
    /// # Safety
    /// See [`HandoffPlan::execute`]. On success this never returns.
    pub unsafe fn hand_off<P: Platform>(
        &mut self,
        prepared: &PreparedBoot<'_>,
        platform: &mut P,
    ) -> FirmResult<Infallible> {
        let plan =
            HandoffPlan::prepare(&prepared.image, &self.stages, &self.engine, self.config)
                .map_err(|e| self.fail(e))?;

        self.log.info(
            FeedbackCategory::Handoff,
            format!(
                "relocating {} sections, arm9 entry 0x{:08X}",
                plan.copies().len(),
                plan.arm9_entry()
            ),
        );

        match plan.execute(platform, &mut self.stages) {
            Ok(never) => match never {},
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Whole run
    ///
    /// # Safety
    /// See [`HandoffPlan::execute`].
    pub unsafe fn run<S, T, P>(
        &mut self,
        storage: &mut S,
        transform: &mut T,
        buffers: Buffers<'_>,
        blobs: &PatchBlobs<'_>,
        platform: &mut P,
    ) -> FirmResult<Infallible>
    where
        S: FileStorage + ?Sized,
        T: SectionTransform + ?Sized,
        P: Platform,
    {
        let prepared = self.prepare(storage, transform, buffers, blobs)?;
        self.hand_off(&prepared, platform)
    }

    fn try_prepare<'m, S, T>(
        &mut self,
        storage: &mut S,
        transform: &mut T,
        buffers: Buffers<'m>,
        blobs: &PatchBlobs<'_>,
    ) -> FirmResult<PreparedBoot<'m>>
    where
        S: FileStorage + ?Sized,
        T: SectionTransform + ?Sized,
    {
        let cfg = self.config;
        self.stages.expect(BootStage::Unloaded)?;

        let Buffers {
            image: image_buf,
            redirect: redirect_buf,
            thread: thread_buf,
        } = buffers;

        // Load
        let capacity = cfg.image_capacity.min(image_buf.len());
        let mut image = FirmwareImage::load(
            storage,
            cfg.firm_path,
            &mut image_buf[..capacity],
            cfg.load_base,
        )?;
        self.log.info(
            FeedbackCategory::Storage,
            format!("{}: {} bytes via {}", cfg.firm_path, image.len(), storage.name()),
        );
        self.log.debug(
            FeedbackCategory::Image,
            format!(
                "{} sections, arm9 0x{:08X}, arm11 0x{:08X}",
                image.sections().count(),
                image.header().arm9_entry,
                image.header().arm11_entry
            ),
        );

        let resolver = Resolver::identify(&image, self.table)?;
        let firmware = resolver.firmware();
        let c = resolver.constants();
        self.log.info(FeedbackCategory::Image, format!("firmware: {}", firmware.name));

        let arm9 = firmware.id.arm9_section;
        let section = image
            .section_bytes_mut(arm9)
            .ok_or(FirmError::Consistency("arm9 section"))?;
        transform
            .transform(arm9, section)
            .map_err(|_| FirmError::TransformFailed)?;

        let mut redirect = external_region(RegionKind::RedirectCode, cfg.redirect_region, redirect_buf);
        let mut thread = external_region(RegionKind::ThreadCode, cfg.thread_region, thread_buf);

        let redirect_len = if cfg.redirect_nand {
            self.load_payload(storage, cfg.redirect_path, &mut redirect, c.redirect_code)?
        } else {
            0
        };
        self.load_payload(storage, cfg.thread_path, &mut thread, c.thread_code)?;

        self.stages.advance(BootStage::Loaded)?;

        // Resolve
        let structural = resolver.structural(&image, thread.bounds()?)?;
        let emu = if cfg.redirect_nand {
            self.warn_duplicate_tags(&redirect, c.redirect_code, redirect_len);
            Some(resolver.redirect(&image, &redirect, redirect_len)?)
        } else {
            None
        };

        for t in structural.sig_checks.iter().chain(&structural.thread_hooks) {
            self.log.debug(
                FeedbackCategory::Resolve,
                format!("{} -> 0x{:08X}", t.name, t.address),
            );
        }
        if let Some(emu) = &emu {
            self.log.debug(
                FeedbackCategory::Resolve,
                format!(
                    "sdmmc 0x{:08X}, emunand offset 0x{:X} header 0x{:X}",
                    emu.sdmmc, emu.nand.offset, emu.nand.header
                ),
            );
        }
        self.stages.advance(BootStage::Resolved)?;

        // Patch
        let plan = PatchPlan::build(&structural, emu.as_ref(), blobs)?;
        {
            let load_base = image.load_base();
            let mut arena = PatchArena::new()
                .with(Region::new(RegionKind::Image, load_base, image.bytes_mut()))?
                .with(redirect.reborrow())?
                .with(thread.reborrow())?;

            let applied = self
                .engine
                .apply_sequence(&mut arena, plan.as_slice())
                .map_err(|partial| {
                    self.log.warning(FeedbackCategory::Patch, format!("{}", partial));
                    partial.error
                })?;
            self.log.success(
                FeedbackCategory::Patch,
                format!("{} of {} patches applied", applied, plan.len()),
            );
        }
        for p in self.engine.applied() {
            self.log.debug(
                FeedbackCategory::Patch,
                format!("{} @ 0x{:08X} ({} bytes)", p.name, p.address, p.len),
            );
        }
        self.stages.advance(BootStage::Patched)?;

        let summary = RunSummary {
            firmware: firmware.name,
            load_base: image.load_base(),
            sections: image.sections().count(),
            arm9_entry: image.header().arm9_entry,
            arm11_entry: image.header().arm11_entry,
            structural,
            redirect: emu,
            applied: self.engine.applied().to_vec(),
        };

        Ok(PreparedBoot { image, summary })
    }

    /// Read a payload file into `region` starting at `at`
    fn load_payload<S: FileStorage + ?Sized>(
        &mut self,
        storage: &mut S,
        path: &str,
        region: &mut Region<'_>,
        at: u32,
    ) -> FirmResult<usize> {
        let offset = region
            .offset_of(at, 0)
            .ok_or(FirmError::Consistency(region.kind.name()))?;
        let size = storage::read_whole(storage, &mut region.data[offset..], path)?;
        self.log.info(
            FeedbackCategory::Storage,
            format!("{}: {} bytes at 0x{:08X}", path, size, at),
        );
        Ok(size)
    }

    /// First match wins; say so when it is not the only one
    fn warn_duplicate_tags(&mut self, code: &Region<'_>, at: u32, len: usize) {
        let Some(start) = code.offset_of(at, len) else {
            return;
        };
        let loaded = &code.data[start..start + len];
        for tag in [SDMC_TAG, NAND_TAG, NCSD_TAG] {
            let n = scan::count(loaded, tag.bytes, len);
            if n > 1 {
                self.log.warning(
                    FeedbackCategory::Scan,
                    format!("tag {} found {} times, using the first", tag.name, n),
                );
            }
        }
    }

    /// Abort the run and record why
    ///
    /// Past relocation the run cannot abort, so the error is only noted.
    fn fail(&mut self, e: FirmError) -> FirmError {
        let category = category_of(&e);
        let relocated = matches!(
            self.stages.current(),
            BootStage::Relocated | BootStage::HandedOff
        );
        if relocated {
            self.log.warning(category, format!("{} after relocation", e));
        } else {
            self.stages.abort();
            self.log.error(category, format!("{}", e));
        }
        e
    }
}

/// Region over the caller's buffer, clipped to the configured window
fn external_region(kind: RegionKind, bounds: Bounds, buf: &mut [u8]) -> Region<'_> {
    let len = buf.len().min(bounds.size as usize);
    Region::new(kind, bounds.base, &mut buf[..len])
}

fn category_of(e: &FirmError) -> FeedbackCategory {
    match e {
        FirmError::Io(_) => FeedbackCategory::Storage,
        FirmError::Format(_) | FirmError::UnsupportedVersion | FirmError::TransformFailed => {
            FeedbackCategory::Image
        }
        FirmError::NotFound(_) => FeedbackCategory::Scan,
        FirmError::Consistency(_) => FeedbackCategory::Resolve,
        FirmError::Patch(_) => FeedbackCategory::Patch,
        FirmError::InvalidTransition { .. } => FeedbackCategory::General,
    }
}
