//! Ordered patch plan for one boot
//!
//! Order is fixed:
//! 1. redirect tag cells (values the hooks will rely on)
//! 2. NAND read/write hooks (jump into the redirect code)
//! 3. MPU table (make the redirect code region usable)
//! 4. signature checks
//! 5. thread hooks (thread payload is loaded before planning)

use heapless::Vec;

use super::{Patch, PatchBlob, PatchTarget, MAX_PATCHES};
use crate::error::{FirmError, FirmResult};
use crate::resolve::{EmuRedirectConfig, StructuralTargets};

/// Caller-supplied replacement code
#[derive(Debug, Clone, Copy)]
pub struct PatchBlobs<'b> {
    /// Branch into the redirect code, used for both NAND hooks
    pub nand_redirect: &'b [u8],
    /// Replacement MPU region table
    pub mpu: &'b [u8],
    pub sig_checks: [&'b [u8]; 2],
    pub thread_hooks: [&'b [u8]; 2],
}

/// Patches in application order
#[derive(Debug, Clone, Default)]
pub struct PatchPlan<'b> {
    patches: Vec<Patch<'b>, MAX_PATCHES>,
}

impl<'b> PatchPlan<'b> {
    pub fn new() -> Self {
        Self { patches: Vec::new() }
    }

    pub fn push(&mut self, target: PatchTarget, blob: impl Into<PatchBlob<'b>>) -> FirmResult<()> {
        self.patches
            .push(Patch::new(target, blob))
            .map_err(|p| FirmError::Patch(p.target.name))
    }

    /// Full plan for a boot; `redirect` is `None` when booting without
    /// NAND redirection
    pub fn build(
        structural: &StructuralTargets,
        redirect: Option<&EmuRedirectConfig>,
        blobs: &PatchBlobs<'b>,
    ) -> FirmResult<Self> {
        let mut plan = Self::new();

        if let Some(redirect) = redirect {
            for (cell, value) in redirect.cell_writes() {
                plan.push(cell, PatchBlob::word(value))?;
            }
            plan.push(redirect.read_hook, blobs.nand_redirect)?;
            plan.push(redirect.write_hook, blobs.nand_redirect)?;
            plan.push(redirect.mpu_slot, blobs.mpu)?;
        }

        for (target, blob) in structural.sig_checks.iter().zip(blobs.sig_checks) {
            plan.push(*target, blob)?;
        }
        for (target, blob) in structural.thread_hooks.iter().zip(blobs.thread_hooks) {
            plan.push(*target, blob)?;
        }

        Ok(plan)
    }

    pub fn as_slice(&self) -> &[Patch<'b>] {
        &self.patches
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
