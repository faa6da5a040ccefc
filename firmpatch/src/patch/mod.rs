//! Patch application
//!
//! A patch is a plain overwrite: `blob.len()` bytes copied to a resolved
//! address. The engine does not know what the bytes mean. What it does
//! guarantee is that the write lands inside one patchable region, and it
//! keeps a ledger of which named patches went in.
//!
//! Applying the same patch twice leaves the same bytes behind. A name is
//! bound to the address it first went in at. Sequences stop at the first
//! failure and report how far they got.

pub mod plan;

pub use plan::{PatchBlobs, PatchPlan};

use core::fmt;

use heapless::Vec;

use crate::error::{FirmError, FirmResult};
use crate::memory::PatchArena;

/// Ledger and plan capacity
pub const MAX_PATCHES: usize = 16;

/// Patches every boot needs before handoff
pub const STRUCTURAL_PATCHES: [&str; 4] =
    ["sig check 1", "sig check 2", "thread hook 1", "thread hook 2"];

/// Patches a NAND-redirected boot needs on top
pub const REDIRECT_PATCHES: [&str; 6] = [
    "SDMC cell",
    "NAND cell",
    "NCSD cell",
    "emu read hook",
    "emu write hook",
    "mpu slot",
];

/// One resolved location to overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchTarget {
    pub name: &'static str,
    pub address: u32,
    /// Bytes at `address` that must be inside the region
    pub expected_min_size: usize,
}

impl PatchTarget {
    pub const fn new(name: &'static str, address: u32, expected_min_size: usize) -> Self {
        Self {
            name,
            address,
            expected_min_size,
        }
    }
}

/// Replacement bytes
///
/// Caller blobs are borrowed for the copy only. `Word` carries a resolved
/// 32-bit value written little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchBlob<'b> {
    Bytes(&'b [u8]),
    Word([u8; 4]),
}

impl<'b> PatchBlob<'b> {
    pub fn word(value: u32) -> Self {
        PatchBlob::Word(value.to_le_bytes())
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            PatchBlob::Bytes(b) => b,
            PatchBlob::Word(w) => &w[..],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'b> From<&'b [u8]> for PatchBlob<'b> {
    fn from(bytes: &'b [u8]) -> Self {
        PatchBlob::Bytes(bytes)
    }
}

/// Target and blob, applied together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch<'b> {
    pub target: PatchTarget,
    pub blob: PatchBlob<'b>,
}

impl<'b> Patch<'b> {
    pub fn new(target: PatchTarget, blob: impl Into<PatchBlob<'b>>) -> Self {
        Self {
            target,
            blob: blob.into(),
        }
    }
}

/// Ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPatch {
    pub name: &'static str,
    pub address: u32,
    pub len: usize,
}

/// A sequence stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialApply {
    /// Patches applied before the failing one
    pub applied: usize,
    pub error: FirmError,
}

impl fmt::Display for PartialApply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} patches)", self.error, self.applied)
    }
}

/// Applies patches through an arena and remembers what went in
#[derive(Debug, Default)]
pub struct PatchEngine {
    applied: Vec<AppliedPatch, MAX_PATCHES>,
}

impl PatchEngine {
    pub fn new() -> Self {
        Self { applied: Vec::new() }
    }

    /// Copy `blob` to `target.address`
    ///
    /// The window `[address, address + max(len, expected_min_size))` must
    /// sit inside one region of `arena`. Nothing is written on error,
    /// including a reapply of a recorded name at another address.
    pub fn apply(
        &mut self,
        arena: &mut PatchArena<'_>,
        target: &PatchTarget,
        blob: PatchBlob<'_>,
    ) -> FirmResult<()> {
        let bytes = blob.bytes();
        if bytes.is_empty() {
            return Err(FirmError::Patch(target.name));
        }

        let recorded = self.applied.iter().position(|p| p.name == target.name);
        match recorded {
            Some(i) if self.applied[i].address != target.address => {
                return Err(FirmError::Patch(target.name));
            }
            None if self.applied.is_full() => return Err(FirmError::Patch(target.name)),
            _ => {}
        }

        let window = bytes.len().max(target.expected_min_size);
        let dest = arena
            .window_mut(target.address, window)
            .ok_or(FirmError::Patch(target.name))?;
        dest[..bytes.len()].copy_from_slice(bytes);

        match recorded {
            Some(i) => {
                let entry = &mut self.applied[i];
                entry.len = entry.len.max(bytes.len());
            }
            None => {
                // Capacity checked above
                let _ = self.applied.push(AppliedPatch {
                    name: target.name,
                    address: target.address,
                    len: bytes.len(),
                });
            }
        }
        Ok(())
    }

    /// Write a 32-bit little-endian value
    pub fn write_word(
        &mut self,
        arena: &mut PatchArena<'_>,
        target: &PatchTarget,
        value: u32,
    ) -> FirmResult<()> {
        self.apply(arena, target, PatchBlob::word(value))
    }

    /// Apply `patches` in order, stopping at the first failure
    pub fn apply_sequence(
        &mut self,
        arena: &mut PatchArena<'_>,
        patches: &[Patch<'_>],
    ) -> Result<usize, PartialApply> {
        for (applied, patch) in patches.iter().enumerate() {
            self.apply(arena, &patch.target, patch.blob)
                .map_err(|error| PartialApply { applied, error })?;
        }
        Ok(patches.len())
    }

    /// Patches applied so far, in first-application order
    pub fn applied(&self) -> &[AppliedPatch] {
        &self.applied
    }

    pub fn is_applied(&self, name: &str) -> bool {
        self.applied.iter().any(|p| p.name == name)
    }

    /// Error naming the first mandatory patch missing from the ledger
    pub fn check_mandatory(&self, redirect: bool) -> FirmResult<()> {
        let extra: &[&'static str] = if redirect { &REDIRECT_PATCHES } else { &[] };
        match extra
            .iter()
            .chain(STRUCTURAL_PATCHES.iter())
            .find(|name| !self.is_applied(name))
        {
            Some(name) => Err(FirmError::Patch(*name)),
            None => Ok(()),
        }
    }
}
