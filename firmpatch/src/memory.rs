//! Patchable memory regions
//!
//! Patches name their targets by address, but every write goes through this
//! arena: the address is resolved to (region, offset) and the whole window
//! is bounds-checked before a single byte moves. Nothing outside the handoff
//! platform dereferences a raw address.

use heapless::Vec;

use crate::error::{FirmError, FirmResult};
use crate::layout::Bounds;

/// Regions a run can write to
pub const MAX_REGIONS: usize = 4;

/// What a region holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// The loaded FIRM image
    Image,
    /// NAND redirect code (emunand.bin)
    RedirectCode,
    /// ARM9 thread payload (arm9.bin)
    ThreadCode,
}

impl RegionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::RedirectCode => "redirect code",
            Self::ThreadCode => "thread code",
        }
    }
}

/// A buffer standing in for memory at `base`
pub struct Region<'a> {
    pub kind: RegionKind,
    pub base: u32,
    pub data: &'a mut [u8],
}

impl<'a> Region<'a> {
    pub fn new(kind: RegionKind, base: u32, data: &'a mut [u8]) -> Self {
        Self { kind, base, data }
    }

    /// Address range covered; the buffer must be addressable in 32 bits
    pub fn bounds(&self) -> FirmResult<Bounds> {
        Ok(Bounds::new(self.base, region_size(self.kind, self.data.len())?))
    }

    /// Offset of `[address, address + len)` inside this region
    pub fn offset_of(&self, address: u32, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        let end = offset.checked_add(len)?;
        (end <= self.data.len()).then_some(offset)
    }

    /// Shorter-lived handle onto the same buffer
    pub fn reborrow(&mut self) -> Region<'_> {
        Region {
            kind: self.kind,
            base: self.base,
            data: &mut *self.data,
        }
    }
}

/// Set of non-overlapping regions addressed by absolute address
pub struct PatchArena<'a> {
    regions: Vec<Region<'a>, MAX_REGIONS>,
}

impl<'a> PatchArena<'a> {
    pub fn new() -> Self {
        Self { regions: Vec::new() }
    }

    /// Add a region; it may not overlap one already present
    pub fn add(&mut self, region: Region<'a>) -> FirmResult<()> {
        let new = region.bounds()?;
        if new.end() > u32::MAX as u64 + 1 {
            return Err(FirmError::Consistency(region.kind.name()));
        }

        for existing in &self.regions {
            let old = existing.bounds()?;
            let disjoint = new.end() <= old.base as u64 || old.end() <= new.base as u64;
            if !disjoint {
                return Err(FirmError::Consistency(region.kind.name()));
            }
        }

        self.regions
            .push(region)
            .map_err(|r| FirmError::Consistency(r.kind.name()))
    }

    /// Builder form of [`add`](Self::add)
    pub fn with(mut self, region: Region<'a>) -> FirmResult<Self> {
        self.add(region)?;
        Ok(self)
    }

    /// Region index and offset of a window, if one region holds all of it
    pub fn locate(&self, address: u32, len: usize) -> Option<(usize, usize)> {
        self.regions
            .iter()
            .enumerate()
            .find_map(|(i, r)| r.offset_of(address, len).map(|offset| (i, offset)))
    }

    /// Which kind of region holds the window
    pub fn kind_at(&self, address: u32, len: usize) -> Option<RegionKind> {
        self.locate(address, len).map(|(i, _)| self.regions[i].kind)
    }

    pub fn contains(&self, address: u32, len: usize) -> bool {
        self.locate(address, len).is_some()
    }

    pub fn read(&self, address: u32, len: usize) -> Option<&[u8]> {
        let (i, offset) = self.locate(address, len)?;
        Some(&self.regions[i].data[offset..offset + len])
    }

    pub fn window_mut(&mut self, address: u32, len: usize) -> Option<&mut [u8]> {
        let (i, offset) = self.locate(address, len)?;
        Some(&mut self.regions[i].data[offset..offset + len])
    }
}

fn region_size(kind: RegionKind, len: usize) -> FirmResult<u32> {
    u32::try_from(len).map_err(|_| FirmError::Consistency(kind.name()))
}

impl Default for PatchArena<'_> {
    fn default() -> Self {
        Self::new()
    }
}
