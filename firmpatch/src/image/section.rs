//! FIRM section table parsing
//!
//! Four fixed slots of 0x30 bytes at 0x40. Unused slots have size 0 and
//! populated slots come first.

use heapless::Vec;

use super::header::HEADER_SIZE;
use super::utils::read_u32;
use crate::error::{FirmResult, FormatIssue};

/// Offset of the first section header
pub const SECTION_TABLE_OFFSET: usize = 0x40;

/// Size of one section header
pub const SECTION_HEADER_SIZE: usize = 0x30;

/// Section slots in the header
pub const MAX_SECTIONS: usize = 4;

/// Section header (48 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionDescriptor {
    pub offset: u32,      // Byte offset within the image
    pub address: u32,     // Destination physical address
    pub size: u32,        // Size in bytes
    pub copy_method: u32, // 0 = NDMA, 1 = XDMA, 2 = CPU memcpy
    pub hash: [u8; 32],   // SHA-256 of the section data
}

impl SectionDescriptor {
    fn parse(slot: &[u8]) -> Option<Self> {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(slot.get(0x10..0x30)?);

        Some(SectionDescriptor {
            offset: read_u32(slot, 0x00)?,
            address: read_u32(slot, 0x04)?,
            size: read_u32(slot, 0x08)?,
            copy_method: read_u32(slot, 0x0C)?,
            hash,
        })
    }

    /// Exclusive end of the section data within the image
    pub fn end_offset(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    /// Exclusive end of the destination range
    pub fn end_address(&self) -> u64 {
        self.address as u64 + self.size as u64
    }

    /// Does the destination range contain `[address, address + len)`?
    pub fn contains(&self, address: u32, len: usize) -> bool {
        let end = address as u64 + len as u64;
        address >= self.address && end <= self.end_address()
    }
}

/// Validated, populated section slots in order
#[derive(Debug, Clone)]
pub struct SectionTable {
    sections: Vec<SectionDescriptor, MAX_SECTIONS>,
}

impl SectionTable {
    /// Parse and validate the section table against the loaded image size
    pub fn parse(data: &[u8]) -> FirmResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(FormatIssue::TooSmall.into());
        }

        let mut sections = Vec::new();
        let mut saw_empty = false;

        for slot_index in 0..MAX_SECTIONS {
            let start = SECTION_TABLE_OFFSET + slot_index * SECTION_HEADER_SIZE;
            let slot = &data[start..start + SECTION_HEADER_SIZE];
            let section = SectionDescriptor::parse(slot).ok_or(FormatIssue::TooSmall)?;

            if section.size == 0 {
                saw_empty = true;
                continue;
            }
            if saw_empty {
                return Err(FormatIssue::SectionGap.into());
            }

            // Capacity equals slot count, push cannot fail
            let _ = sections.push(section);
        }

        let table = SectionTable { sections };
        table.validate(data.len())?;
        Ok(table)
    }

    fn validate(&self, image_size: usize) -> FirmResult<()> {
        if self.sections.is_empty() {
            return Err(FormatIssue::NoSections.into());
        }

        for (i, section) in self.sections.iter().enumerate() {
            if (section.offset as usize) < HEADER_SIZE {
                return Err(FormatIssue::SectionOverlapsHeader.into());
            }
            if section.end_offset() > image_size as u64 {
                return Err(FormatIssue::SectionOutOfBounds.into());
            }
            if section.end_address() > u32::MAX as u64 + 1 {
                return Err(FormatIssue::DestinationWraps.into());
            }

            for other in &self.sections[..i] {
                let disjoint = section.end_address() <= other.address as u64
                    || other.end_address() <= section.address as u64;
                if !disjoint {
                    return Err(FormatIssue::DestinationOverlap.into());
                }
            }
        }

        Ok(())
    }

    /// Get section by index
    pub fn get(&self, index: usize) -> Option<&SectionDescriptor> {
        self.sections.get(index)
    }

    /// Iterator over populated sections
    pub fn iter(&self) -> impl Iterator<Item = &SectionDescriptor> {
        self.sections.iter()
    }

    /// Number of populated sections
    pub fn count(&self) -> usize {
        self.sections.len()
    }

    /// Section whose destination range holds `[address, address + len)`
    pub fn find_containing(&self, address: u32, len: usize) -> Option<(usize, &SectionDescriptor)> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, s)| s.contains(address, len))
    }
}
