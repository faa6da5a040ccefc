//! FIRM image model
//!
//! The image lives in a caller-reserved buffer (FCRAM on hardware). It is
//! parsed once after the read and never restructured afterwards; patches
//! only change section contents.
//!
//! Two address spaces meet here:
//! - *firmware addresses*: where a section runs after handoff
//!   (`section.address ..`), which is what the per-version constants use
//! - *load addresses*: where the same bytes sit right now
//!   (`load_base + section.offset ..`), which is what patches write to
//!
//! `translate` maps the first onto the second through the section table.

pub mod header;
pub mod section;
pub mod utils;

pub use header::{FirmHeader, HEADER_SIZE};
pub use section::{SectionDescriptor, SectionTable, MAX_SECTIONS};

use crate::error::{FirmResult, FormatIssue};
use crate::storage::{self, FileStorage};

/// A loaded and parsed FIRM image
pub struct FirmwareImage<'a> {
    data: &'a mut [u8],
    load_base: u32,
    header: FirmHeader,
    sections: SectionTable,
}

impl<'a> FirmwareImage<'a> {
    /// Read `path` into `buffer` and parse it
    ///
    /// The image borrows exactly the bytes that were read; the rest of the
    /// buffer stays untouched.
    pub fn load<S: FileStorage + ?Sized>(
        storage: &mut S,
        path: &str,
        buffer: &'a mut [u8],
        load_base: u32,
    ) -> FirmResult<Self> {
        let size = storage::read_whole(storage, buffer, path)?;
        Self::from_buffer(&mut buffer[..size], load_base)
    }

    /// Parse an image already present in memory
    pub fn from_buffer(data: &'a mut [u8], load_base: u32) -> FirmResult<Self> {
        if load_base as u64 + data.len() as u64 > u32::MAX as u64 + 1 {
            return Err(FormatIssue::DestinationWraps.into());
        }

        let header = FirmHeader::parse(data)?;
        let sections = SectionTable::parse(data)?;

        Ok(FirmwareImage {
            data,
            load_base,
            header,
            sections,
        })
    }

    pub fn header(&self) -> &FirmHeader {
        &self.header
    }

    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    /// Address of image byte 0
    pub fn load_base(&self) -> u32 {
        self.load_base
    }

    /// Loaded size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &*self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    /// Raw contents of section `index`
    pub fn section_bytes(&self, index: usize) -> Option<&[u8]> {
        let s = self.sections.get(index)?;
        self.data.get(s.offset as usize..s.end_offset() as usize)
    }

    /// Mutable contents of section `index`
    pub fn section_bytes_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let s = *self.sections.get(index)?;
        self.data.get_mut(s.offset as usize..s.end_offset() as usize)
    }

    /// Map a firmware address to its current load address
    ///
    /// The whole window `[address, address + len)` must sit inside one
    /// section; a zero-length window is treated as one byte.
    pub fn translate(&self, address: u32, len: usize) -> Option<u32> {
        let (_, section) = self.sections.find_containing(address, len.max(1))?;
        let image_offset = section.offset.checked_add(address - section.address)?;
        self.load_base.checked_add(image_offset)
    }

    /// Offset into the image of a load address window, if fully inside
    pub fn image_offset(&self, load_address: u32, len: usize) -> Option<usize> {
        let offset = load_address.checked_sub(self.load_base)? as usize;
        let end = offset.checked_add(len)?;
        (end <= self.data.len()).then_some(offset)
    }

    /// Does the load address window fall inside the image?
    pub fn contains(&self, load_address: u32, len: usize) -> bool {
        self.image_offset(load_address, len).is_some()
    }
}
