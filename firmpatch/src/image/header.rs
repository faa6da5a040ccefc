//! FIRM header parsing

use super::utils::read_u32;
use crate::error::{FirmResult, FormatIssue};

/// Fixed header size; section data may not start before this
pub const HEADER_SIZE: usize = 0x200;

/// FIRM header (the fields the loader uses)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmHeader {
    pub magic: [u8; 4],     // "FIRM"
    pub boot_priority: u32, // Ignored by the loader
    pub arm11_entry: u32,   // Written to the boot parameter cell at handoff
    pub arm9_entry: u32,    // Final jump target
}

impl FirmHeader {
    pub const MAGIC: [u8; 4] = *b"FIRM";

    /// Parse the header at offset 0
    pub fn parse(data: &[u8]) -> FirmResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(FormatIssue::TooSmall.into());
        }

        let magic = [data[0], data[1], data[2], data[3]];
        if magic != Self::MAGIC {
            return Err(FormatIssue::BadMagic.into());
        }

        // Length checked above, reads below cannot fail
        let field = |offset| read_u32(data, offset).ok_or(FormatIssue::TooSmall);

        Ok(FirmHeader {
            magic,
            boot_priority: field(0x04)?,
            arm11_entry: field(0x08)?,
            arm9_entry: field(0x0C)?,
        })
    }
}
