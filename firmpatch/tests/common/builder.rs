//! FIRM image builder for tests

use firmpatch::image::HEADER_SIZE;

/// One section to place in the image
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub address: u32,
    pub data: Vec<u8>,
}

/// Builds FIRM images section by section
///
/// Sections are laid out back to back right after the header, in the order
/// they were added.
#[derive(Debug, Clone)]
pub struct FirmBuilder {
    arm11_entry: u32,
    arm9_entry: u32,
    sections: Vec<SectionSpec>,
}

impl FirmBuilder {
    pub fn new() -> Self {
        Self {
            arm11_entry: 0,
            arm9_entry: 0,
            sections: Vec::new(),
        }
    }

    pub fn arm11_entry(mut self, entry: u32) -> Self {
        self.arm11_entry = entry;
        self
    }

    pub fn arm9_entry(mut self, entry: u32) -> Self {
        self.arm9_entry = entry;
        self
    }

    /// Add a section of `size` bytes filled with `fill`
    pub fn section(mut self, address: u32, size: usize, fill: u8) -> Self {
        self.sections.push(SectionSpec {
            address,
            data: vec![fill; size],
        });
        self
    }

    /// File offset section `index` will get
    pub fn offset_of(&self, index: usize) -> usize {
        HEADER_SIZE
            + self.sections[..index]
                .iter()
                .map(|s| s.data.len())
                .sum::<usize>()
    }

    /// Mutable contents of a section before building
    pub fn section_data(&mut self, index: usize) -> &mut Vec<u8> {
        &mut self.sections[index].data
    }

    pub fn build(&self) -> Vec<u8> {
        let total = self.offset_of(self.sections.len());
        let mut data = vec![0u8; total];

        data[0..4].copy_from_slice(b"FIRM");
        put_u32(&mut data, 0x08, self.arm11_entry);
        put_u32(&mut data, 0x0C, self.arm9_entry);

        for (i, s) in self.sections.iter().enumerate() {
            let slot = 0x40 + i * 0x30;
            let offset = self.offset_of(i);
            put_u32(&mut data, slot, offset as u32);
            put_u32(&mut data, slot + 4, s.address);
            put_u32(&mut data, slot + 8, s.data.len() as u32);
            data[offset..offset + s.data.len()].copy_from_slice(&s.data);
        }

        data
    }
}

impl Default for FirmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn get_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// ARM11 sections of the test NATIVE_FIRM
pub const ARM11_CODE: u32 = 0x1FF8_0000;
pub const ARM11_DATA: u32 = 0x1FF0_0000;

/// Controller struct address planted in the test NATIVE_FIRM
pub const SDMMC_BASE: u32 = 0x0809_0000;
pub const SDMMC_ADDEND: u32 = 0x0000_5000;

/// Three-section image the O3DS NATIVE_FIRM table entry recognizes
///
/// ARM9 code is filled with 0x11 except for the two words the SD/MMC
/// resolver reads.
pub fn native_firm() -> FirmBuilder {
    let layout = &firmpatch::layout::NATIVE_FIRM_O3DS;
    let mut builder = FirmBuilder::new()
        .arm11_entry(ARM11_CODE)
        .arm9_entry(layout.id.arm9_entry)
        .section(ARM11_CODE, 0x100, 0xA1)
        .section(ARM11_DATA, 0x100, 0xA2)
        .section(layout.id.arm9_address, layout.id.arm9_size as usize, 0x11);

    let reference = (layout.constants.sdmmc_ref - layout.id.arm9_address) as usize;
    let arm9 = builder.section_data(2);
    put_u32(arm9, reference + 0x0A, SDMMC_BASE);
    put_u32(arm9, reference + 0x0E, SDMMC_ADDEND);
    builder
}

/// File offset of a firmware address inside `native_firm()`'s ARM9 section
pub fn native_offset(address: u32) -> usize {
    let layout = &firmpatch::layout::NATIVE_FIRM_O3DS;
    native_firm_arm9_offset() + (address - layout.id.arm9_address) as usize
}

fn native_firm_arm9_offset() -> usize {
    HEADER_SIZE + 0x200
}

/// Redirect code with the three tags at 0x20, 0x40 and 0x60
pub fn redirect_code() -> Vec<u8> {
    let mut code = vec![0xE1u8; 0x100];
    code[0x20..0x24].copy_from_slice(b"SDMC");
    code[0x40..0x44].copy_from_slice(b"NAND");
    code[0x60..0x64].copy_from_slice(b"NCSD");
    code
}
