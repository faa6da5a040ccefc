//! Supported firmware layouts
//!
//! Every patch location is a fixed address tied to one firmware build.
//! Builds are recognized from header and ARM9 section fields; anything not
//! in the table is refused instead of being patched at guessed offsets.

use crate::error::{FirmError, FirmResult};
use crate::image::FirmwareImage;

/// Half-open address range `[base, base + size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub base: u32,
    pub size: u32,
}

impl Bounds {
    pub const fn new(base: u32, size: u32) -> Self {
        Self { base, size }
    }

    /// Exclusive end
    pub fn end(&self) -> u64 {
        self.base as u64 + self.size as u64
    }

    /// Does `[address, address + len)` fit inside?
    pub fn contains(&self, address: u32, len: usize) -> bool {
        address >= self.base && address as u64 + len as u64 <= self.end()
    }
}

/// Emulated NAND placement on the SD card, in 512-byte sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandLayout {
    /// First sector of the emulated NAND image
    pub offset: u32,
    /// Sector holding the NCSD header
    pub header: u32,
}

/// Minimum writable window at each kind of patch site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchWindows {
    pub sig_check: usize,
    pub thread_hook: usize,
    pub redirect_hook: usize,
    pub mpu_slot: usize,
}

/// Fields that identify a firmware build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareId {
    pub arm9_entry: u32,
    /// Index of the ARM9 section in the section table
    pub arm9_section: usize,
    pub arm9_address: u32,
    pub arm9_size: u32,
}

/// Per-build constants, all in firmware address space unless noted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConstants {
    /// Signature check instructions
    pub sig_checks: [u32; 2],
    /// Process9 thread creation hooks
    pub thread_hooks: [u32; 2],
    /// Physical load address of the ARM9 thread payload (outside the image)
    pub thread_code: u32,
    /// Physical load address of the NAND redirect code (outside the image)
    pub redirect_code: u32,
    /// Code that references the SD/MMC controller struct
    pub sdmmc_ref: u32,
    /// NAND read routine to hook
    pub emu_read_hook: u32,
    /// NAND write routine to hook
    pub emu_write_hook: u32,
    /// MPU region table the kernel installs at boot
    pub mpu_slot: u32,
    pub nand: NandLayout,
    /// Where the controller struct must land
    pub arm9_ram: Bounds,
    pub windows: PatchWindows,
}

/// One supported firmware build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownFirmware {
    pub name: &'static str,
    pub id: FirmwareId,
    pub constants: LayoutConstants,
}

impl KnownFirmware {
    /// Does the loaded image match this build?
    pub fn matches(&self, image: &FirmwareImage<'_>) -> bool {
        if image.header().arm9_entry != self.id.arm9_entry {
            return false;
        }

        match image.sections().get(self.id.arm9_section) {
            Some(s) => s.address == self.id.arm9_address && s.size == self.id.arm9_size,
            None => false,
        }
    }
}

/// O3DS NATIVE_FIRM as shipped in /rei/firmware_patched.bin
pub const NATIVE_FIRM_O3DS: KnownFirmware = KnownFirmware {
    name: "NATIVE_FIRM O3DS",
    id: FirmwareId {
        arm9_entry: 0x0801_B01C,
        arm9_section: 2,
        arm9_address: 0x0800_6800,
        arm9_size: 0x000A_3A00,
    },
    constants: LayoutConstants {
        sig_checks: [0x0806_3374, 0x0805_D1F4],
        thread_hooks: [0x0808_6140, 0x0808_60B0],
        thread_code: 0x080D_0000,
        redirect_code: 0x080C_0000,
        sdmmc_ref: 0x0807_8A1C,
        emu_read_hook: 0x0807_7C38,
        emu_write_hook: 0x0807_7C7C,
        mpu_slot: 0x0801_B3D4,
        nand: NandLayout {
            offset: 0,
            header: 0x001D_7800,
        },
        arm9_ram: Bounds::new(0x0800_0000, 0x0010_0000),
        windows: PatchWindows {
            sig_check: 4,
            thread_hook: 8,
            redirect_hook: 8,
            mpu_slot: 0x18,
        },
    },
};

/// Builds this loader knows how to patch
pub const SUPPORTED_FIRMWARE: &[KnownFirmware] = &[NATIVE_FIRM_O3DS];

/// Pick the table entry matching the loaded image
pub fn identify<'t>(
    image: &FirmwareImage<'_>,
    table: &'t [KnownFirmware],
) -> FirmResult<&'t KnownFirmware> {
    table
        .iter()
        .find(|known| known.matches(image))
        .ok_or(FirmError::UnsupportedVersion)
}
