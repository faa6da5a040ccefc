//! Boot run configuration.
//!
//! File locations, load addresses and the MPU table used for one run.

use crate::handoff::{MpuConfig, BOOT_PARAM_ARM11_ENTRY};
use crate::layout::Bounds;

/// Patched NATIVE_FIRM on the SD card.
pub const DEFAULT_FIRM_PATH: &str = "/rei/firmware_patched.bin";

/// NAND redirect code.
pub const DEFAULT_REDIRECT_PATH: &str = "/rei/emunand/emunand.bin";

/// ARM9 thread payload.
pub const DEFAULT_THREAD_PATH: &str = "/rei/thread/arm9.bin";

/// FCRAM address the FIRM image is read to.
pub const DEFAULT_LOAD_BASE: u32 = 0x2400_0000;

/// Boot run configuration.
#[derive(Debug, Clone)]
pub struct BootConfig<'p> {
    /// FIRM image path.
    pub firm_path: &'p str,
    /// Redirect code path.
    pub redirect_path: &'p str,
    /// Thread payload path.
    pub thread_path: &'p str,
    /// Address of image byte 0.
    pub load_base: u32,
    /// Largest image accepted.
    pub image_capacity: usize,
    /// Memory the redirect code is loaded into.
    pub redirect_region: Bounds,
    /// Memory the thread payload is loaded into.
    pub thread_region: Bounds,
    /// Apply the NAND redirect patches.
    /// If false, only signature checks and thread hooks are patched.
    pub redirect_nand: bool,
    /// Where the ARM11 entry is published.
    pub boot_param_cell: u32,
    /// Protection installed before relocation.
    pub mpu: MpuConfig,
}

impl Default for BootConfig<'_> {
    fn default() -> Self {
        Self {
            firm_path: DEFAULT_FIRM_PATH,
            redirect_path: DEFAULT_REDIRECT_PATH,
            thread_path: DEFAULT_THREAD_PATH,
            load_base: DEFAULT_LOAD_BASE,
            image_capacity: 0x0040_0000, // 4 MiB
            redirect_region: Bounds::new(0x080C_0000, 0x0001_0000),
            thread_region: Bounds::new(0x080D_0000, 0x0001_0000),
            redirect_nand: true,
            boot_param_cell: BOOT_PARAM_ARM11_ENTRY,
            mpu: MpuConfig::default(),
        }
    }
}

impl<'p> BootConfig<'p> {
    /// Create config booting straight from NAND (no redirect patches).
    pub fn sysnand() -> Self {
        Self {
            redirect_nand: false,
            ..Default::default()
        }
    }

    /// Set FIRM image path.
    pub fn firm(mut self, path: &'p str) -> Self {
        self.firm_path = path;
        self
    }

    /// Set redirect code path.
    pub fn redirect(mut self, path: &'p str) -> Self {
        self.redirect_path = path;
        self
    }

    /// Set thread payload path.
    pub fn thread(mut self, path: &'p str) -> Self {
        self.thread_path = path;
        self
    }

    /// Set image load address.
    pub fn load_base(mut self, base: u32) -> Self {
        self.load_base = base;
        self
    }

    /// Set redirect code memory.
    pub fn redirect_region(mut self, region: Bounds) -> Self {
        self.redirect_region = region;
        self
    }

    /// Set thread payload memory.
    pub fn thread_region(mut self, region: Bounds) -> Self {
        self.thread_region = region;
        self
    }

    /// Set boot parameter cell.
    pub fn boot_param_cell(mut self, address: u32) -> Self {
        self.boot_param_cell = address;
        self
    }

    /// Set MPU table.
    pub fn mpu(mut self, mpu: MpuConfig) -> Self {
        self.mpu = mpu;
        self
    }
}
