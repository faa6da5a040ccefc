//! ARM9 memory protection unit settings applied before handoff
//!
//! The CP15 region register layout is `base | (size_field << 1) | enable`
//! where a region covers `2^(size_field + 1)` bytes and `base` is aligned
//! to the region size. Cacheability, write buffering and access
//! permissions live in separate per-region bit fields.

/// CP15 access permission values for one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AccessPermission {
    NoAccess = 0,
    PrivilegedOnly = 1,
    UserReadOnly = 2,
    ReadWrite = 3,
    PrivilegedReadOnly = 5,
    ReadOnly = 6,
}

/// One protection region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpuRegion {
    /// Region number 0-7
    pub index: u8,
    pub base: u32,
    /// log2 of the region size in bytes (12..=32)
    pub size_log2: u8,
}

impl MpuRegion {
    pub const fn new(index: u8, base: u32, size_log2: u8) -> Self {
        Self {
            index,
            base,
            size_log2,
        }
    }

    /// Region size in bytes
    pub fn size(&self) -> u64 {
        1u64 << self.size_log2
    }

    /// Index in range, size representable, base aligned to size
    pub fn is_valid(&self) -> bool {
        if self.index > 7 || !(12..=32).contains(&self.size_log2) {
            return false;
        }
        (self.base as u64) % self.size() == 0
    }

    /// Value for the CP15 c6 region register (enabled)
    pub fn encode(&self) -> u32 {
        self.base | ((self.size_log2 as u32 - 1) << 1) | 1
    }
}

/// Everything the platform installs before the section copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpuConfig {
    pub regions: [MpuRegion; 2],
    /// OR-ed into both data and instruction cacheable bits
    pub cacheable_mask: u32,
    /// OR-ed into the data write buffer bits
    pub write_buffer_mask: u32,
    /// Region whose access permission nibble is replaced
    pub permission_region: u8,
    pub permission: AccessPermission,
}

impl MpuConfig {
    pub fn is_valid(&self) -> bool {
        self.regions.iter().all(MpuRegion::is_valid) && self.permission_region <= 7
    }

    /// Cacheable register value after applying the mask
    pub fn cacheable(&self, current: u32) -> u32 {
        current | self.cacheable_mask
    }

    /// Write buffer register value after applying the mask
    pub fn write_buffer(&self, current: u32) -> u32 {
        current | self.write_buffer_mask
    }

    /// Access permission register value with the region nibble replaced
    pub fn access(&self, current: u32) -> u32 {
        let shift = self.permission_region as u32 * 4;
        (current & !(0xF << shift)) | ((self.permission as u32) << shift)
    }
}

impl Default for MpuConfig {
    /// IO and VRAM windows opened for the redirect code: regions 3 and 4,
    /// 128 MiB each, cacheable and buffered, region 4 read/write
    fn default() -> Self {
        Self {
            regions: [
                MpuRegion::new(3, 0x1000_0000, 27),
                MpuRegion::new(4, 0x1800_0000, 27),
            ],
            cacheable_mask: 0x30,
            write_buffer_mask: 0x30,
            permission_region: 4,
            permission: AccessPermission::ReadWrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_regions_encode() {
        let mpu = MpuConfig::default();
        assert_eq!(mpu.regions[0].encode(), 0x1000_0035);
        assert_eq!(mpu.regions[1].encode(), 0x1800_0035);
        assert!(mpu.is_valid());
    }

    #[test]
    fn permission_nibble_replaced() {
        let mpu = MpuConfig::default();
        assert_eq!(mpu.access(0x0066_6666), 0x0063_6666);
        assert_eq!(mpu.access(0), 0x0003_0000);
        assert_eq!(mpu.cacheable(0x42), 0x72);
    }

    #[test]
    fn misaligned_region_invalid() {
        assert!(!MpuRegion::new(3, 0x1000_1000, 27).is_valid());
        assert!(!MpuRegion::new(8, 0x1000_0000, 27).is_valid());
        assert!(!MpuRegion::new(0, 0, 11).is_valid());
        assert!(MpuRegion::new(0, 0, 32).is_valid());
    }
}
