//! ARM946E-S platform
//!
//! Physical memory is flat and identity mapped, so "physical address" is
//! just a pointer. Protection is the CP15 MPU:
//!
//! - c6, cN: region N base/size/enable
//! - c2: cacheable bits (opcode2 0 data, 1 instruction)
//! - c3: write buffer bits (data only)
//! - c5: extended access permissions (opcode2 2 data, 3 instruction)
//!
//! The MPU is programmed once per boot. A second call with the same table
//! is a no-op; the region registers are never restored.

use core::arch::asm;
use core::slice;

use spin::Once;

use crate::boot::{BootRun, Buffers, SectionTransform};
use crate::error::FirmError;
use crate::handoff::{MpuConfig, Platform};
use crate::patch::PatchBlobs;
use crate::storage::FileStorage;

static INSTALLED_MPU: Once<MpuConfig> = Once::new();

// CRm of the region register is part of the opcode
macro_rules! region_register {
    ($index:expr, $value:expr, $($n:literal => $crm:literal),+ $(,)?) => {
        match $index {
            $($n => asm!(
                concat!("mcr p15, 0, {0}, c6, ", $crm, ", 0"),
                in(reg) $value,
                options(nostack),
            ),)+
            _ => {}
        }
    };
}

/// Real hardware, entered in a privileged mode
#[derive(Debug, Default)]
pub struct Arm9Platform;

impl Arm9Platform {
    pub const fn new() -> Self {
        Self
    }

    /// Table installed by this boot, if any
    pub fn installed_mpu() -> Option<&'static MpuConfig> {
        INSTALLED_MPU.get()
    }
}

unsafe fn set_region(index: u8, value: u32) {
    region_register!(
        index,
        value,
        0 => "c0", 1 => "c1", 2 => "c2", 3 => "c3",
        4 => "c4", 5 => "c5", 6 => "c6", 7 => "c7",
    );
}

unsafe fn install(mpu: &MpuConfig) {
    // System mode, IRQ and FIQ masked
    asm!("msr cpsr_c, #0xDF", options(nomem, nostack));

    for region in &mpu.regions {
        set_region(region.index, region.encode());
    }

    let (mut dcache, mut icache, mut wbuf, mut dperm, mut iperm): (u32, u32, u32, u32, u32);
    asm!(
        "mrc p15, 0, {0}, c2, c0, 0",
        "mrc p15, 0, {1}, c2, c0, 1",
        "mrc p15, 0, {2}, c3, c0, 0",
        "mrc p15, 0, {3}, c5, c0, 2",
        "mrc p15, 0, {4}, c5, c0, 3",
        out(reg) dcache,
        out(reg) icache,
        out(reg) wbuf,
        out(reg) dperm,
        out(reg) iperm,
        options(nostack),
    );

    dcache = mpu.cacheable(dcache);
    icache = mpu.cacheable(icache);
    wbuf = mpu.write_buffer(wbuf);
    dperm = mpu.access(dperm);
    iperm = mpu.access(iperm);

    asm!(
        "mcr p15, 0, {0}, c2, c0, 0",
        "mcr p15, 0, {1}, c2, c0, 1",
        "mcr p15, 0, {2}, c3, c0, 0",
        "mcr p15, 0, {3}, c5, c0, 2",
        "mcr p15, 0, {4}, c5, c0, 3",
        in(reg) dcache,
        in(reg) icache,
        in(reg) wbuf,
        in(reg) dperm,
        in(reg) iperm,
        options(nostack),
    );
}

impl Platform for Arm9Platform {
    fn configure_memory_protection(&mut self, mpu: &MpuConfig) {
        INSTALLED_MPU.call_once(|| {
            unsafe { install(mpu) };
            *mpu
        });
    }

    unsafe fn copy_to_physical(&mut self, dest: u32, src: &[u8]) {
        core::ptr::copy_nonoverlapping(src.as_ptr(), dest as usize as *mut u8, src.len());
    }

    unsafe fn write_word(&mut self, address: u32, value: u32) {
        core::ptr::write_volatile(address as usize as *mut u32, value);
    }

    unsafe fn transfer_control(&mut self, entry: u32) -> ! {
        let entry: extern "C" fn() -> ! = core::mem::transmute(entry as usize);
        entry()
    }
}

/// Run a boot over the physical windows named by the run's config
///
/// Returns only on failure; `run.log()` says why.
///
/// # Safety
/// The image window and both payload windows must be unused RAM, and the
/// caller must be running from memory no section copy touches.
pub unsafe fn boot<S, T>(
    run: &mut BootRun<'_>,
    storage: &mut S,
    transform: &mut T,
    blobs: &PatchBlobs<'_>,
) -> FirmError
where
    S: FileStorage + ?Sized,
    T: SectionTransform + ?Sized,
{
    let config = run.config();
    let buffers = Buffers {
        image: slice::from_raw_parts_mut(config.load_base as usize as *mut u8, config.image_capacity),
        redirect: slice::from_raw_parts_mut(
            config.redirect_region.base as usize as *mut u8,
            config.redirect_region.size as usize,
        ),
        thread: slice::from_raw_parts_mut(
            config.thread_region.base as usize as *mut u8,
            config.thread_region.size as usize,
        ),
    };

    let mut platform = Arm9Platform::new();
    match run.run(storage, transform, buffers, blobs, &mut platform) {
        Ok(never) => match never {},
        Err(e) => e,
    }
}
