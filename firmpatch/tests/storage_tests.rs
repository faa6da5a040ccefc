//! Extent storage over an in-memory block device

mod common;

use common::{native_firm, redirect_code, MemoryBlockDevice};
use firmpatch::image::FirmwareImage;
use firmpatch::storage::{read_whole, ExtentStorage, FileExtent, FileStorage};
use firmpatch::StorageError;

const FIRM_LBA: u64 = 16;
const REDIRECT_LBA: u64 = 8;

fn card(firm: &[u8], redirect: &[u8]) -> MemoryBlockDevice {
    let blocks = FIRM_LBA as usize + firm.len().div_ceil(512) + 1;
    let mut device = MemoryBlockDevice::zeroed(blocks);
    device.write_at(FIRM_LBA, firm);
    device.write_at(REDIRECT_LBA, redirect);
    device
}

#[test]
fn test_load_firm_from_extent() {
    let firm = native_firm().build();
    let redirect = redirect_code();
    let files = [
        FileExtent::new("/rei/firmware_patched.bin", FIRM_LBA, firm.len() as u32),
        FileExtent::new("/rei/emunand/emunand.bin", REDIRECT_LBA, redirect.len() as u32),
    ];
    let mut storage = ExtentStorage::new(card(&firm, &redirect), &files);
    assert_eq!(storage.name(), "extent");

    let mut buffer = vec![0u8; 0x10_0000];
    let image =
        FirmwareImage::load(&mut storage, "/rei/firmware_patched.bin", &mut buffer, 0x2400_0000)
            .unwrap();
    assert_eq!(image.len(), firm.len());
    assert_eq!(image.bytes(), &firm[..]);
    assert_eq!(image.sections().count(), 3);
}

#[test]
fn test_read_whole_checks_capacity() {
    let redirect = redirect_code();
    let files = [FileExtent::new("/code.bin", REDIRECT_LBA, redirect.len() as u32)];
    let mut storage = ExtentStorage::new(card(&[], &redirect), &files);

    let mut small = [0u8; 0x80];
    assert_eq!(
        read_whole(&mut storage, &mut small, "/code.bin"),
        Err(StorageError::BufferTooSmall)
    );

    let mut exact = [0u8; 0x100];
    assert_eq!(read_whole(&mut storage, &mut exact, "/code.bin"), Ok(0x100));
    assert_eq!(&exact[0x40..0x44], b"NAND");
}

#[test]
fn test_extent_past_device_end() {
    let files = [FileExtent::new("/big.bin", 30, 4096)];
    let mut storage = ExtentStorage::new(MemoryBlockDevice::zeroed(32), &files);
    let mut buffer = [0u8; 4096];
    assert_eq!(
        read_whole(&mut storage, &mut buffer, "/big.bin"),
        Err(StorageError::DeviceError)
    );
}

#[test]
fn test_oversized_block_rejected() {
    let files = [FileExtent::new("/x.bin", 0, 16)];
    let mut device = MemoryBlockDevice::zeroed(4);
    device.block_size = 8192;
    device.data.resize(4 * 8192, 0);
    let mut storage = ExtentStorage::new(device, &files);
    let mut buffer = [0u8; 16];
    assert_eq!(
        storage.read_file(&mut buffer, "/x.bin", 16),
        Err(StorageError::UnsupportedBlockSize)
    );
}
