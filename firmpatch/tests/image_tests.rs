//! FIRM header and section table tests

mod common;

use common::{native_firm, put_u32, FirmBuilder, MemoryStorage};
use firmpatch::error::{FirmError, FormatIssue};
use firmpatch::image::{FirmwareImage, HEADER_SIZE};
use firmpatch::StorageError;

const BASE: u32 = 0x2400_0000;

fn three_sections() -> FirmBuilder {
    FirmBuilder::new()
        .arm11_entry(0x1FF8_0000)
        .arm9_entry(0x0800_0010)
        .section(0x1FF8_0000, 0x80, 1)
        .section(0x1FF0_0000, 0x40, 2)
        .section(0x0800_0000, 0x100, 3)
}

fn format_error(data: &mut [u8]) -> Option<FormatIssue> {
    match FirmwareImage::from_buffer(data, BASE) {
        Err(FirmError::Format(issue)) => Some(issue),
        _ => None,
    }
}

#[test]
fn test_three_section_layout() {
    let mut data = three_sections().build();
    let image = FirmwareImage::from_buffer(&mut data, BASE).unwrap();

    assert_eq!(image.sections().count(), 3);
    assert_eq!(image.header().arm11_entry, 0x1FF8_0000);

    let offsets: Vec<u32> = image.sections().iter().map(|s| s.offset).collect();
    assert_eq!(offsets, [0x200, 0x280, 0x2C0]);
    assert_eq!(image.section_bytes(2), Some(&[3u8; 0x100][..]));
    assert_eq!(image.section_bytes(3), None);
}

#[test]
fn test_translate_through_each_section() {
    let mut data = three_sections().build();
    let image = FirmwareImage::from_buffer(&mut data, BASE).unwrap();

    assert_eq!(image.translate(0x1FF8_0000, 4), Some(BASE + 0x200));
    assert_eq!(image.translate(0x1FF0_003C, 4), Some(BASE + 0x2BC));
    assert_eq!(image.translate(0x0800_0010, 8), Some(BASE + 0x2D0));
    assert_eq!(image.translate(0x0800_00FD, 4), None);
    assert_eq!(image.translate(0x1800_0000, 4), None);

    assert!(image.contains(BASE + 0x3BC, 4));
    assert!(!image.contains(BASE + 0x3BD, 4));
}

#[test]
fn test_gap_in_section_slots() {
    let mut data = three_sections().build();
    // Empty the middle slot
    put_u32(&mut data, 0x70 + 8, 0);
    assert_eq!(format_error(&mut data), Some(FormatIssue::SectionGap));
}

#[test]
fn test_no_sections() {
    let mut data = FirmBuilder::new().build();
    data.resize(HEADER_SIZE, 0);
    assert_eq!(format_error(&mut data), Some(FormatIssue::NoSections));
}

#[test]
fn test_section_inside_header() {
    let mut data = three_sections().build();
    put_u32(&mut data, 0x40, 0x1F0);
    assert_eq!(format_error(&mut data), Some(FormatIssue::SectionOverlapsHeader));
}

#[test]
fn test_section_past_end_of_file() {
    let mut data = three_sections().build();
    data.truncate(data.len() - 1);
    assert_eq!(format_error(&mut data), Some(FormatIssue::SectionOutOfBounds));
}

#[test]
fn test_overlapping_destinations() {
    let mut data = FirmBuilder::new()
        .section(0x0800_0000, 0x100, 0)
        .section(0x0800_00FF, 0x10, 0)
        .build();
    assert_eq!(format_error(&mut data), Some(FormatIssue::DestinationOverlap));
}

#[test]
fn test_destination_wraps() {
    let mut data = FirmBuilder::new().section(0xFFFF_FF00, 0x200, 0).build();
    assert_eq!(format_error(&mut data), Some(FormatIssue::DestinationWraps));
}

#[test]
fn test_short_file_and_bad_magic() {
    let mut short = vec![0u8; HEADER_SIZE - 1];
    short[..4].copy_from_slice(b"FIRM");
    assert_eq!(format_error(&mut short), Some(FormatIssue::TooSmall));

    let mut data = three_sections().build();
    data[..4].copy_from_slice(b"MRIF");
    assert_eq!(format_error(&mut data), Some(FormatIssue::BadMagic));
}

#[test]
fn test_load_borrows_exactly_the_file() {
    let firm = native_firm().build();
    let size = firm.len();
    let mut storage = MemoryStorage::new().with_file("/firm.bin", firm);
    let mut buffer = vec![0x5Au8; size + 0x1000];

    {
        let image = FirmwareImage::load(&mut storage, "/firm.bin", &mut buffer, BASE).unwrap();
        assert_eq!(image.len(), size);
        assert_eq!(image.load_base(), BASE);
    }
    assert_eq!(&buffer[..4], b"FIRM");
    assert!(buffer[size..].iter().all(|&b| b == 0x5A));
}

#[test]
fn test_load_errors() {
    let firm = native_firm().build();
    let size = firm.len();
    let mut storage = MemoryStorage::new().with_file("/firm.bin", firm);

    let mut small = vec![0u8; size - 1];
    assert_eq!(
        FirmwareImage::load(&mut storage, "/firm.bin", &mut small, BASE).err(),
        Some(FirmError::Io(StorageError::BufferTooSmall))
    );

    let mut buffer = vec![0u8; size];
    assert_eq!(
        FirmwareImage::load(&mut storage, "/nope.bin", &mut buffer, BASE).err(),
        Some(FirmError::Io(StorageError::FileNotFound))
    );

    storage.short_reads = true;
    assert_eq!(
        FirmwareImage::load(&mut storage, "/firm.bin", &mut buffer, BASE).err(),
        Some(FirmError::Io(StorageError::ShortRead))
    );
}
