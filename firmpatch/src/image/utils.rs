//! Bounds-checked little-endian reads over byte slices

#[inline]
pub fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn write_u32(data: &mut [u8], offset: usize, value: u32) -> Option<()> {
    let bytes = data.get_mut(offset..offset.checked_add(4)?)?;
    bytes.copy_from_slice(&value.to_le_bytes());
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unaligned_read() {
        let data = [0xAA, 0x78, 0x56, 0x34, 0x12];
        assert_eq!(read_u32(&data, 1), Some(0x1234_5678));
        assert_eq!(read_u32(&data, 2), None);
        assert_eq!(read_u32(&data, usize::MAX), None);
    }
}
