//! Signature scanning
//!
//! Exact byte-sequence search over a bounded prefix of a buffer. Only the
//! first match is ever used: each supported firmware version is known to
//! carry exactly one occurrence of every tag in the searched range.

use crate::error::{FirmError, FirmResult};

/// Named signature tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub name: &'static str,
    pub bytes: &'static [u8],
}

impl Signature {
    pub const fn new(name: &'static str, bytes: &'static [u8]) -> Self {
        Self { name, bytes }
    }
}

/// Offset of the first occurrence of `tag` inside `buffer[..max_len]`
///
/// A match must lie entirely within the first `max_len` bytes. An empty
/// tag never matches.
pub fn find(buffer: &[u8], tag: &[u8], max_len: usize) -> Option<usize> {
    if tag.is_empty() {
        return None;
    }

    let haystack = &buffer[..max_len.min(buffer.len())];
    haystack.windows(tag.len()).position(|window| window == tag)
}

/// Number of occurrences of `tag` inside `buffer[..max_len]`
///
/// Diagnostic only; overlapping matches are counted separately.
pub fn count(buffer: &[u8], tag: &[u8], max_len: usize) -> usize {
    if tag.is_empty() {
        return 0;
    }

    let haystack = &buffer[..max_len.min(buffer.len())];
    haystack.windows(tag.len()).filter(|window| *window == tag).count()
}

/// Find a signature in a region based at `base`, returning its address
pub fn find_address(
    buffer: &[u8],
    base: u32,
    signature: &Signature,
    max_len: usize,
) -> FirmResult<u32> {
    let offset = find(buffer, signature.bytes, max_len).ok_or(FirmError::NotFound(signature.name))?;
    base.checked_add(offset as u32)
        .ok_or(FirmError::Consistency(signature.name))
}
