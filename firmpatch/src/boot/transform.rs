//! In-place section rewriting between load and resolution
//!
//! Some builds ship the ARM9 binary wrapped (the arm9loader stage on newer
//! consoles). A transform unwraps it in place so the resolver sees the
//! plain code. The section length cannot change.

use crate::error::FirmResult;

pub trait SectionTransform {
    /// Rewrite section `index` in place
    fn transform(&mut self, index: usize, section: &mut [u8]) -> FirmResult<()>;
}

/// Leaves the section as loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransform;

impl SectionTransform for NoTransform {
    fn transform(&mut self, _index: usize, _section: &mut [u8]) -> FirmResult<()> {
        Ok(())
    }
}

impl<F> SectionTransform for F
where
    F: FnMut(usize, &mut [u8]) -> FirmResult<()>,
{
    fn transform(&mut self, index: usize, section: &mut [u8]) -> FirmResult<()> {
        self(index, section)
    }
}
