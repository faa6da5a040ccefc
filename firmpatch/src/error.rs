//! Error types for the load → resolve → patch → handoff run
//!
//! Every variant is fatal for the boot attempt. Nothing here is retried:
//! the run either reaches handoff fully patched or aborts before it.

use core::fmt;

use crate::boot::BootStage;
use crate::storage::StorageError;

/// Result type for firmware operations
pub type FirmResult<T> = core::result::Result<T, FirmError>;

/// What was wrong with the header or section table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatIssue {
    /// File is smaller than the fixed header
    TooSmall,
    /// Magic is not "FIRM"
    BadMagic,
    /// No populated section slot
    NoSections,
    /// Populated slot after an empty one
    SectionGap,
    /// offset + size runs past the loaded image
    SectionOutOfBounds,
    /// Section data starts inside the header
    SectionOverlapsHeader,
    /// Two sections share destination addresses
    DestinationOverlap,
    /// Destination range wraps the 32-bit address space
    DestinationWraps,
}

impl fmt::Display for FormatIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall => write!(f, "image smaller than header"),
            Self::BadMagic => write!(f, "bad FIRM magic"),
            Self::NoSections => write!(f, "no sections"),
            Self::SectionGap => write!(f, "populated section after empty slot"),
            Self::SectionOutOfBounds => write!(f, "section past end of image"),
            Self::SectionOverlapsHeader => write!(f, "section overlaps header"),
            Self::DestinationOverlap => write!(f, "section destinations overlap"),
            Self::DestinationWraps => write!(f, "section destination wraps address space"),
        }
    }
}

/// Errors during a boot-patch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmError {
    /// Storage read failed or size mismatch
    Io(StorageError),
    /// Header or section table malformed
    Format(FormatIssue),
    /// Signature tag not present in the searched range
    NotFound(&'static str),
    /// Header does not match any known firmware layout
    UnsupportedVersion,
    /// Resolved address falls outside its expected bounds
    Consistency(&'static str),
    /// Patch window not inside a patchable region
    Patch(&'static str),
    /// Section transform (ARM9 loader stage) reported failure
    TransformFailed,
    /// Run state machine refused a transition
    InvalidTransition { from: BootStage, to: BootStage },
}

impl FirmError {
    /// Short human-readable description (no payload)
    pub fn description(&self) -> &'static str {
        match self {
            Self::Io(_) => "Storage read failed",
            Self::Format(_) => "Malformed firmware image",
            Self::NotFound(_) => "Signature not found",
            Self::UnsupportedVersion => "Unsupported firmware version",
            Self::Consistency(_) => "Resolved address out of bounds",
            Self::Patch(_) => "Patch precondition violated",
            Self::TransformFailed => "Section transform failed",
            Self::InvalidTransition { .. } => "Invalid boot stage transition",
        }
    }
}

impl fmt::Display for FirmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{}: {}", self.description(), e),
            Self::Format(issue) => write!(f, "{}: {}", self.description(), issue),
            Self::NotFound(tag) => write!(f, "{}: {}", self.description(), tag),
            Self::UnsupportedVersion => write!(f, "{}", self.description()),
            Self::Consistency(what) => write!(f, "{}: {}", self.description(), what),
            Self::Patch(name) => write!(f, "{}: {}", self.description(), name),
            Self::TransformFailed => write!(f, "{}", self.description()),
            Self::InvalidTransition { from, to } => {
                write!(f, "{}: {:?} -> {:?}", self.description(), from, to)
            }
        }
    }
}

impl From<StorageError> for FirmError {
    fn from(e: StorageError) -> Self {
        FirmError::Io(e)
    }
}

impl From<FormatIssue> for FirmError {
    fn from(issue: FormatIssue) -> Self {
        FirmError::Format(issue)
    }
}
