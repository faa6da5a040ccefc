//! FIRM boot loader and patcher
//!
//! Loads a FIRM image from storage, patches it for the running console and
//! hands control to its ARM9 entry point.
//!
//! # Run
//!
//! ```text
//! Unloaded -> Loaded -> Resolved -> Patched -> Relocated -> HandedOff
//! ```
//!
//! - load: image into FCRAM, redirect code and thread payload into ARM9 RAM
//! - resolve: per-build constants and signature tags into load addresses
//! - patch: one ordered plan, every write bounds-checked against the arena
//! - handoff: MPU setup, section copies, ARM11 entry publish, jump
//!
//! Any error before relocation aborts the run and leaves the machine as it
//! was; the run log says what failed.
//!
//! # Platform split
//!
//! Everything except `arch` is plain byte manipulation and is tested on the
//! host. Physical memory and CP15 access live behind the `Platform` trait,
//! with the real implementation in `arch::arm9`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod error;    // Crate-wide error type
pub mod storage;  // File reads
pub mod image;    // FIRM header and section table
pub mod scan;     // Signature search
pub mod layout;   // Supported builds and their constants
pub mod memory;   // Patchable regions
pub mod resolve;  // Constants to load addresses
pub mod patch;    // Patch engine and plan
pub mod handoff;  // MPU, relocation, jump
pub mod boot;     // Run orchestration and stages
pub mod config;   // Run configuration
pub mod feedback; // Run log
pub mod arch;     // Target platforms

pub use boot::{BootRun, BootStage, Buffers, NoTransform, PreparedBoot, SectionTransform, StageTracker};
pub use config::BootConfig;
pub use error::{FirmError, FirmResult, FormatIssue};
pub use handoff::{HandoffPlan, MpuConfig, Platform};
pub use image::FirmwareImage;
pub use layout::{KnownFirmware, SUPPORTED_FIRMWARE};
pub use patch::{PatchBlob, PatchBlobs, PatchEngine, PatchPlan, PatchTarget};
pub use storage::{FileStorage, StorageError};
