//! Run log and summaries
//!
//! Messages are collected in memory and shown by whoever owns the screen
//! (the loader has no console of its own before handoff).

extern crate alloc;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::patch::AppliedPatch;
use crate::resolve::{EmuRedirectConfig, StructuralTargets};

/// Messages kept by default before the oldest are dropped
pub const DEFAULT_LOG_CAPACITY: usize = 64;

/// Feedback message with severity level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub level: FeedbackLevel,
    pub category: FeedbackCategory,
    pub message: String,
}

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackLevel {
    Info,    // Normal progress
    Success, // Stage completed
    Warning, // Suspicious but not fatal
    Error,   // Run aborted
    Debug,   // Resolved addresses and such
}

/// Message category for filtering/display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCategory {
    Image,   // Header and section table
    Scan,    // Signature search
    Resolve, // Target resolution
    Patch,   // Patch application
    Storage, // File reads
    Handoff, // MPU, relocation, jump
    General,
}

impl FeedbackMessage {
    fn new(level: FeedbackLevel, category: FeedbackCategory, message: impl Into<String>) -> Self {
        Self {
            level,
            category,
            message: message.into(),
        }
    }

    pub fn info(category: FeedbackCategory, message: impl Into<String>) -> Self {
        Self::new(FeedbackLevel::Info, category, message)
    }

    pub fn success(category: FeedbackCategory, message: impl Into<String>) -> Self {
        Self::new(FeedbackLevel::Success, category, message)
    }

    pub fn warning(category: FeedbackCategory, message: impl Into<String>) -> Self {
        Self::new(FeedbackLevel::Warning, category, message)
    }

    pub fn error(category: FeedbackCategory, message: impl Into<String>) -> Self {
        Self::new(FeedbackLevel::Error, category, message)
    }

    pub fn debug(category: FeedbackCategory, message: impl Into<String>) -> Self {
        Self::new(FeedbackLevel::Debug, category, message)
    }

    /// Format for display with prefix
    pub fn format_line(&self) -> String {
        let prefix = match self.level {
            FeedbackLevel::Info => "[INFO]",
            FeedbackLevel::Success => "[OK]",
            FeedbackLevel::Warning => "[WARN]",
            FeedbackLevel::Error => "[ERR]",
            FeedbackLevel::Debug => "[DBG]",
        };
        format!("{} {}", prefix, self.message)
    }
}

/// Bounded message log for one run
#[derive(Debug, Clone)]
pub struct BootLog {
    messages: Vec<FeedbackMessage>,
    max_messages: usize,
}

impl BootLog {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::with_capacity(max_messages),
            max_messages: max_messages.max(1),
        }
    }

    /// Add a message, dropping the oldest when full
    pub fn add(&mut self, msg: FeedbackMessage) {
        if self.messages.len() >= self.max_messages {
            self.messages.remove(0);
        }
        self.messages.push(msg);
    }

    pub fn info(&mut self, category: FeedbackCategory, message: impl Into<String>) {
        self.add(FeedbackMessage::info(category, message));
    }

    pub fn success(&mut self, category: FeedbackCategory, message: impl Into<String>) {
        self.add(FeedbackMessage::success(category, message));
    }

    pub fn warning(&mut self, category: FeedbackCategory, message: impl Into<String>) {
        self.add(FeedbackMessage::warning(category, message));
    }

    pub fn error(&mut self, category: FeedbackCategory, message: impl Into<String>) {
        self.add(FeedbackMessage::error(category, message));
    }

    pub fn debug(&mut self, category: FeedbackCategory, message: impl Into<String>) {
        self.add(FeedbackMessage::debug(category, message));
    }

    pub fn messages(&self) -> &[FeedbackMessage] {
        &self.messages
    }

    pub fn messages_by_level(&self, level: FeedbackLevel) -> Vec<&FeedbackMessage> {
        self.messages.iter().filter(|m| m.level == level).collect()
    }

    pub fn messages_by_category(&self, category: FeedbackCategory) -> Vec<&FeedbackMessage> {
        self.messages.iter().filter(|m| m.category == category).collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.level == FeedbackLevel::Error)
    }
}

impl Default for BootLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Resolved layout of a run, for display
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub firmware: &'static str,
    pub load_base: u32,
    pub sections: usize,
    pub arm9_entry: u32,
    pub arm11_entry: u32,
    pub structural: StructuralTargets,
    pub redirect: Option<EmuRedirectConfig>,
    pub applied: Vec<AppliedPatch>,
}

impl RunSummary {
    /// Format as lines for display
    pub fn format_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        lines.push(format!("Firmware: {}", self.firmware));
        lines.push(format!("Loaded at: 0x{:08X}", self.load_base));
        lines.push(format!("Sections: {}", self.sections));
        lines.push(format!("ARM9 entry: 0x{:08X}", self.arm9_entry));
        lines.push(format!("ARM11 entry: 0x{:08X}", self.arm11_entry));

        for t in self.structural.sig_checks.iter().chain(&self.structural.thread_hooks) {
            lines.push(format!("{} @ 0x{:08X}", t.name, t.address));
        }
        lines.push(format!("thread code @ 0x{:08X}", self.structural.thread_code));

        match &self.redirect {
            Some(r) => {
                lines.push(format!("sdmmc struct: 0x{:08X}", r.sdmmc));
                lines.push(format!(
                    "emunand: offset 0x{:X}, header 0x{:X}",
                    r.nand.offset, r.nand.header
                ));
                for t in [&r.read_hook, &r.write_hook, &r.mpu_slot] {
                    lines.push(format!("{} @ 0x{:08X}", t.name, t.address));
                }
            }
            None => lines.push("NAND redirect: disabled".into()),
        }

        lines.push(format!("Patches applied: {}", self.applied.len()));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_message_dropped_when_full() {
        let mut log = BootLog::new(2);
        log.info(FeedbackCategory::Image, "one");
        log.warning(FeedbackCategory::Scan, "two");
        log.error(FeedbackCategory::Patch, "three");

        let lines: Vec<String> = log.messages().iter().map(|m| m.format_line()).collect();
        assert_eq!(lines, ["[WARN] two", "[ERR] three"]);
        assert!(log.has_errors());
        assert_eq!(log.messages_by_category(FeedbackCategory::Scan).len(), 1);
    }

    #[test]
    fn clear_resets_errors() {
        let mut log = BootLog::default();
        log.error(FeedbackCategory::General, "x");
        log.clear();
        assert!(!log.has_errors());
        assert!(log.messages_by_level(FeedbackLevel::Error).is_empty());
    }
}
