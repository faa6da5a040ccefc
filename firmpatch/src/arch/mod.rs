// Target platforms

#[cfg(target_arch = "arm")]
pub mod arm9;
