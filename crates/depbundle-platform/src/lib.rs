//! Host detection for the operating system family and CPU architecture.

use thiserror::Error;

pub use crate::arch::Arch;
pub use crate::os::Platform;

mod arch;
mod os;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),
    #[error("Unknown platform: {0} (expected one of `macos`, `linux`, `windows`)")]
    UnknownPlatform(String),
}
