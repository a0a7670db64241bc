use std::fmt;

use crate::Platform;

/// The CPU architecture a bundle was collected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arch(target_lexicon::Architecture);

impl Arch {
    pub fn new(family: target_lexicon::Architecture) -> Self {
        Self(family)
    }

    pub fn from_env() -> Self {
        Self(target_lexicon::HOST.architecture)
    }

    /// The architecture name as the platform's own tooling spells it.
    ///
    /// macOS calls 64-bit ARM `arm64` (as in `lipo` and `uname -m`) where Linux says `aarch64`.
    pub fn name_for(self, platform: Platform) -> String {
        match (self.0, platform) {
            (target_lexicon::Architecture::Aarch64(_), Platform::Macos) => "arm64".to_string(),
            (target_lexicon::Architecture::X86_64, Platform::Windows) => "x64".to_string(),
            (family, _) => family.to_string(),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
