use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::Error;

/// The operating system family whose linker tooling is used to inspect and rewrite libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Macos,
    Linux,
    Windows,
}

impl Platform {
    /// Detect the platform of the current host.
    pub fn from_env() -> Result<Self, Error> {
        Self::try_from(target_lexicon::HOST.operating_system)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    /// The file extension used by shared libraries on this platform.
    pub fn library_extension(self) -> &'static str {
        match self {
            Self::Macos => "dylib",
            Self::Linux => "so",
            Self::Windows => "dll",
        }
    }

    /// Returns `true` if the file name looks like a shared library on this platform.
    ///
    /// On Linux, versioned names (`libz.so.1.3`) are libraries too.
    pub fn is_library_name(self, name: &str) -> bool {
        match self {
            Self::Macos => name.ends_with(".dylib") || name.ends_with(".so"),
            Self::Linux => name.ends_with(".so") || name.contains(".so."),
            Self::Windows => name.to_ascii_lowercase().ends_with(".dll"),
        }
    }
}

impl TryFrom<target_lexicon::OperatingSystem> for Platform {
    type Error = Error;

    fn try_from(os: target_lexicon::OperatingSystem) -> Result<Self, Self::Error> {
        match os {
            target_lexicon::OperatingSystem::Darwin(_) => Ok(Self::Macos),
            target_lexicon::OperatingSystem::Linux => Ok(Self::Linux),
            target_lexicon::OperatingSystem::Windows => Ok(Self::Windows),
            other => Err(Error::UnsupportedOs(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            "windows" | "win" => Ok(Self::Windows),
            _ => Err(Error::UnknownPlatform(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_platform() {
        assert_eq!("macos".parse::<Platform>().unwrap(), Platform::Macos);
        assert_eq!("Darwin".parse::<Platform>().unwrap(), Platform::Macos);
        assert_eq!("linux".parse::<Platform>().unwrap(), Platform::Linux);
        assert_eq!("windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert!("freebsd".parse::<Platform>().is_err());
    }

    #[test]
    fn library_names() {
        assert!(Platform::Macos.is_library_name("libvips.42.dylib"));
        assert!(!Platform::Macos.is_library_name("metadata.json"));
        assert!(Platform::Linux.is_library_name("libpng16.so.16.37.0"));
        assert!(Platform::Linux.is_library_name("libvips.so"));
        assert!(!Platform::Linux.is_library_name("libvips.a"));
        assert!(Platform::Windows.is_library_name("LIBVIPS-42.DLL"));
    }

    #[test]
    fn serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&Platform::Macos).unwrap(),
            r#""macos""#
        );
    }
}
