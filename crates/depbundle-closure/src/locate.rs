//! Finding the root library on the current system.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use fs_err as fs;
use tracing::{debug, trace};

use depbundle_platform::{Arch, Platform};
use depbundle_process::{ProcessRunner, Tool};
use depbundle_static::EnvVars;

use crate::Error;

/// The library the closure is built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryRequest {
    /// A file on disk, e.g., `/opt/homebrew/lib/libvips.42.dylib`.
    Path(PathBuf),
    /// A library name to search for, e.g., `vips` or `libvips`.
    Name(String),
}

impl LibraryRequest {
    /// Interpret a command-line argument as a path if it looks like one, and as a library name
    /// otherwise.
    pub fn parse(value: &str) -> Self {
        let looks_like_path = value.contains('/')
            || value.contains('\\')
            || Path::new(value).extension().is_some()
            || Path::new(value).exists();
        if looks_like_path {
            Self::Path(PathBuf::from(value))
        } else {
            Self::Name(value.strip_prefix("lib").unwrap_or(value).to_string())
        }
    }
}

impl fmt::Display for LibraryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Find the file for a [`LibraryRequest`] on the current system.
pub async fn locate_library(
    request: &LibraryRequest,
    platform: Platform,
    runner: &impl ProcessRunner,
) -> Result<PathBuf, Error> {
    let not_found = || Error::NotFound {
        library: request.to_string(),
        platform,
    };

    let found = match request {
        LibraryRequest::Path(path) => {
            if !path.is_file() {
                return Err(not_found());
            }
            Some(path.clone())
        }
        LibraryRequest::Name(name) => match platform {
            Platform::Macos => locate_macos(name, runner).await,
            Platform::Linux => locate_linux(name, runner).await,
            Platform::Windows => locate_windows(name, runner).await,
        },
    };

    let path = found.ok_or_else(not_found)?;
    debug!("Using `{}` for `{request}`", path.display());
    Ok(dunce::canonicalize(path)?)
}

/// The Homebrew installation prefix.
///
/// Read from `HOMEBREW_PREFIX`, then `brew --prefix`, then the default for the host architecture.
pub async fn homebrew_prefix(runner: &impl ProcessRunner) -> PathBuf {
    if let Some(prefix) = env::var_os(EnvVars::HOMEBREW_PREFIX).filter(|prefix| !prefix.is_empty())
    {
        return PathBuf::from(prefix);
    }
    if let Ok(output) = runner.run_checked(&Tool::new("brew").arg("--prefix")).await {
        let prefix = output.stdout.trim();
        if !prefix.is_empty() {
            return PathBuf::from(prefix);
        }
    }
    if Arch::from_env().name_for(Platform::Macos) == "arm64" {
        PathBuf::from("/opt/homebrew")
    } else {
        PathBuf::from("/usr/local")
    }
}

/// Find `lib<name>.<extension>`, or a versioned variant of it, in `directory`.
///
/// The unversioned file wins; among versioned files, the first in sorted order.
fn find_in_directory(directory: &Path, name: &str, platform: Platform) -> Option<PathBuf> {
    let extension = platform.library_extension();
    let exact = directory.join(format!("lib{name}.{extension}"));
    if exact.is_file() {
        return Some(exact);
    }

    let versioned_prefix = match platform {
        // `libvips.42.dylib`
        Platform::Macos => format!("lib{name}."),
        // `libvips.so.42`
        Platform::Linux => format!("lib{name}.so."),
        // `libvips-42.dll`
        Platform::Windows => format!("lib{name}-"),
    };

    let mut candidates: Vec<PathBuf> = fs::read_dir(directory)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                return false;
            };
            file_name.starts_with(&versioned_prefix) && platform.is_library_name(file_name)
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn search_directories(
    directories: impl IntoIterator<Item = PathBuf>,
    name: &str,
    platform: Platform,
) -> Option<PathBuf> {
    directories.into_iter().find_map(|directory| {
        trace!("Searching `{}` for `{name}`", directory.display());
        find_in_directory(&directory, name, platform)
    })
}

async fn locate_macos(name: &str, runner: &impl ProcessRunner) -> Option<PathBuf> {
    let mut directories = Vec::new();
    if let Ok(output) = runner
        .run_checked(&Tool::new("brew").arg("--prefix").arg(name))
        .await
    {
        let prefix = output.stdout.trim();
        if !prefix.is_empty() {
            directories.push(Path::new(prefix).join("lib"));
        }
    }
    directories.push(homebrew_prefix(runner).await.join("lib"));
    directories.extend(
        ["/usr/local/lib", "/opt/homebrew/lib", "/opt/local/lib"]
            .into_iter()
            .map(PathBuf::from),
    );
    search_directories(directories, name, Platform::Macos)
}

/// Parse `ldconfig -p` for the first library named `lib<name>.so*`.
fn parse_ldconfig(stdout: &str, name: &str) -> Option<PathBuf> {
    let prefix = format!("lib{name}.so");
    stdout.lines().find_map(|line| {
        let (library, path) = line.trim().split_once(" => ")?;
        library
            .starts_with(&prefix)
            .then(|| PathBuf::from(path.trim()))
    })
}

async fn locate_linux(name: &str, runner: &impl ProcessRunner) -> Option<PathBuf> {
    if let Ok(output) = runner.run_checked(&Tool::new("ldconfig").arg("-p")).await {
        if let Some(path) = parse_ldconfig(&output.stdout, name).filter(|path| path.is_file()) {
            return Some(path);
        }
    }

    let mut directories = Vec::new();
    if let Ok(output) = runner
        .run_checked(&Tool::new("pkg-config").arg("--variable=libdir").arg(name))
        .await
    {
        let libdir = output.stdout.trim();
        if !libdir.is_empty() {
            directories.push(PathBuf::from(libdir));
        }
    }
    directories.extend(
        [
            "/usr/local/lib",
            "/usr/local/lib64",
            "/usr/lib",
            "/usr/lib64",
            "/usr/lib/x86_64-linux-gnu",
            "/usr/lib/aarch64-linux-gnu",
            "/lib",
            "/lib64",
        ]
        .into_iter()
        .map(PathBuf::from),
    );
    search_directories(directories, name, Platform::Linux)
}

async fn locate_windows(name: &str, runner: &impl ProcessRunner) -> Option<PathBuf> {
    let mut directories = Vec::new();
    if let Some(root) = env::var_os(EnvVars::VCPKG_ROOT) {
        directories.push(
            PathBuf::from(root)
                .join("installed")
                .join("x64-windows")
                .join("bin"),
        );
    }
    directories.push(PathBuf::from(format!("C:/tools/{name}/bin")));
    if let Some(path) = search_directories(directories, name, Platform::Windows) {
        return Some(path);
    }

    let output = runner
        .run_checked(&Tool::new("where").arg(format!("lib{name}*.dll")))
        .await
        .ok()?;
    output
        .stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}
