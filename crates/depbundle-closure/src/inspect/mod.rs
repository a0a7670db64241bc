//! Reading the linked-library table of a single binary with the platform's own tooling.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use depbundle_platform::Platform;
use depbundle_process::{ProcessRunner, ToolError};

pub(crate) mod linux;
pub(crate) mod macos;
pub(crate) mod windows;

/// A dependency as declared in a binary, with the file the inspector believes it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageReference {
    /// The reference exactly as the linker tool printed it (e.g., `@rpath/libpng16.16.dylib`).
    pub declared: String,
    /// The candidate file, if the reference could be resolved to one.
    pub path: Option<PathBuf>,
}

impl LinkageReference {
    pub fn resolved(declared: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            declared: declared.into(),
            path: Some(path.into()),
        }
    }

    pub fn unresolved(declared: impl Into<String>) -> Self {
        Self {
            declared: declared.into(),
            path: None,
        }
    }
}

/// How trustworthy the reference list of an [`Inspection`] is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InspectionStatus {
    /// Not inspected yet.
    #[default]
    Pending,
    /// The linker tool ran and its output was parsed.
    Complete,
    /// The linker tool is not installed.
    ToolMissing,
    /// The linker tool errored or timed out.
    ToolFailed(String),
    /// The references were guessed from the library's surroundings instead of its contents.
    Approximated,
}

impl InspectionStatus {
    /// Returns `true` if the reference list may be missing or over-reporting dependencies.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Complete | Self::Pending)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    pub references: Vec<LinkageReference>,
    pub status: InspectionStatus,
}

impl Inspection {
    fn degraded(status: InspectionStatus) -> Self {
        Self {
            references: Vec::new(),
            status,
        }
    }
}

/// Lists the direct dependencies of a library using the platform's linker tool
/// (`otool -L`, `ldd`, or `dumpbin /dependents`).
///
/// Inspection never fails: when the tool is missing or errors, the library is reported with no
/// references and a degraded [`InspectionStatus`], so that one unreadable library leaves the rest
/// of the closure intact.
#[derive(Debug)]
pub struct LinkageInspector<'a, R> {
    platform: Platform,
    runner: &'a R,
    /// The root of the Homebrew installation, searched for `@rpath` references.
    homebrew_prefix: Option<PathBuf>,
    /// Additional directories searched for `@rpath` references.
    search_paths: Vec<PathBuf>,
    /// Substrings of declared references that should never be followed.
    exclude: Vec<String>,
}

impl<'a, R: ProcessRunner> LinkageInspector<'a, R> {
    pub fn new(platform: Platform, runner: &'a R) -> Self {
        Self {
            platform,
            runner,
            homebrew_prefix: None,
            search_paths: Vec::new(),
            exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_homebrew_prefix(mut self, prefix: Option<PathBuf>) -> Self {
        self.homebrew_prefix = prefix;
        self
    }

    #[must_use]
    pub fn with_search_paths(mut self, search_paths: Vec<PathBuf>) -> Self {
        self.search_paths = search_paths;
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Inspect the direct dependencies of the library at `path`.
    pub async fn dependencies_of(&self, path: &Path) -> Inspection {
        let result = match self.platform {
            Platform::Macos => {
                let search = macos::RpathSearch {
                    homebrew_prefix: self.homebrew_prefix.as_deref(),
                    extra: &self.search_paths,
                };
                macos::inspect(self.runner, path, &search).await
            }
            Platform::Linux => linux::inspect(self.runner, path).await,
            Platform::Windows => windows::inspect(self.runner, path).await,
        };

        let mut inspection = match result {
            Ok(references) => Inspection {
                references,
                status: InspectionStatus::Complete,
            },
            Err(err) if err.is_missing() && self.platform == Platform::Windows => {
                warn!(
                    "{err}; treating every DLL next to `{}` as a dependency",
                    path.display()
                );
                match windows::colocated_dlls(path) {
                    Ok(references) => Inspection {
                        references,
                        status: InspectionStatus::Approximated,
                    },
                    Err(err) => Inspection::degraded(InspectionStatus::ToolFailed(err.to_string())),
                }
            }
            Err(err) => {
                warn!(
                    "Failed to inspect the dependencies of `{}`: {err}",
                    path.display()
                );
                Inspection::degraded(degraded_status(&err))
            }
        };

        if !self.exclude.is_empty() {
            inspection.references.retain(|reference| {
                let excluded = self
                    .exclude
                    .iter()
                    .any(|pattern| reference.declared.contains(pattern.as_str()));
                if excluded {
                    debug!("Excluding `{}`", reference.declared);
                }
                !excluded
            });
        }

        inspection
    }
}

fn degraded_status(err: &ToolError) -> InspectionStatus {
    if err.is_missing() {
        InspectionStatus::ToolMissing
    } else {
        InspectionStatus::ToolFailed(err.to_string())
    }
}
