use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use depbundle_platform::Platform;
use depbundle_process::{ProcessRunner, Tool, ToolError};

use crate::Error;
use crate::alias::VersionAliasMap;
use crate::inspect::macos::{is_system_library, parse_otool_id, parse_otool_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The library's own install name (`LC_ID_DYLIB`) or soname (`DT_SONAME`).
    Identity,
    /// A reference to another library.
    Dependency,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("id"),
            Self::Dependency => f.write_str("dependency"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceChange {
    pub kind: ChangeKind,
    pub old: String,
    pub new: String,
}

/// The changes applied to a single library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRecord {
    path: PathBuf,
    changes: Vec<ReferenceChange>,
}

impl RewriteRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn changes(&self) -> &[ReferenceChange] {
        &self.changes
    }

    /// Returns `true` if the file was changed on disk.
    pub fn modified(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Normalizes the linkage of libraries copied into a bundle directory.
///
/// Every library is given an identity derived from its own file name, and every reference to a
/// shortened name is pointed at the versioned file that exists in the bundle. Libraries are
/// read back from disk on each call, so rewriting an already-normalized library is a no-op.
pub struct LinkageRewriter<'a, R> {
    platform: Platform,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> LinkageRewriter<'a, R> {
    pub fn new(platform: Platform, runner: &'a R) -> Self {
        Self { platform, runner }
    }

    pub async fn rewrite(
        &self,
        path: &Path,
        aliases: &VersionAliasMap,
    ) -> Result<RewriteRecord, Error> {
        let changes = match self.platform {
            Platform::Macos => self.rewrite_macho(path, aliases).await,
            Platform::Linux => self.rewrite_elf(path, aliases).await,
            Platform::Windows => return Err(Error::Unsupported(self.platform)),
        }
        .map_err(|err| Error::Rewrite {
            path: path.to_path_buf(),
            err,
        })?;

        if changes.is_empty() {
            trace!("`{}` is already relocatable", path.display());
        } else {
            for change in &changes {
                debug!(
                    "{}: {} `{}` -> `{}`",
                    path.display(),
                    change.kind,
                    change.old,
                    change.new
                );
            }
        }

        Ok(RewriteRecord {
            path: path.to_path_buf(),
            changes,
        })
    }

    async fn rewrite_macho(
        &self,
        path: &Path,
        aliases: &VersionAliasMap,
    ) -> Result<Vec<ReferenceChange>, ToolError> {
        let id = self
            .runner
            .run_checked(&Tool::new("otool").arg("-D").arg(path))
            .await
            .map(|output| parse_otool_id(&output.stdout))?;
        let references = self
            .runner
            .run_checked(&Tool::new("otool").arg("-L").arg(path))
            .await
            .map(|output| parse_otool_list(&output.stdout))?;

        let bundle = path.parent().unwrap_or(Path::new("."));
        let changes = macho_changes(path, id.as_deref(), &references, aliases, |name| {
            bundle.join(name).is_file()
        });
        if changes.is_empty() {
            return Ok(changes);
        }

        let mut tool = Tool::new("install_name_tool");
        for change in &changes {
            tool = match change.kind {
                ChangeKind::Identity => tool.arg("-id").arg(&change.new),
                ChangeKind::Dependency => tool.arg("-change").arg(&change.old).arg(&change.new),
            };
        }
        self.runner.run_checked(&tool.arg(path)).await?;

        Ok(changes)
    }

    async fn rewrite_elf(
        &self,
        path: &Path,
        aliases: &VersionAliasMap,
    ) -> Result<Vec<ReferenceChange>, ToolError> {
        // `patchelf` exits non-zero for libraries without a `DT_SONAME`.
        let soname = self
            .runner
            .run(&Tool::new("patchelf").arg("--print-soname").arg(path))
            .await?;
        let soname = soname
            .is_success()
            .then(|| soname.stdout.trim().to_string())
            .filter(|soname| !soname.is_empty());
        let needed = self
            .runner
            .run_checked(&Tool::new("patchelf").arg("--print-needed").arg(path))
            .await?;
        let needed: Vec<String> = needed
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect();

        let changes = elf_changes(path, soname.as_deref(), &needed, aliases);
        if changes.is_empty() {
            return Ok(changes);
        }

        let mut tool = Tool::new("patchelf");
        for change in &changes {
            tool = match change.kind {
                ChangeKind::Identity => tool.arg("--set-soname").arg(&change.new),
                ChangeKind::Dependency => tool
                    .arg("--replace-needed")
                    .arg(&change.old)
                    .arg(&change.new),
            };
        }
        self.runner.run_checked(&tool.arg(path)).await?;

        Ok(changes)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Split a reference into its directory prefix (including the trailing `/`) and file name.
fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rfind('/') {
        Some(position) => reference.split_at(position + 1),
        None => ("", reference),
    }
}

/// Compute the install-name changes for a Mach-O library in a bundle directory.
///
/// `in_bundle` reports whether a file name exists in the bundle directory.
fn macho_changes(
    path: &Path,
    id: Option<&str>,
    references: &[String],
    aliases: &VersionAliasMap,
    in_bundle: impl Fn(&str) -> bool,
) -> Vec<ReferenceChange> {
    let mut changes = Vec::new();

    if let Some(id) = id {
        let desired = format!("@rpath/{}", file_name(path));
        if id != desired {
            changes.push(ReferenceChange {
                kind: ChangeKind::Identity,
                old: id.to_string(),
                new: desired,
            });
        }
    }

    for reference in references {
        if Some(reference.as_str()) == id || is_system_library(reference) {
            continue;
        }
        let (prefix, name) = split_reference(reference);
        let canonical = aliases.canonical(name).unwrap_or(name);

        let new = if reference.starts_with('/') && in_bundle(canonical) {
            // An absolute path outside the bundle; load the bundled copy instead.
            format!("@rpath/{canonical}")
        } else if canonical != name {
            format!("{prefix}{canonical}")
        } else {
            continue;
        };

        if new != *reference {
            changes.push(ReferenceChange {
                kind: ChangeKind::Dependency,
                old: reference.clone(),
                new,
            });
        }
    }

    changes
}

/// Compute the soname and `DT_NEEDED` changes for an ELF library in a bundle directory.
fn elf_changes(
    path: &Path,
    soname: Option<&str>,
    needed: &[String],
    aliases: &VersionAliasMap,
) -> Vec<ReferenceChange> {
    let mut changes = Vec::new();

    if let Some(soname) = soname {
        let desired = file_name(path);
        if soname != desired {
            changes.push(ReferenceChange {
                kind: ChangeKind::Identity,
                old: soname.to_string(),
                new: desired,
            });
        }
    }

    for reference in needed {
        let (prefix, name) = split_reference(reference);
        if let Some(canonical) = aliases.canonical(name) {
            changes.push(ReferenceChange {
                kind: ChangeKind::Dependency,
                old: reference.clone(),
                new: format!("{prefix}{canonical}"),
            });
        }
    }

    changes
}
