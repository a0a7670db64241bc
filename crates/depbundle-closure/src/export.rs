use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fs_err as fs;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use depbundle_platform::Platform;
use depbundle_process::{ProcessRunner, Tool};

use crate::Error;
use crate::graph::{DependencyGraph, LibraryNode};

/// The file written next to an exported closure.
pub const METADATA_FILE: &str = "metadata.json";

/// A machine-readable description of a closure.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub platform: Platform,
    pub root_library_path: PathBuf,
    /// Library file name to source path.
    pub libraries: BTreeMap<String, PathBuf>,
    /// Library file name to the file names of its direct dependencies.
    pub dependencies: BTreeMap<String, Vec<String>>,
    /// Library file name to the references that could not be resolved.
    pub unresolved: BTreeMap<String, Vec<String>>,
    pub total_count: usize,
    pub total_size: u64,
}

/// The contents of `metadata.json`.
#[derive(Debug, Clone, Serialize)]
pub struct BundleMetadata {
    pub platform: Platform,
    pub architecture: String,
    pub version: String,
    pub total_count: usize,
    pub total_size: u64,
    pub libraries: Vec<String>,
}

/// Copies a closure into a flat bundle directory and describes it.
pub struct ClosureExporter<'a> {
    graph: &'a DependencyGraph,
    platform: Platform,
    by_name: BTreeMap<&'a str, &'a LibraryNode>,
}

impl<'a> ClosureExporter<'a> {
    /// Index the closure by file name.
    ///
    /// Fails if two distinct libraries share a file name, since only one of them could be copied
    /// into the bundle.
    pub fn new(graph: &'a DependencyGraph, platform: Platform) -> Result<Self, Error> {
        let mut by_name: BTreeMap<&str, &LibraryNode> = BTreeMap::new();
        for library in graph.libraries() {
            if let Some(existing) = by_name.insert(library.name(), library) {
                return Err(Error::NameCollision {
                    name: library.name().to_string(),
                    first: existing.path().to_path_buf(),
                    second: library.path().to_path_buf(),
                });
            }
        }
        Ok(Self {
            graph,
            platform,
            by_name,
        })
    }

    /// The libraries of the closure, sorted by file name.
    pub fn libraries(&self) -> impl Iterator<Item = &'a LibraryNode> + '_ {
        self.by_name.values().copied()
    }

    pub fn report(&self) -> Report {
        let mut libraries = BTreeMap::new();
        let mut dependencies = BTreeMap::new();
        let mut unresolved = BTreeMap::new();

        for (name, library) in &self.by_name {
            libraries.insert((*name).to_string(), library.path().to_path_buf());
            dependencies.insert(
                (*name).to_string(),
                self.graph
                    .dependencies(library.path())
                    .into_iter()
                    .map(|dependency| dependency.name().to_string())
                    .collect(),
            );
            if !library.unresolved().is_empty() {
                unresolved.insert((*name).to_string(), library.unresolved().to_vec());
            }
        }

        Report {
            platform: self.platform,
            root_library_path: self.graph.root().path().to_path_buf(),
            libraries,
            dependencies,
            unresolved,
            total_count: self.graph.len(),
            total_size: self.graph.total_size(),
        }
    }

    /// Write the [`Report`] to `path` as JSON.
    pub fn write_report(&self, path: &Path) -> Result<Report, Error> {
        let report = self.report();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        debug!("Wrote report to `{}`", path.display());
        Ok(report)
    }

    /// Copy every library into `destination` and write its `metadata.json`.
    pub fn export(
        &self,
        destination: &Path,
        version: &str,
        architecture: &str,
    ) -> Result<BundleMetadata, Error> {
        fs::create_dir_all(destination)?;

        for (name, library) in &self.by_name {
            let target = destination.join(name);
            if target.exists() {
                // Exporting into the directory the closure was read from.
                if dunce::canonicalize(&target)? == library.path() {
                    debug!("`{}` is already in place", library.path().display());
                    continue;
                }
                // Package managers install libraries read-only; replace rather than overwrite.
                fs::remove_file(&target)?;
            }
            fs::copy(library.path(), &target)?;
            make_writable(&target)?;
            debug!("Copied `{}`", library.path().display());
        }

        let metadata = BundleMetadata {
            platform: self.platform,
            architecture: architecture.to_string(),
            version: version.to_string(),
            total_count: self.graph.len(),
            total_size: self.graph.total_size(),
            libraries: self.by_name.keys().map(ToString::to_string).collect(),
        };
        fs::write(
            destination.join(METADATA_FILE),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        Ok(metadata)
    }

    /// Write a standalone shell script that copies the closure into a directory.
    pub fn write_script(&self, path: &Path, architecture: &str) -> Result<(), Error> {
        let script = self.render_script(architecture).map_err(io::Error::other)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, script)?;
        make_executable(path)?;
        Ok(())
    }

    fn render_script(&self, architecture: &str) -> Result<String, fmt::Error> {
        let mut script = String::new();
        writeln!(script, "#!/bin/sh")?;
        writeln!(
            script,
            "# Copies the shared-library closure of {}",
            self.graph.root().name()
        )?;
        writeln!(script, "# Platform: {}", self.platform)?;
        writeln!(script, "# Architecture: {architecture}")?;
        writeln!(script, "# Libraries: {}", self.by_name.len())?;
        writeln!(script, "set -e")?;
        writeln!(script)?;
        writeln!(script, "DEST_DIR=\"${{1:-.}}\"")?;
        writeln!(script, "mkdir -p \"$DEST_DIR\"")?;
        writeln!(script)?;
        for library in self.by_name.values() {
            writeln!(
                script,
                "cp {} \"$DEST_DIR/\"",
                shell_quote(&library.path().to_string_lossy())
            )?;
        }
        writeln!(script)?;
        writeln!(
            script,
            "echo \"Copied {} libraries to $DEST_DIR\"",
            self.by_name.len()
        )?;
        Ok(script)
    }
}

/// Quote a string for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn make_writable(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o200);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) -> Result<(), Error> {
    let mut permissions = fs::metadata(path)?.permissions();
    if permissions.readonly() {
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn make_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+\.\d+)").expect("valid regex"));

/// The library's name without the `lib` prefix or any extension: `libvips.42.dylib` is `vips`.
fn bare_name(root: &Path) -> Option<&str> {
    let name = root.file_name()?.to_str()?;
    let name = name.strip_prefix("lib").unwrap_or(name);
    let name = name.split('.').next()?;
    // `libvips-42.dll`
    let name = name
        .rsplit_once('-')
        .filter(|(_, suffix)| suffix.bytes().all(|byte| byte.is_ascii_digit()))
        .map_or(name, |(name, _)| name);
    (!name.is_empty()).then_some(name)
}

/// Determine the version of the root library on a best-effort basis.
///
/// Package managers usually put the version in the installation path
/// (`/opt/homebrew/Cellar/vips/8.15.1/lib`); otherwise, ask the library's command-line tool.
pub async fn detect_version(root: &Path, runner: &impl ProcessRunner) -> String {
    let Some(name) = bare_name(root) else {
        return "unknown".to_string();
    };

    let pattern = format!(r"{}[/\\-](\d+\.\d+\.\d+)", regex::escape(name));
    if let Ok(regex) = Regex::new(&pattern) {
        if let Some(captures) = regex.captures(&root.to_string_lossy()) {
            return captures[1].to_string();
        }
    }

    if let Ok(output) = runner.run_checked(&Tool::new(name).arg("--version")).await {
        if let Some(captures) = VERSION.captures(&output.stdout) {
            return captures[1].to_string();
        }
    }

    "unknown".to_string()
}
