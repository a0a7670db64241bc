use std::path::{Path, PathBuf};

use fs_err as fs;
use goblin::mach::{Mach, MachO};
use tracing::trace;

use depbundle_process::{ProcessRunner, Tool, ToolError};

use crate::inspect::LinkageReference;

/// Install-name prefixes of libraries that ship with the operating system and are never bundled.
const SYSTEM_PREFIXES: &[&str] = &["/usr/lib/", "/System/"];

/// Returns `true` if the install name points into the operating system.
pub(crate) fn is_system_library(install_name: &str) -> bool {
    SYSTEM_PREFIXES
        .iter()
        .any(|prefix| install_name.starts_with(prefix))
}

/// Where `@rpath/` references are looked up after the library's own directory.
#[derive(Debug, Default)]
pub(crate) struct RpathSearch<'a> {
    pub(crate) homebrew_prefix: Option<&'a Path>,
    pub(crate) extra: &'a [PathBuf],
}

/// Load commands of interest, read directly from the file.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct MachOInfo {
    /// `LC_ID_DYLIB`.
    pub(crate) install_name: Option<String>,
    /// `LC_RPATH`.
    pub(crate) rpaths: Vec<String>,
}

/// Read the install name and rpaths of a Mach-O file.
///
/// Files that can't be read or parsed produce an empty [`MachOInfo`]; `otool` remains the
/// source of truth for the dependency list.
pub(crate) fn read_macho(path: &Path) -> MachOInfo {
    let Ok(data) = fs::read(path) else {
        return MachOInfo::default();
    };
    match Mach::parse(&data) {
        Ok(Mach::Binary(macho)) => macho_info(&macho),
        Ok(Mach::Fat(fat)) => {
            // Every slice of a universal binary carries the same install name; use the first one
            // that parses.
            for arch in fat.iter_arches().flatten() {
                let start = arch.offset as usize;
                let end = start.saturating_add(arch.size as usize);
                let Some(slice) = data.get(start..end) else {
                    continue;
                };
                if let Ok(macho) = MachO::parse(slice, 0) {
                    return macho_info(&macho);
                }
            }
            MachOInfo::default()
        }
        Err(err) => {
            trace!("Not a readable Mach-O file `{}`: {err}", path.display());
            MachOInfo::default()
        }
    }
}

fn macho_info(macho: &MachO) -> MachOInfo {
    MachOInfo {
        install_name: macho.name.map(ToString::to_string),
        rpaths: macho.rpaths.iter().map(|rpath| (*rpath).to_string()).collect(),
    }
}

/// Parse the output of `otool -L` into the list of referenced install names.
///
/// Header lines (`path:` or `path (architecture arm64):`) are skipped, along with the
/// compatibility and current version annotations. Universal binaries list their references once
/// per architecture; duplicates are dropped.
pub(crate) fn parse_otool_list(stdout: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.ends_with(':') {
            continue;
        }
        let name = line
            .split_once(" (compatibility version")
            .map_or(line, |(name, _)| name)
            .trim();
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Parse the output of `otool -D` into the library's install name, if it has one.
pub(crate) fn parse_otool_id(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.ends_with(':'))
        .map(ToString::to_string)
}

/// Substitute `@loader_path/` and `@executable_path/` relative to the library's directory.
fn expand_loader_path(value: &str, directory: &Path) -> Option<PathBuf> {
    value
        .strip_prefix("@loader_path/")
        .or_else(|| value.strip_prefix("@executable_path/"))
        .map(|relative| directory.join(relative))
}

/// Resolve an install name, as referenced from the library at `library`, to a file on disk.
pub(crate) fn resolve_install_name(
    install_name: &str,
    library: &Path,
    rpaths: &[String],
    search: &RpathSearch,
) -> Option<PathBuf> {
    let directory = library.parent().unwrap_or(Path::new("."));

    if let Some(path) = expand_loader_path(install_name, directory) {
        return path.exists().then_some(path);
    }

    if let Some(relative) = install_name.strip_prefix("@rpath/") {
        let mut candidates = vec![directory.to_path_buf(), directory.join("..").join("lib")];
        if let Some(prefix) = search.homebrew_prefix {
            candidates.push(prefix.join("lib"));
        }
        candidates.extend(rpaths.iter().map(|rpath| {
            expand_loader_path(rpath, directory).unwrap_or_else(|| PathBuf::from(rpath))
        }));
        candidates.extend(search.extra.iter().cloned());

        return candidates
            .into_iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.exists());
    }

    let path = Path::new(install_name);
    if path.is_absolute() {
        return Some(path.to_path_buf());
    }

    // A bare file name; the dynamic linker would only find it next to the library.
    let candidate = directory.join(install_name);
    candidate.exists().then_some(candidate)
}

pub(crate) async fn inspect(
    runner: &impl ProcessRunner,
    path: &Path,
    search: &RpathSearch<'_>,
) -> Result<Vec<LinkageReference>, ToolError> {
    let output = runner
        .run_checked(&Tool::new("otool").arg("-L").arg(path))
        .await?;
    let info = read_macho(path);

    // `otool -L` lists the library's own install name first; fall back to `otool -D` when the
    // load commands can't be read directly.
    let install_name = match info.install_name {
        Some(install_name) => Some(install_name),
        None => runner
            .run_checked(&Tool::new("otool").arg("-D").arg(path))
            .await
            .ok()
            .and_then(|output| parse_otool_id(&output.stdout)),
    };
    trace!("Install name of `{}`: {install_name:?}", path.display());

    let references = parse_otool_list(&output.stdout)
        .into_iter()
        .filter(|name| install_name.as_deref() != Some(name.as_str()))
        .filter(|name| !is_system_library(name))
        .map(|name| {
            match resolve_install_name(&name, path, &info.rpaths, search) {
                Some(candidate) => LinkageReference::resolved(name, candidate),
                None => LinkageReference::unresolved(name),
            }
        })
        .collect();

    Ok(references)
}
