use std::path::{Path, PathBuf};

use depbundle_process::{ProcessRunner, Tool, ToolError};

use crate::inspect::LinkageReference;

/// Directories the baseline C runtime is installed into.
const RUNTIME_ROOTS: &[&str] = &["/lib/", "/lib64/", "/usr/lib/", "/usr/lib64/"];

/// Libraries every Linux system is assumed to provide; bundling them breaks the target system's
/// own C runtime.
const BASELINE_RUNTIME: &[&str] = &["libc.so", "libm.so", "libpthread", "libdl", "ld-linux"];

/// Returns `true` if the path is part of the system's baseline C runtime.
pub(crate) fn is_baseline_runtime(path: &Path) -> bool {
    let path = path.to_string_lossy();
    RUNTIME_ROOTS.iter().any(|root| path.starts_with(root))
        && BASELINE_RUNTIME.iter().any(|name| path.contains(name))
}

/// Parse the output of `ldd`.
///
/// Only `name => target` lines are references: `linux-vdso.so.1 (0x...)` and the interpreter
/// line have no `=>`.
pub(crate) fn parse_ldd(stdout: &str) -> Vec<LinkageReference> {
    let mut references = Vec::new();
    for line in stdout.lines() {
        let Some((name, target)) = line.split_once("=>") else {
            continue;
        };
        let name = name.trim();
        let target = target.trim();
        if name.is_empty() {
            continue;
        }

        if target.starts_with("not found") {
            references.push(LinkageReference::unresolved(name));
            continue;
        }

        let target = target
            .split_once(" (0x")
            .map_or(target, |(target, _)| target)
            .trim();
        if target.is_empty() || target.starts_with('(') {
            continue;
        }

        let path = PathBuf::from(target);
        if is_baseline_runtime(&path) {
            continue;
        }
        references.push(LinkageReference::resolved(name, path));
    }
    references
}

pub(crate) async fn inspect(
    runner: &impl ProcessRunner,
    path: &Path,
) -> Result<Vec<LinkageReference>, ToolError> {
    let output = runner.run_checked(&Tool::new("ldd").arg(path)).await?;
    Ok(parse_ldd(&output.stdout))
}
