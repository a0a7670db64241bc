use std::io;
use std::path::Path;

use fs_err as fs;

use depbundle_process::{ProcessRunner, Tool, ToolError};

use crate::inspect::LinkageReference;

/// DLLs that ship with Windows itself.
const SYSTEM_DLLS: &[&str] = &[
    "advapi32.dll",
    "bcrypt.dll",
    "comctl32.dll",
    "comdlg32.dll",
    "crypt32.dll",
    "gdi32.dll",
    "imm32.dll",
    "kernel32.dll",
    "kernelbase.dll",
    "msvcp140.dll",
    "msvcrt.dll",
    "ntdll.dll",
    "ole32.dll",
    "oleaut32.dll",
    "rpcrt4.dll",
    "secur32.dll",
    "setupapi.dll",
    "shell32.dll",
    "shlwapi.dll",
    "ucrtbase.dll",
    "user32.dll",
    "userenv.dll",
    "vcruntime140.dll",
    "vcruntime140_1.dll",
    "version.dll",
    "winmm.dll",
    "ws2_32.dll",
];

/// Returns `true` if the DLL is provided by the operating system (including the API set
/// forwarders and the Visual C++ runtime).
pub(crate) fn is_system_dll(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("api-ms-win-")
        || name.starts_with("ext-ms-")
        || SYSTEM_DLLS.contains(&name.as_str())
}

/// Parse the output of `dumpbin /dependents` into the list of referenced DLL names.
pub(crate) fn parse_dumpbin(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip_while(|line| !line.contains("Image has the following dependencies"))
        .skip(1)
        .map(str::trim)
        .take_while(|line| !line.starts_with("Summary"))
        .filter(|line| line.to_ascii_lowercase().ends_with(".dll"))
        .map(ToString::to_string)
        .collect()
}

pub(crate) async fn inspect(
    runner: &impl ProcessRunner,
    path: &Path,
) -> Result<Vec<LinkageReference>, ToolError> {
    let output = runner
        .run_checked(&Tool::new("dumpbin").arg("/dependents").arg(path))
        .await?;
    let directory = path.parent().unwrap_or(Path::new("."));

    Ok(parse_dumpbin(&output.stdout)
        .into_iter()
        .filter(|name| !is_system_dll(name))
        .map(|name| {
            let candidate = directory.join(&name);
            if candidate.exists() {
                LinkageReference::resolved(name, candidate)
            } else {
                LinkageReference::unresolved(name)
            }
        })
        .collect())
}

/// Every other DLL in the library's directory.
///
/// Used when `dumpbin` is unavailable. This over-approximates the closure: prebuilt Windows
/// distributions ship their whole dependency set in one `bin` directory, so co-location is a
/// reasonable, if imprecise, stand-in for linkage.
pub(crate) fn colocated_dlls(path: &Path) -> io::Result<Vec<LinkageReference>> {
    let directory = path.parent().unwrap_or(Path::new("."));
    let own_name = path.file_name();

    let mut references = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if Some(entry.file_name().as_os_str()) == own_name {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.to_ascii_lowercase().ends_with(".dll") || !entry.file_type()?.is_file() {
            continue;
        }
        references.push(LinkageReference::resolved(name, entry.path()));
    }
    references.sort_by(|a, b| a.declared.cmp(&b.declared));
    Ok(references)
}

#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use indoc::indoc;

    use super::*;

    #[test]
    fn dumpbin() {
        let stdout = indoc! {"
            Microsoft (R) COFF/PE Dumper Version 14.38.33130.0
            Copyright (C) Microsoft Corporation.  All rights reserved.

            Dump of file libvips-42.dll

            File Type: DLL

              Image has the following dependencies:

                libglib-2.0-0.dll
                libgobject-2.0-0.dll
                KERNEL32.dll
                api-ms-win-crt-runtime-l1-1-0.dll

              Summary

                    1000 .data
        "};
        let names = parse_dumpbin(stdout);
        assert_eq!(
            names,
            vec![
                "libglib-2.0-0.dll",
                "libgobject-2.0-0.dll",
                "KERNEL32.dll",
                "api-ms-win-crt-runtime-l1-1-0.dll",
            ]
        );
        let bundled: Vec<_> = names.iter().filter(|name| !is_system_dll(name)).collect();
        assert_eq!(bundled, ["libglib-2.0-0.dll", "libgobject-2.0-0.dll"]);
    }

    #[test]
    fn colocated() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("libvips-42.dll").touch().unwrap();
        temp.child("libglib-2.0-0.dll").touch().unwrap();
        temp.child("libexpat-1.DLL").touch().unwrap();
        temp.child("vips.exe").touch().unwrap();

        let references = colocated_dlls(&temp.child("libvips-42.dll")).unwrap();
        let names: Vec<_> = references.iter().map(|r| r.declared.as_str()).collect();
        assert_eq!(names, ["libexpat-1.DLL", "libglib-2.0-0.dll"]);
    }
}
