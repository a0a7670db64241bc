#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use fs_err as fs;

use depbundle_process::{ProcessRunner, Tool, ToolError, ToolOutput};

/// The linkage of one fake library, keyed by file name in [`FakeToolchain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeLibrary {
    /// The install name (macOS) or soname (Linux).
    pub id: Option<String>,
    /// Declared references. On Linux, an entry containing `=>` is printed by `ldd` verbatim.
    pub references: Vec<String>,
    pub signed: bool,
}

/// An in-memory stand-in for `otool`, `install_name_tool`, `codesign`, `ldd`, `patchelf` and
/// `dumpbin`.
///
/// Libraries are keyed by file name, so the same fake answers for a source file and its copy in
/// a bundle directory. Rewrites mutate the fake's state and invalidate the signature, like the
/// real tools do.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    libraries: Mutex<BTreeMap<String, FakeLibrary>>,
    missing: BTreeSet<String>,
    unsignable: BTreeSet<String>,
    log: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library.
    #[must_use]
    pub fn library(self, name: &str, id: Option<&str>, references: &[&str]) -> Self {
        self.libraries.lock().unwrap().insert(
            name.to_string(),
            FakeLibrary {
                id: id.map(ToString::to_string),
                references: references.iter().map(ToString::to_string).collect(),
                signed: true,
            },
        );
        self
    }

    /// Report `program` as not installed.
    #[must_use]
    pub fn without(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Make `codesign` fail for the given library.
    #[must_use]
    pub fn unsignable(mut self, name: &str) -> Self {
        self.unsignable.insert(name.to_string());
        self
    }

    pub fn get(&self, name: &str) -> FakeLibrary {
        self.libraries.lock().unwrap()[name].clone()
    }

    /// Every invocation of `program` so far, rendered as command lines.
    pub fn invocations(&self, program: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|command| {
                command
                    .split_once(' ')
                    .is_some_and(|(name, _)| name == program)
            })
            .cloned()
            .collect()
    }

    /// The number of invocations whose command line contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|command| command.contains(pattern))
            .count()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    fn with_library<T>(&self, name: &str, f: impl FnOnce(&mut FakeLibrary) -> T) -> Option<T> {
        self.libraries.lock().unwrap().get_mut(name).map(f)
    }

    fn respond(&self, program: &str, args: &[String]) -> ToolOutput {
        let Some(file) = args.last() else {
            return ToolOutput::failure(1, "missing operand");
        };
        let path = Path::new(file);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let flag = args.first().map(String::as_str).unwrap_or_default();

        let not_an_object = || ToolOutput::failure(1, format!("{file}: is not an object file"));

        match (program, flag) {
            ("otool", "-L") => self
                .with_library(&name, |library| {
                    let mut stdout = format!("{file}:\n");
                    for reference in library.id.iter().chain(&library.references) {
                        stdout.push_str(&format!(
                            "\t{reference} (compatibility version 1.0.0, current version 1.0.0)\n"
                        ));
                    }
                    ToolOutput::success(stdout)
                })
                .unwrap_or_else(not_an_object),
            ("otool", "-D") => self
                .with_library(&name, |library| {
                    let mut stdout = format!("{file}:\n");
                    if let Some(id) = &library.id {
                        stdout.push_str(&format!("{id}\n"));
                    }
                    ToolOutput::success(stdout)
                })
                .unwrap_or_else(not_an_object),
            ("install_name_tool", _) => self
                .with_library(&name, |library| {
                    let mut args = args[..args.len() - 1].iter();
                    while let Some(flag) = args.next() {
                        match flag.as_str() {
                            "-id" => library.id = args.next().cloned(),
                            "-change" => {
                                let (Some(old), Some(new)) = (args.next(), args.next()) else {
                                    return ToolOutput::failure(1, "-change needs two arguments");
                                };
                                for reference in &mut library.references {
                                    if reference == old {
                                        reference.clone_from(new);
                                    }
                                }
                            }
                            other => {
                                return ToolOutput::failure(1, format!("unknown option {other}"));
                            }
                        }
                    }
                    library.signed = false;
                    ToolOutput::success("")
                })
                .unwrap_or_else(not_an_object),
            ("codesign", "--force") => {
                if self.unsignable.contains(&name) {
                    return ToolOutput::failure(1, format!("{file}: internal error in Code Signing"));
                }
                self.with_library(&name, |library| {
                    library.signed = true;
                    ToolOutput::success("")
                })
                .unwrap_or_else(not_an_object)
            }
            ("codesign", "--verify") => self
                .with_library(&name, |library| {
                    if library.signed {
                        ToolOutput::success("")
                    } else {
                        ToolOutput::failure(
                            1,
                            format!("{file}: invalid signature (code or signature have been modified)"),
                        )
                    }
                })
                .unwrap_or_else(not_an_object),
            ("ldd", _) => self
                .with_library(&name, |library| {
                    let directory = path.parent().unwrap_or(Path::new("."));
                    let mut stdout = String::from("\tlinux-vdso.so.1 (0x00007ffc2c5f6000)\n");
                    for reference in &library.references {
                        if reference.contains("=>") {
                            stdout.push_str(&format!("\t{reference} (0x00007f3a5e400000)\n"));
                        } else if directory.join(reference).exists() {
                            stdout.push_str(&format!(
                                "\t{reference} => {} (0x00007f3a5e800000)\n",
                                directory.join(reference).display()
                            ));
                        } else {
                            stdout.push_str(&format!("\t{reference} => not found\n"));
                        }
                    }
                    ToolOutput::success(stdout)
                })
                .unwrap_or_else(|| ToolOutput::failure(1, "\tnot a dynamic executable")),
            ("patchelf", "--print-soname") => self
                .with_library(&name, |library| match &library.id {
                    Some(id) => ToolOutput::success(format!("{id}\n")),
                    None => ToolOutput::failure(1, "no DT_SONAME found"),
                })
                .unwrap_or_else(not_an_object),
            ("patchelf", "--print-needed") => self
                .with_library(&name, |library| {
                    let mut stdout = String::new();
                    for reference in &library.references {
                        stdout.push_str(&format!("{reference}\n"));
                    }
                    ToolOutput::success(stdout)
                })
                .unwrap_or_else(not_an_object),
            ("patchelf", _) => self
                .with_library(&name, |library| {
                    let mut args = args[..args.len() - 1].iter();
                    while let Some(flag) = args.next() {
                        match flag.as_str() {
                            "--set-soname" => library.id = args.next().cloned(),
                            "--replace-needed" => {
                                let (Some(old), Some(new)) = (args.next(), args.next()) else {
                                    return ToolOutput::failure(1, "missing argument");
                                };
                                for reference in &mut library.references {
                                    if reference == old {
                                        reference.clone_from(new);
                                    }
                                }
                            }
                            other => {
                                return ToolOutput::failure(1, format!("unknown option {other}"));
                            }
                        }
                    }
                    ToolOutput::success("")
                })
                .unwrap_or_else(not_an_object),
            ("dumpbin", "/dependents") => self
                .with_library(&name, |library| {
                    let mut stdout = format!(
                        "Dump of file {file}\n\nFile Type: DLL\n\n  Image has the following dependencies:\n\n"
                    );
                    for reference in &library.references {
                        stdout.push_str(&format!("    {reference}\n"));
                    }
                    stdout.push_str("\n  Summary\n");
                    ToolOutput::success(stdout)
                })
                .unwrap_or_else(not_an_object),
            _ => ToolOutput::failure(127, format!("unexpected invocation: {program} {args:?}")),
        }
    }
}

impl ProcessRunner for FakeToolchain {
    async fn run(&self, tool: &Tool) -> Result<ToolOutput, ToolError> {
        self.log.lock().unwrap().push(tool.to_string());
        if self.missing.contains(tool.program()) {
            return Err(ToolError::NotFound {
                program: tool.program().to_string(),
            });
        }
        Ok(self.respond(tool.program(), &tool.args_lossy()))
    }
}

/// Create placeholder library files in `directory`.
pub fn touch_libraries(directory: &Path, names: &[&str]) {
    fs::create_dir_all(directory).unwrap();
    for name in names {
        fs::write(directory.join(name), format!("fake contents of {name}")).unwrap();
    }
}
