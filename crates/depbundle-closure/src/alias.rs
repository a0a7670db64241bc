//! Mapping shortened library names to the versioned files present in a bundle directory.
//!
//! A library is usually linked against a shorter name than the file that is eventually shipped:
//! `libvips` asks for `libpng16.16.dylib`, while the bundle holds `libpng16.16.37.0.dylib`. The
//! [`VersionAliasMap`] of a directory records, for every versioned file, each strictly shorter
//! version truncation of its name, so that rewritten references can point at a file that
//! actually exists.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use fs_err as fs;
use tracing::warn;

use depbundle_platform::Platform;

use crate::Error;

/// A library file name split into its base, numeric version components, and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryName {
    base: String,
    versions: Vec<String>,
    layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    /// The version sits between the base and the extension: `libwebp.7.1.10.dylib`.
    Suffix { extension: String },
    /// The version follows the extension: `libpng16.so.16.37.0`.
    Elf,
}

impl LibraryName {
    /// Parse a versioned library file name, returning `None` if it carries no version.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(position) = name.find(".so.") {
            let base = &name[..position + ".so".len()];
            let versions: Vec<_> = name[position + ".so.".len()..].split('.').collect();
            if !versions.iter().all(|version| is_numeric(version)) {
                return None;
            }
            return Some(Self {
                base: base.to_string(),
                versions: versions.into_iter().map(ToString::to_string).collect(),
                layout: Layout::Elf,
            });
        }

        let (stem, extension) = name.rsplit_once('.')?;
        let components: Vec<_> = stem.split('.').collect();
        let trailing = components
            .iter()
            .rev()
            .take_while(|component| is_numeric(component))
            .count();
        // Keep at least one non-numeric component as the base.
        if trailing == 0 || trailing == components.len() {
            return None;
        }
        let split = components.len() - trailing;
        Some(Self {
            base: components[..split].join("."),
            versions: components[split..]
                .iter()
                .map(ToString::to_string)
                .collect(),
            layout: Layout::Suffix {
                extension: extension.to_string(),
            },
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// Render the name with only the first `count` version components.
    fn with_versions(&self, count: usize) -> String {
        let version = self.versions[..count].join(".");
        match &self.layout {
            Layout::Suffix { extension } => format!("{}.{version}.{extension}", self.base),
            Layout::Elf => format!("{}.{version}", self.base),
        }
    }

    /// Every strictly shorter form of the name that still carries at least one version
    /// component, shortest first.
    pub fn truncations(&self) -> impl Iterator<Item = String> + '_ {
        (1..self.versions.len()).map(|count| self.with_versions(count))
    }
}

fn is_numeric(component: &str) -> bool {
    !component.is_empty() && component.bytes().all(|byte| byte.is_ascii_digit())
}

/// Two versioned files that truncate to the same short name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasConflict {
    /// The short name both files produce.
    pub token: String,
    /// The file the short name maps to.
    pub kept: String,
    /// The file that lost the short name.
    pub rejected: String,
}

/// The short-name to full-name mapping of a single directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionAliasMap {
    aliases: BTreeMap<String, String>,
    conflicts: Vec<AliasConflict>,
}

impl VersionAliasMap {
    /// Build the alias map of the libraries in `directory`.
    ///
    /// Symbolic links are ignored: they are already aliases, and a short name only counts as
    /// taken when a regular file of that name exists.
    pub fn from_directory(directory: &Path, platform: Platform) -> Result<Self, Error> {
        let mut names = Vec::new();
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
                continue;
            };
            if platform.is_library_name(&name) {
                names.push(name);
            }
        }
        Ok(Self::from_names(names))
    }

    /// Build the alias map of the given file names.
    ///
    /// Names are processed in sorted order: when two names truncate to the same token, the
    /// lexicographically first one keeps it and the other is recorded as an [`AliasConflict`].
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();

        let mut aliases = BTreeMap::new();
        let mut conflicts = Vec::new();
        for name in &names {
            let Some(parsed) = LibraryName::parse(name) else {
                continue;
            };
            for token in parsed.truncations() {
                if names.contains(&token) {
                    continue;
                }
                match aliases.get(&token) {
                    None => {
                        aliases.insert(token, name.clone());
                    }
                    Some(kept) if kept == name => {}
                    Some(kept) => {
                        warn!("`{token}` could refer to `{kept}` or `{name}`; using `{kept}`");
                        conflicts.push(AliasConflict {
                            token,
                            kept: kept.clone(),
                            rejected: name.clone(),
                        });
                    }
                }
            }
        }

        Self { aliases, conflicts }
    }

    /// The full file name a short name refers to, if it is an alias.
    pub fn canonical(&self, short: &str) -> Option<&str> {
        self.aliases.get(short).map(String::as_str)
    }

    /// Short names that were claimed by more than one file.
    pub fn conflicts(&self) -> &[AliasConflict] {
        &self.conflicts
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(short, full)| (short.as_str(), full.as_str()))
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
