use std::path::{Path, PathBuf};

use fs_err as fs;
use futures::StreamExt;
use futures::stream;
use tracing::{debug, warn};

use depbundle_platform::Platform;
use depbundle_process::ProcessRunner;

use crate::Error;
use crate::alias::{AliasConflict, VersionAliasMap};
use crate::rewrite::{LinkageRewriter, RewriteRecord};
use crate::sign::{SignatureFailure, SignatureManager};

/// Which libraries receive a fresh ad-hoc signature after rewriting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Only libraries whose linkage was changed.
    #[default]
    Modified,
    /// Every library in the directory.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocateOptions {
    /// The maximum number of libraries processed at once.
    pub concurrency: usize,
    pub sign: SignMode,
    /// Verify every signature once all libraries have been rewritten and signed.
    pub verify: bool,
}

impl Default for RelocateOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            sign: SignMode::Modified,
            verify: true,
        }
    }
}

/// A library that could not be rewritten or signed.
#[derive(Debug)]
pub struct RelocationFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// The outcome of relocating one bundle directory.
#[derive(Debug)]
pub struct RelocationSummary {
    pub directory: PathBuf,
    /// Rewrite records for every library that was processed successfully, sorted by path.
    pub records: Vec<RewriteRecord>,
    pub failures: Vec<RelocationFailure>,
    pub signature_failures: Vec<SignatureFailure>,
    pub conflicts: Vec<AliasConflict>,
}

impl RelocationSummary {
    /// The number of libraries whose linkage was changed.
    pub fn modified(&self) -> usize {
        self.records.iter().filter(|record| record.modified()).count()
    }

    /// Returns `true` if every library was rewritten, signed and verified.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.signature_failures.is_empty()
    }
}

/// The libraries in a bundle directory, sorted by path. Symbolic links are skipped.
pub fn bundle_libraries(directory: &Path, platform: Platform) -> Result<Vec<PathBuf>, Error> {
    let mut libraries = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| platform.is_library_name(name))
        {
            libraries.push(entry.path());
        }
    }
    libraries.sort();
    Ok(libraries)
}

/// Make the libraries in `directory` load each other from the directory itself.
///
/// The alias map is built once, before any file is touched. Each library is then rewritten,
/// modified libraries are re-signed, and finally every signature is verified. Failures on
/// individual files are collected in the [`RelocationSummary`] rather than aborting the run.
pub async fn relocate_directory(
    directory: &Path,
    platform: Platform,
    runner: &impl ProcessRunner,
    options: RelocateOptions,
) -> Result<RelocationSummary, Error> {
    if platform == Platform::Windows {
        return Err(Error::Unsupported(platform));
    }

    let libraries = bundle_libraries(directory, platform)?;
    let aliases = VersionAliasMap::from_directory(directory, platform)?;
    debug!(
        "Relocating {} libraries in `{}` ({} aliases)",
        libraries.len(),
        directory.display(),
        aliases.len()
    );

    let rewriter = LinkageRewriter::new(platform, runner);
    let results: Vec<_> = stream::iter(&libraries)
        .map(|path| {
            let rewriter = &rewriter;
            let aliases = &aliases;
            async move { (path, rewriter.rewrite(path, aliases).await) }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(record) => records.push(record),
            Err(error) => {
                warn!("{error}");
                failures.push(RelocationFailure {
                    path: path.clone(),
                    error,
                });
            }
        }
    }
    records.sort_by(|a, b| a.path().cmp(b.path()));

    let mut signature_failures = Vec::new();
    if platform == Platform::Macos {
        let signer = SignatureManager::new(runner);

        let to_sign: Vec<&Path> = match options.sign {
            SignMode::Modified => records
                .iter()
                .filter(|record| record.modified())
                .map(RewriteRecord::path)
                .collect(),
            SignMode::All => records.iter().map(RewriteRecord::path).collect(),
        };
        let signed: Vec<_> = stream::iter(to_sign)
            .map(|path| {
                let signer = &signer;
                async move { (path, signer.sign(path).await) }
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;
        for (path, result) in signed {
            if let Err(error) = result {
                warn!("{error}");
                failures.push(RelocationFailure {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }

        if options.verify {
            signature_failures = signer.verify_all(&libraries, options.concurrency).await;
        }
    }
    failures.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(RelocationSummary {
        directory: directory.to_path_buf(),
        records,
        failures,
        signature_failures,
        conflicts: aliases.conflicts().to_vec(),
    })
}
