use std::path::{Path, PathBuf};

use futures::StreamExt;
use futures::stream;
use tracing::{debug, trace};

use depbundle_process::{ProcessRunner, Tool};

use crate::Error;

/// A library whose code signature did not verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Applies and verifies ad-hoc code signatures.
///
/// Rewriting load commands invalidates a Mach-O file's signature, and Apple Silicon refuses to
/// load unsigned code, so every modified library must be re-signed.
pub struct SignatureManager<'a, R> {
    runner: &'a R,
}

impl<'a, R: ProcessRunner> SignatureManager<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Replace any existing signature with an ad-hoc signature.
    pub async fn sign(&self, path: &Path) -> Result<(), Error> {
        trace!("Applying ad-hoc code signature to `{}`", path.display());
        self.runner
            .run_checked(
                &Tool::new("codesign")
                    .args(["--force", "--sign", "-"])
                    .arg(path),
            )
            .await
            .map_err(|err| Error::Sign {
                path: path.to_path_buf(),
                err,
            })?;
        Ok(())
    }

    /// Check the signature of a single library.
    pub async fn verify(&self, path: &Path) -> Result<(), SignatureFailure> {
        let result = self
            .runner
            .run(&Tool::new("codesign").arg("--verify").arg(path))
            .await;
        match result {
            Ok(output) if output.is_success() => Ok(()),
            Ok(output) => Err(SignatureFailure {
                path: path.to_path_buf(),
                reason: output.stderr.trim().to_string(),
            }),
            Err(err) => Err(SignatureFailure {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }),
        }
    }

    /// Verify every library, collecting all failures rather than stopping at the first.
    pub async fn verify_all(&self, paths: &[PathBuf], concurrency: usize) -> Vec<SignatureFailure> {
        let mut failures: Vec<_> = stream::iter(paths)
            .map(|path| self.verify(path))
            .buffer_unordered(concurrency.max(1))
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            "Verified {} signatures ({} failed)",
            paths.len(),
            failures.len()
        );
        failures
    }
}
