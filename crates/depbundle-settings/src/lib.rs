use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// The name of the configuration file.
pub const CONFIG_FILE: &str = "depbundle.toml";

/// The options that can be set in a `depbundle.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    /// Extra directories to search when a reference can't be resolved next to the library that
    /// declares it.
    ///
    /// Relative paths are resolved against the directory containing the configuration file.
    pub search_paths: Option<Vec<PathBuf>>,
    /// Substrings of library references that should never be followed.
    pub exclude: Option<Vec<String>>,
    /// The timeout for a single invocation of an external tool, in seconds.
    pub tool_timeout: Option<u64>,
    /// The maximum number of tool invocations to run at once.
    pub concurrency: Option<usize>,
}

impl Options {
    /// The tool timeout, if set.
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout.map(Duration::from_secs)
    }

    /// Resolve any relative search paths against `root`.
    #[must_use]
    fn relative_to(self, root: &Path) -> Self {
        Self {
            search_paths: self.search_paths.map(|paths| {
                paths
                    .into_iter()
                    .map(|path| {
                        if path.is_absolute() {
                            path
                        } else {
                            root.join(path)
                        }
                    })
                    .collect()
            }),
            ..self
        }
    }
}

/// The [`Options`] as loaded from a configuration file on disk.
#[derive(Debug, Clone)]
pub struct FilesystemOptions(Options);

impl FilesystemOptions {
    /// Convert the [`FilesystemOptions`] into [`Options`].
    pub fn into_options(self) -> Options {
        self.0
    }

    /// Find the [`FilesystemOptions`] for the given path.
    ///
    /// The search starts at the given path and goes up the directory tree until a
    /// `depbundle.toml` file is found.
    pub fn find(path: &Path) -> Result<Option<Self>, Error> {
        for ancestor in path.ancestors() {
            if let Some(options) = Self::from_directory(ancestor)? {
                return Ok(Some(options));
            }
        }
        Ok(None)
    }

    /// Load a [`FilesystemOptions`] from a `depbundle.toml` file in the given directory.
    pub fn from_directory(dir: &Path) -> Result<Option<Self>, Error> {
        let path = dir.join(CONFIG_FILE);
        match read_file(&path) {
            Ok(options) => {
                tracing::debug!("Found configuration at `{}`", path.display());
                Ok(Some(Self(options)))
            }
            Err(Error::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Load a [`FilesystemOptions`] from an explicit configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::debug!("Reading configuration from: `{}`", path.display());
        Ok(Self(read_file(path)?))
    }
}

impl Deref for FilesystemOptions {
    type Target = Options;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Options> for FilesystemOptions {
    fn from(options: Options) -> Self {
        Self(options)
    }
}

/// Load [`Options`] from a `depbundle.toml` file.
fn read_file(path: &Path) -> Result<Options, Error> {
    let content = fs_err::read_to_string(path)?;
    let options = toml::from_str::<Options>(&content)
        .map_err(|err| Error::Toml(path.to_path_buf(), Box::new(err)))?;
    let options = if let Some(parent) = std::path::absolute(path)?.parent() {
        options.relative_to(parent)
    } else {
        options
    };
    Ok(options)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse: `{}`", _0.display())]
    Toml(PathBuf, #[source] Box<toml::de::Error>),
}
