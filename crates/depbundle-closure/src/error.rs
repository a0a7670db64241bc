use std::io;
use std::path::PathBuf;

use depbundle_platform::Platform;
use depbundle_process::ToolError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Library `{library}` was not found on {platform}")]
    NotFound { library: String, platform: Platform },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(
        "Two libraries share the file name `{name}` and cannot be copied into one directory: `{}` and `{}`",
        first.display(),
        second.display()
    )]
    NameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Rewriting library linkage is not supported on {0}")]
    Unsupported(Platform),

    #[error("Failed to rewrite the linkage of `{}`", path.display())]
    Rewrite {
        path: PathBuf,
        #[source]
        err: ToolError,
    },

    #[error("Failed to sign `{}`", path.display())]
    Sign {
        path: PathBuf,
        #[source]
        err: ToolError,
    },
}
