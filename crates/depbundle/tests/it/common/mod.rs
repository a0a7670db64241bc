use assert_cmd::Command;
use assert_fs::TempDir;

/// An isolated working directory for running `depbundle`.
pub(crate) struct TestContext {
    pub(crate) temp_dir: TempDir,
}

impl TestContext {
    pub(crate) fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// A `depbundle` command running in the context's directory, unaffected by the caller's
    /// environment.
    pub(crate) fn command(&self) -> Command {
        let mut command = Command::cargo_bin("depbundle").unwrap();
        command
            .current_dir(self.temp_dir.path())
            .env_remove("DEPBUNDLE_TOOL_TIMEOUT")
            .env_remove("DEPBUNDLE_CONCURRENCY")
            .env_remove("DEPBUNDLE_CONFIG_FILE")
            .env_remove("DEPBUNDLE_NO_CONFIG")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1");
        command
    }

    pub(crate) fn find(&self) -> Command {
        let mut command = self.command();
        command.arg("find");
        command
    }

    pub(crate) fn fix(&self) -> Command {
        let mut command = self.command();
        command.arg("fix");
        command
    }
}
