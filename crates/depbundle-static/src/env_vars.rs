/// Declares all environment variable used throughout `depbundle` and its crates.
pub struct EnvVars;

impl EnvVars {
    /// Equivalent to the `--tool-timeout` command-line argument. The number of seconds any
    /// single external tool invocation (`otool`, `ldd`, `install_name_tool`, `codesign`, ...)
    /// may run before it is killed and treated as failed.
    pub const DEPBUNDLE_TOOL_TIMEOUT: &'static str = "DEPBUNDLE_TOOL_TIMEOUT";

    /// Equivalent to the `--concurrency` command-line argument. The maximum number of libraries
    /// inspected or rewritten at the same time.
    pub const DEPBUNDLE_CONCURRENCY: &'static str = "DEPBUNDLE_CONCURRENCY";

    /// Equivalent to the `--config-file` command-line argument. Expects a path to a local
    /// `depbundle.toml` file to use as the configuration file.
    pub const DEPBUNDLE_CONFIG_FILE: &'static str = "DEPBUNDLE_CONFIG_FILE";

    /// Equivalent to the `--no-config` command-line argument. If set, `depbundle` will not read
    /// any `depbundle.toml` files.
    pub const DEPBUNDLE_NO_CONFIG: &'static str = "DEPBUNDLE_NO_CONFIG";

    /// The Homebrew installation prefix, used as an `@rpath` search root and when locating
    /// libraries on macOS. When unset, `brew --prefix` is queried.
    pub const HOMEBREW_PREFIX: &'static str = "HOMEBREW_PREFIX";

    /// The root of a vcpkg checkout, searched when locating libraries on Windows.
    pub const VCPKG_ROOT: &'static str = "VCPKG_ROOT";

    /// Disables colored output (takes precedence over `FORCE_COLOR`).
    ///
    /// See [no-color.org](https://no-color.org).
    pub const NO_COLOR: &'static str = "NO_COLOR";

    /// Forces colored output regardless of terminal support.
    ///
    /// See [force-color.org](https://force-color.org).
    pub const FORCE_COLOR: &'static str = "FORCE_COLOR";

    /// If set, `depbundle` will use this value as the log level for its `--verbose` output.
    /// Accepts any filter compatible with the `tracing_subscriber` crate.
    ///
    /// For example:
    ///
    /// * `RUST_LOG=depbundle=debug` is the equivalent of adding `--verbose` to the command line
    /// * `RUST_LOG=trace` will enable trace-level logging.
    pub const RUST_LOG: &'static str = "RUST_LOG";
}
