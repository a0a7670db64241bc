use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Args, Parser, Subcommand};

use depbundle_static::EnvVars;

// Configures Clap v3-style help menu colors
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser)]
#[command(name = "depbundle", author, version)]
#[command(about = "Collect, bundle and relocate the shared-library closure of a native library.")]
#[command(propagate_version = true)]
#[command(styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Box<Commands>,

    #[command(flatten)]
    pub global_args: Box<GlobalArgs>,
}

#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Global options", next_display_order = 1000)]
pub struct GlobalArgs {
    /// Do not print any output.
    #[arg(global = true, long, short, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Use verbose output.
    ///
    /// You can configure fine-grained logging using the `RUST_LOG` environment variable.
    /// (<https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives>)
    #[arg(global = true, action = clap::ArgAction::Count, long, short, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Control colors in output.
    ///
    /// Defaults to `auto`, unless `NO_COLOR` or `FORCE_COLOR` is set.
    #[arg(global = true, long, value_enum, value_name = "COLOR_CHOICE")]
    pub color: Option<ColorChoice>,

    /// The maximum time, in seconds, any external tool may run before it is killed.
    ///
    /// Defaults to 60 seconds.
    #[arg(global = true, long, env = EnvVars::DEPBUNDLE_TOOL_TIMEOUT, value_name = "SECONDS")]
    pub tool_timeout: Option<u64>,

    /// The maximum number of libraries to inspect or rewrite at once.
    ///
    /// Defaults to the number of available CPUs.
    #[arg(global = true, long, env = EnvVars::DEPBUNDLE_CONCURRENCY, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: Option<u64>,

    /// The path to a `depbundle.toml` file to use for configuration.
    #[arg(global = true, long, env = EnvVars::DEPBUNDLE_CONFIG_FILE)]
    pub config_file: Option<PathBuf>,

    /// Avoid discovering a `depbundle.toml` file.
    ///
    /// Normally, the configuration file is discovered in the current directory or any of its
    /// parents.
    #[arg(global = true, long, env = EnvVars::DEPBUNDLE_NO_CONFIG, value_parser = clap::builder::BoolishValueParser::new())]
    pub no_config: bool,
}

#[derive(Debug, Copy, Clone, clap::ValueEnum)]
pub enum ColorChoice {
    /// Enables colored output only when the output is going to a terminal or TTY with support.
    Auto,

    /// Enables colored output regardless of the detected environment.
    Always,

    /// Disables colored output.
    Never,
}

impl From<ColorChoice> for anstream::ColorChoice {
    fn from(value: ColorChoice) -> Self {
        match value {
            ColorChoice::Auto => Self::Auto,
            ColorChoice::Always => Self::Always,
            ColorChoice::Never => Self::Never,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the dependency closure of a library.
    ///
    /// Optionally writes a JSON report, copies the closure into a bundle directory, rewrites
    /// the bundle's references to be self-contained, and generates a copy script.
    Find(FindArgs),

    /// Rewrite the references of an existing bundle directory.
    ///
    /// Each directory is processed independently. On macOS, modified libraries are re-signed and
    /// every library is verified.
    Fix(FixArgs),
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct FindArgs {
    /// The library to inspect: a path, or a bare name such as `vips` or `libpng16`.
    pub library: String,

    /// Write a JSON report of the closure to the given file.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Copy every library in the closure into the given directory.
    #[arg(long, short = 'c', value_name = "DIR")]
    pub copy_to: Option<PathBuf>,

    /// Rewrite the references of the copied libraries so the bundle is self-contained.
    #[arg(long, requires = "copy_to")]
    pub fix_paths: bool,

    /// Re-sign every library in the bundle, not only the modified ones.
    #[arg(long, requires = "fix_paths")]
    pub sign_all: bool,

    /// Write a shell script that copies the closure to a destination directory.
    #[arg(long, value_name = "PATH")]
    pub generate_script: Option<PathBuf>,

    /// An extra directory to search for libraries that can't be resolved otherwise.
    #[arg(long = "search-path", value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Never follow references containing the given substring.
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FixArgs {
    /// The bundle directories to fix.
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,

    /// Re-sign every library, not only the modified ones.
    #[arg(long)]
    pub sign_all: bool,

    /// Skip signature verification.
    #[arg(long)]
    pub no_verify: bool,
}
