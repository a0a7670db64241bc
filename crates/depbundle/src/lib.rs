use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use depbundle_cli::{Cli, Commands};
use depbundle_settings::FilesystemOptions;

use crate::commands::{ExitStatus, report_error};
use crate::logging::Level;
use crate::printer::Printer;
use crate::settings::{FindSettings, FixSettings, GlobalSettings};

pub(crate) mod commands;
pub(crate) mod logging;
pub(crate) mod printer;
pub(crate) mod settings;
pub(crate) mod warnings;

fn run(cli: Cli) -> Result<ExitStatus> {
    // Load configuration from disk, unless disabled.
    let filesystem = if let Some(config_file) = cli.global_args.config_file.as_ref() {
        Some(FilesystemOptions::from_file(config_file)?)
    } else if cli.global_args.no_config {
        None
    } else {
        let cwd = std::env::current_dir().context("Failed to read the working directory")?;
        FilesystemOptions::find(&cwd)?
    };

    let globals = GlobalSettings::resolve(&cli.global_args, filesystem.as_ref());

    // Configure the `tracing` crate, which controls internal logging.
    logging::setup_logging(Level::from_verbosity(globals.verbose))?;

    // Configure the `Printer`, which controls user-facing output in the CLI.
    let printer = if globals.quiet {
        Printer::Quiet
    } else if globals.verbose > 0 {
        Printer::Verbose
    } else {
        Printer::Default
    };

    // Configure the `warn_user!` macro, which controls user-facing warnings in the CLI.
    if !globals.quiet {
        warnings::enable();
    }

    anstream::ColorChoice::write_global(globals.color.into());

    debug!("depbundle {}", env!("CARGO_PKG_VERSION"));
    debug!(
        "Using a tool timeout of {}s and a concurrency of {}",
        globals.tool_timeout.as_secs(),
        globals.concurrency
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?;

    runtime.block_on(async {
        match *cli.command {
            Commands::Find(args) => {
                let settings = FindSettings::resolve(args, filesystem.as_ref());
                commands::find(settings, &globals, printer).await
            }
            Commands::Fix(args) => {
                let settings = FixSettings::resolve(args);
                commands::fix(settings, &globals, printer).await
            }
        }
    })
}

/// Run `depbundle` with the given command-line arguments.
pub fn main<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    match run(cli) {
        Ok(status) => status.into(),
        Err(err) => {
            report_error(err.as_ref());
            ExitStatus::Error.into()
        }
    }
}
