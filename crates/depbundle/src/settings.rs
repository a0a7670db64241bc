use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use depbundle_cli::{ColorChoice, FindArgs, FixArgs, GlobalArgs};
use depbundle_closure::{LibraryRequest, RelocateOptions, SignMode};
use depbundle_process::SystemRunner;
use depbundle_settings::FilesystemOptions;
use depbundle_static::EnvVars;

/// The resolved global settings to use for any invocation of the CLI.
#[derive(Debug, Clone)]
pub(crate) struct GlobalSettings {
    pub(crate) quiet: bool,
    pub(crate) verbose: u8,
    pub(crate) color: ColorChoice,
    pub(crate) tool_timeout: Duration,
    pub(crate) concurrency: usize,
}

impl GlobalSettings {
    /// Resolve the [`GlobalSettings`] from the CLI and filesystem configuration.
    ///
    /// Command-line arguments and their environment variables take precedence over the
    /// configuration file.
    pub(crate) fn resolve(args: &GlobalArgs, filesystem: Option<&FilesystemOptions>) -> Self {
        let tool_timeout = args
            .tool_timeout
            .map(Duration::from_secs)
            .or_else(|| filesystem.and_then(|options| options.tool_timeout()))
            .unwrap_or(SystemRunner::DEFAULT_TIMEOUT);
        let concurrency = args
            .concurrency
            .and_then(|concurrency| usize::try_from(concurrency).ok())
            .or_else(|| filesystem.and_then(|options| options.concurrency))
            .filter(|concurrency| *concurrency > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
            });
        Self {
            quiet: args.quiet,
            verbose: args.verbose,
            color: if let Some(color_choice) = args.color {
                color_choice
            } else if std::env::var_os(EnvVars::NO_COLOR).is_some_and(|value| !value.is_empty()) {
                ColorChoice::Never
            } else if std::env::var_os(EnvVars::FORCE_COLOR)
                .is_some_and(|value| !value.is_empty())
            {
                ColorChoice::Always
            } else {
                ColorChoice::Auto
            },
            tool_timeout,
            concurrency,
        }
    }
}

/// The resolved settings to use for a `find` invocation.
#[derive(Debug, Clone)]
pub(crate) struct FindSettings {
    pub(crate) library: LibraryRequest,
    pub(crate) output: Option<PathBuf>,
    pub(crate) copy_to: Option<PathBuf>,
    pub(crate) fix_paths: bool,
    pub(crate) sign: SignMode,
    pub(crate) generate_script: Option<PathBuf>,
    pub(crate) search_paths: Vec<PathBuf>,
    pub(crate) exclude: Vec<String>,
}

impl FindSettings {
    /// Resolve the [`FindSettings`] from the CLI and filesystem configuration.
    ///
    /// Search paths and exclusions from the command line come first, followed by those from
    /// the configuration file.
    pub(crate) fn resolve(args: FindArgs, filesystem: Option<&FilesystemOptions>) -> Self {
        let FindArgs {
            library,
            output,
            copy_to,
            fix_paths,
            sign_all,
            generate_script,
            mut search_paths,
            mut exclude,
        } = args;

        if let Some(options) = filesystem {
            search_paths.extend(options.search_paths.iter().flatten().cloned());
            exclude.extend(options.exclude.iter().flatten().cloned());
        }

        Self {
            library: LibraryRequest::parse(&library),
            output,
            copy_to,
            fix_paths,
            sign: sign_mode(sign_all),
            generate_script,
            search_paths,
            exclude,
        }
    }
}

/// The resolved settings to use for a `fix` invocation.
#[derive(Debug, Clone)]
pub(crate) struct FixSettings {
    pub(crate) dirs: Vec<PathBuf>,
    pub(crate) sign: SignMode,
    pub(crate) verify: bool,
}

impl FixSettings {
    /// Resolve the [`FixSettings`] from the CLI.
    pub(crate) fn resolve(args: FixArgs) -> Self {
        let FixArgs {
            dirs,
            sign_all,
            no_verify,
        } = args;
        Self {
            dirs,
            sign: sign_mode(sign_all),
            verify: !no_verify,
        }
    }

    pub(crate) fn relocate_options(&self, concurrency: usize) -> RelocateOptions {
        RelocateOptions {
            concurrency,
            sign: self.sign,
            verify: self.verify,
        }
    }
}

fn sign_mode(sign_all: bool) -> SignMode {
    if sign_all {
        SignMode::All
    } else {
        SignMode::Modified
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use depbundle_cli::{Cli, Commands};
    use depbundle_settings::Options;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("depbundle").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_takes_precedence_over_file() {
        let cli = parse(&["--tool-timeout", "5", "fix", "bundle"]);
        let filesystem = FilesystemOptions::from(Options {
            tool_timeout: Some(30),
            concurrency: Some(3),
            ..Options::default()
        });

        let settings = GlobalSettings::resolve(&cli.global_args, Some(&filesystem));
        assert_eq!(settings.tool_timeout, Duration::from_secs(5));
        assert_eq!(settings.concurrency, 3);
    }

    #[test]
    fn defaults() {
        let cli = parse(&["fix", "bundle"]);
        let settings = GlobalSettings::resolve(&cli.global_args, None);
        assert_eq!(settings.tool_timeout, SystemRunner::DEFAULT_TIMEOUT);
        assert!(settings.concurrency >= 1);
    }

    #[test]
    fn search_paths_are_merged() {
        let cli = parse(&["find", "vips", "--search-path", "/cli", "--exclude", "libintl"]);
        let filesystem = FilesystemOptions::from(Options {
            search_paths: Some(vec![PathBuf::from("/config")]),
            exclude: Some(vec!["libiconv".to_string()]),
            ..Options::default()
        });
        let Commands::Find(args) = *cli.command else {
            panic!("expected `find`");
        };

        let settings = FindSettings::resolve(args, Some(&filesystem));
        assert_eq!(
            settings.library,
            LibraryRequest::Name("vips".to_string())
        );
        assert_eq!(
            settings.search_paths,
            [PathBuf::from("/cli"), PathBuf::from("/config")]
        );
        assert_eq!(settings.exclude, ["libintl", "libiconv"]);
        assert_eq!(settings.sign, SignMode::Modified);
    }
}
