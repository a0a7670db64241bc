use std::fmt::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use depbundle_closure::{RelocationSummary, relocate_directory};
use depbundle_platform::Platform;
use depbundle_process::SystemRunner;

use crate::commands::{ExitStatus, elapsed, report_error};
use crate::printer::Printer;
use crate::settings::{FixSettings, GlobalSettings};
use crate::warnings::warn_user;

/// Rewrite the references of one or more bundle directories.
///
/// Every directory is processed with its own alias map. A failure in one directory doesn't stop
/// the others from being processed.
pub(crate) async fn fix(
    settings: FixSettings,
    globals: &GlobalSettings,
    printer: Printer,
) -> Result<ExitStatus> {
    let platform = Platform::from_env()?;
    let runner = SystemRunner::new(globals.tool_timeout);
    let options = settings.relocate_options(globals.concurrency);

    let mut status = ExitStatus::Success;
    for directory in &settings.dirs {
        if !directory.is_dir() {
            report_error(&*anyhow::anyhow!(
                "Directory not found: `{}`",
                directory.display()
            ));
            status = ExitStatus::Failure;
            continue;
        }

        let start = Instant::now();
        let summary = relocate_directory(directory, platform, &runner, options)
            .await
            .with_context(|| format!("Failed to fix `{}`", directory.display()))?;
        if report_relocation(&summary, start, printer)? != ExitStatus::Success {
            status = ExitStatus::Failure;
        }
    }

    Ok(status)
}

/// Print the outcome of relocating a directory.
pub(super) fn report_relocation(
    summary: &RelocationSummary,
    start: Instant,
    printer: Printer,
) -> Result<ExitStatus> {
    for conflict in &summary.conflicts {
        warn_user!(
            "`{}` matches both `{}` and `{}`; using `{}`",
            conflict.token,
            conflict.kept,
            conflict.rejected,
            conflict.kept
        );
    }

    for record in &summary.records {
        let name = record
            .path()
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        for change in record.changes() {
            writeln!(
                printer.stdout(),
                "{} {}: {} {} {}",
                name.bold(),
                change.kind,
                change.old.red(),
                "->".dimmed(),
                change.new.green()
            )?;
        }
    }

    let processed = summary.records.len() + summary.failures.len();
    writeln!(
        printer.stderr(),
        "{}",
        format!(
            "Rewrote {} of {processed} libraries in `{}` in {}",
            summary.modified(),
            summary.directory.display(),
            elapsed(start.elapsed())
        )
        .dimmed()
    )?;

    for failure in &summary.failures {
        report_error(&failure.error);
    }
    for failure in &summary.signature_failures {
        report_error(&*anyhow::anyhow!(
            "Signature verification failed for `{}`: {}",
            failure.path.display(),
            failure.reason
        ));
    }

    if summary.is_success() {
        Ok(ExitStatus::Success)
    } else {
        Ok(ExitStatus::Failure)
    }
}
