use std::fmt::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::debug;

use depbundle_closure::{
    ClosureExporter, Error, GraphBuilder, InspectionStatus, LibraryNode, LinkageInspector,
    RelocateOptions, detect_version, homebrew_prefix, locate_library, relocate_directory,
};
use depbundle_platform::{Arch, Platform};
use depbundle_process::SystemRunner;

use crate::commands::fix::report_relocation;
use crate::commands::{ExitStatus, elapsed, human_readable_bytes, report_error};
use crate::printer::Printer;
use crate::settings::{FindSettings, GlobalSettings};
use crate::warnings::warn_user;

/// Find the dependency closure of a library, and optionally bundle it.
pub(crate) async fn find(
    settings: FindSettings,
    globals: &GlobalSettings,
    printer: Printer,
) -> Result<ExitStatus> {
    let start = Instant::now();
    let platform = Platform::from_env()?;
    let runner = SystemRunner::new(globals.tool_timeout);

    let root = match locate_library(&settings.library, platform, &runner).await {
        Ok(root) => root,
        Err(err @ Error::NotFound { .. }) => {
            report_error(&err);
            return Ok(ExitStatus::Failure);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to locate `{}`", settings.library));
        }
    };

    let homebrew = if platform == Platform::Macos {
        Some(homebrew_prefix(&runner).await)
    } else {
        None
    };
    let inspector = LinkageInspector::new(platform, &runner)
        .with_homebrew_prefix(homebrew)
        .with_search_paths(settings.search_paths)
        .with_exclude(settings.exclude);
    let graph = GraphBuilder::new(&inspector)
        .with_concurrency(globals.concurrency)
        .build(&root)
        .await
        .with_context(|| format!("Failed to inspect `{}`", root.display()))?;

    for library in graph.libraries() {
        match library.status() {
            InspectionStatus::ToolMissing => warn_user!(
                "Could not inspect `{}`: the linker tool is not installed",
                library.name()
            ),
            InspectionStatus::ToolFailed(reason) => {
                warn_user!("Could not inspect `{}`: {reason}", library.name());
            }
            InspectionStatus::Approximated => warn_user!(
                "The dependencies of `{}` were approximated from the libraries next to it",
                library.name()
            ),
            InspectionStatus::Complete | InspectionStatus::Pending => {}
        }
        if !library.unresolved().is_empty() {
            warn_user!(
                "`{}` references libraries that could not be found: {}",
                library.name(),
                library.unresolved().join(", ")
            );
        }
    }

    let exporter = ClosureExporter::new(&graph, platform)?;

    let (size, unit) = human_readable_bytes(graph.total_size());
    writeln!(
        printer.stderr(),
        "{}",
        format!(
            "Found {} {} ({size:.1}{unit}) in {}",
            graph.len(),
            if graph.len() == 1 {
                "library"
            } else {
                "libraries"
            },
            elapsed(start.elapsed())
        )
        .dimmed()
    )?;

    let width = exporter
        .libraries()
        .map(|library| library.name().len())
        .max()
        .unwrap_or_default();
    for library in exporter.libraries() {
        let (size, unit) = human_readable_bytes(library.size());
        writeln!(
            printer.stdout(),
            "{}  {:>10}  {}",
            format!("{:width$}", library.name()).bold(),
            format!("{size:.1}{unit}"),
            library.path().display().dimmed()
        )?;
    }

    let tree: Vec<_> = exporter
        .libraries()
        .map(|library| {
            let dependencies = graph
                .dependencies(library.path())
                .into_iter()
                .map(LibraryNode::name)
                .collect::<Vec<_>>();
            (library.name(), dependencies)
        })
        .collect();
    write_dependency_tree(&mut printer.stdout(), &tree)?;

    if let Some(output) = settings.output.as_deref() {
        exporter
            .write_report(output)
            .with_context(|| format!("Failed to write report to `{}`", output.display()))?;
        writeln!(
            printer.stderr(),
            "Wrote report to `{}`",
            output.display().cyan()
        )?;
    }

    let architecture = Arch::from_env().name_for(platform);

    if let Some(script) = settings.generate_script.as_deref() {
        exporter
            .write_script(script, &architecture)
            .with_context(|| format!("Failed to write script to `{}`", script.display()))?;
        writeln!(
            printer.stderr(),
            "Wrote copy script to `{}`",
            script.display().cyan()
        )?;
    }

    let Some(bundle) = settings.copy_to.as_deref() else {
        return Ok(ExitStatus::Success);
    };

    let version = detect_version(&root, &runner).await;
    debug!("Detected version `{version}` for `{}`", root.display());
    let metadata = exporter
        .export(bundle, &version, &architecture)
        .with_context(|| format!("Failed to copy libraries to `{}`", bundle.display()))?;
    writeln!(
        printer.stderr(),
        "Copied {} {} to `{}`",
        metadata.total_count,
        if metadata.total_count == 1 {
            "library"
        } else {
            "libraries"
        },
        bundle.display().cyan()
    )?;

    if !settings.fix_paths {
        return Ok(ExitStatus::Success);
    }

    if platform == Platform::Windows {
        warn_user!(
            "Rewriting library references is not supported on Windows; `{}` was left unchanged",
            bundle.display()
        );
        return Ok(ExitStatus::Success);
    }

    let start = Instant::now();
    let summary = relocate_directory(
        bundle,
        platform,
        &runner,
        RelocateOptions {
            concurrency: globals.concurrency,
            sign: settings.sign,
            verify: true,
        },
    )
    .await
    .with_context(|| format!("Failed to fix `{}`", bundle.display()))?;

    report_relocation(&summary, start, printer)
}

/// The number of direct dependencies listed under each library before the rest are elided.
const TREE_LIMIT: usize = 5;

/// Write each library with its direct dependencies, skipping leaves.
fn write_dependency_tree(
    writer: &mut impl Write,
    libraries: &[(&str, Vec<&str>)],
) -> fmt::Result {
    let mut libraries = libraries
        .iter()
        .filter(|(_, dependencies)| !dependencies.is_empty())
        .peekable();
    if libraries.peek().is_none() {
        return Ok(());
    }

    writeln!(writer)?;
    writeln!(writer, "Dependency tree:")?;
    for (name, dependencies) in libraries {
        writeln!(writer, "  {name}")?;
        for dependency in dependencies.iter().take(TREE_LIMIT) {
            writeln!(writer, "    -> {dependency}")?;
        }
        if dependencies.len() > TREE_LIMIT {
            writeln!(writer, "    ... and {} more", dependencies.len() - TREE_LIMIT)?;
        }
    }
    Ok(())
}
