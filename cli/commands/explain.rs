use crate::cli_args::ExplainArgs;
use crate::output::write_to_stdout;
use crate::prepare_request;
use anyhow::{Context, Result};
use colored::*;
use ctxmerge_core::{
    CancellationToken, CollectionReport, Config, IgnoreFileCache, LocalFileSystem,
    explain_selection,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplainInfo<'a> {
    effective_excludes: Vec<String>,
    use_ignore_files: bool,
    report: &'a CollectionReport,
}

pub fn handle_explain_command(args: ExplainArgs, _quiet: bool) -> Result<()> {
    let (config, request) = prepare_request(&args.paths, &args.workspace, &args.filters)?;

    let report = explain_selection(
        &request,
        &LocalFileSystem,
        &IgnoreFileCache::new(),
        &CancellationToken::new(),
    )
    .context("Failed to collect selection")?;

    if args.json {
        let info = ExplainInfo {
            effective_excludes: config.effective_exclude_patterns(),
            use_ignore_files: config.general.use_ignore_files,
            report: &report,
        };
        let content =
            serde_json::to_string_pretty(&info).context("Failed to serialize explain output")?;
        write_to_stdout(&content)
    } else {
        print_explain_pretty(&config, &report);
        Ok(())
    }
}

fn print_path_list(title: &str, paths: &[String]) {
    println!("{}", format!("\n--- {} ---", title).green().bold().underline());
    if paths.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        for p in paths {
            println!("  {}", p.cyan());
        }
    }
}

fn display_path(relative_path: &str, is_dir: bool) -> String {
    if is_dir {
        format!("{}/", relative_path)
    } else {
        relative_path.to_string()
    }
}

fn print_explain_pretty(config: &Config, report: &CollectionReport) {
    println!(
        "{} {}",
        "Workspace:".green().bold(),
        report.workspace_root.display().to_string().blue()
    );
    println!(
        "{} {}",
        "Ignore files:".green().bold(),
        if config.general.use_ignore_files {
            "enabled".normal()
        } else {
            "disabled".yellow()
        }
    );

    for skipped in &report.skipped_roots {
        let shown = pathdiff::diff_paths(&skipped.path, &report.workspace_root)
            .unwrap_or_else(|| skipped.path.clone());
        println!(
            "{} {} ({})",
            "Skipped:".yellow(),
            shown.display(),
            skipped.reason.dimmed()
        );
    }

    let included: Vec<String> = report.included.iter().map(|f| f.relative_path.clone()).collect();
    print_path_list("Included", &included);

    let globals: Vec<String> = report
        .global_excluded
        .iter()
        .map(|e| display_path(&e.relative_path, e.is_dir))
        .collect();
    print_path_list("Excluded by global settings", &globals);

    for (directory, records) in report.ignore_exclusions_by_directory() {
        let paths: Vec<String> = records
            .iter()
            .map(|r| display_path(&r.relative_path, r.is_dir))
            .collect();
        print_path_list(
            &format!("Ignored by rules in {}", report.directory_label(directory)),
            &paths,
        );
    }
    println!();
}
