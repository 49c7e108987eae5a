use crate::cli_args::MergeArgs;
use crate::output::{may_write, print_read_failures, write_to_file, write_to_stdout};
use crate::prepare_request;
use anyhow::{Context, Result};
use colored::*;
use ctxmerge_core::{
    AppError, CancellationToken, IgnoreFileCache, LocalFileSystem, MergeOutcome, human_size,
    merge_selection,
};
use std::fs;

pub fn handle_merge_command(args: MergeArgs, quiet: bool) -> Result<()> {
    let (_config, mut request) = prepare_request(&args.paths, &args.workspace, &args.filters)?;

    let options = &mut request.options;
    if args.no_summary {
        options.include_summary = false;
    }
    if args.no_exclusions {
        options.include_exclusion_lists = false;
    }
    if args.timings {
        options.include_timings = true;
    }
    if args.no_tree {
        options.include_tree = false;
    }
    if let Some(text) = &args.instructions {
        options.instructions = Some(text.clone());
    }
    if let Some(path) = &args.instructions_file {
        let text = fs::read_to_string(path).map_err(|e| AppError::FileRead {
            path: path.clone(),
            source: e,
        })?;
        options.instructions = Some(text);
    }
    log::trace!("Merge options after CLI overrides: {:?}", request.options);

    let cache = IgnoreFileCache::new();
    let cancel = CancellationToken::new();
    let outcome = merge_selection(&request, &LocalFileSystem, &cache, &cancel)
        .context("Failed to merge selection")?;

    match outcome {
        MergeOutcome::Merged(merged) => {
            print_read_failures(&merged.report, quiet);
            match &args.output {
                Some(path) => {
                    if !may_write(path, quiet)? {
                        println!("Save cancelled.");
                        return Ok(());
                    }
                    write_to_file(path, &merged.document)?;
                    if !quiet {
                        println!(
                            "{} Merged {} files ({}, ~{} tokens) into: {}",
                            "✅".green(),
                            merged.summary.processed_files.to_string().cyan(),
                            human_size(merged.summary.total_size),
                            merged.summary.estimated_tokens,
                            path.display().to_string().blue()
                        );
                    }
                }
                None => write_to_stdout(&merged.document)?,
            }
        }
        MergeOutcome::Empty(report) => {
            print_read_failures(&report, quiet);
            if !quiet {
                eprintln!(
                    "{} Nothing to merge: {} excluded globally, {} ignored by rules, \
                     {} binary, {} unreadable.",
                    "ℹ️".blue(),
                    report.collection.global_excluded.len(),
                    report.collection.ignore_excluded.len(),
                    report.binary_skipped.len(),
                    report.read_failures.len()
                );
            }
        }
        MergeOutcome::Cancelled => anyhow::bail!(AppError::Cancelled),
    }
    Ok(())
}
