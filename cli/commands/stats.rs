use crate::cli_args::StatsArgs;
use crate::output::{print_read_failures, print_stats_table};
use crate::prepare_request;
use anyhow::{Context, Result};
use ctxmerge_core::{
    AppError, CancellationToken, IgnoreFileCache, LocalFileSystem, MergeOutcome,
    ProcessingSummary, merge_selection,
};

pub fn handle_stats_command(args: StatsArgs, quiet: bool) -> Result<()> {
    let (_config, mut request) = prepare_request(&args.paths, &args.workspace, &args.filters)?;
    // Stats never prints the document; skip the optional sections.
    request.options.include_summary = false;
    request.options.include_exclusion_lists = false;
    request.options.include_tree = false;

    let outcome = merge_selection(
        &request,
        &LocalFileSystem,
        &IgnoreFileCache::new(),
        &CancellationToken::new(),
    )
    .context("Failed to measure selection")?;

    match outcome {
        MergeOutcome::Merged(merged) => {
            print_read_failures(&merged.report, quiet);
            print_stats_table(&merged.summary, &merged.report)
        }
        MergeOutcome::Empty(report) => {
            print_read_failures(&report, quiet);
            let summary = ProcessingSummary {
                total_files: report.collection.included.len(),
                ..Default::default()
            };
            print_stats_table(&summary, &report)
        }
        MergeOutcome::Cancelled => anyhow::bail!(AppError::Cancelled),
    }
}
