use crate::classify::human_size;
use crate::merge::{MergeOptions, MergeReport};
use crate::summary::ProcessingSummary;
use std::fmt::Write as _;

fn listing_entry(relative_path: &str, is_dir: bool) -> String {
    if is_dir {
        format!("- {}/\n", relative_path)
    } else {
        format!("- {}\n", relative_path)
    }
}

fn summary_section(report: &MergeReport, summary: &ProcessingSummary) -> String {
    let collection = &report.collection;
    let mut out = String::from("# Summary\n\n");
    let _ = writeln!(out, "- Files included: {}", summary.total_files);
    let _ = writeln!(out, "- Files merged: {}", summary.processed_files);
    let _ = writeln!(out, "- Total size: {}", human_size(summary.total_size));
    let _ = writeln!(out, "- Estimated tokens: {}", summary.estimated_tokens);
    let _ = writeln!(
        out,
        "- Excluded by global settings: {}",
        collection.global_excluded.len()
    );
    let _ = writeln!(out, "- Ignored by rules: {}", collection.ignore_excluded.len());
    let _ = writeln!(out, "- Binary files skipped: {}", report.binary_skipped.len());
    let _ = writeln!(out, "- Unreadable files: {}", report.read_failures.len());
    out.push('\n');
    out
}

/// `None` when nothing was excluded, skipped or unreadable.
fn exclusions_section(report: &MergeReport) -> Option<String> {
    let collection = &report.collection;
    let mut body = String::new();

    if !collection.global_excluded.is_empty() {
        body.push_str("## Excluded by global settings\n\n");
        for excluded in &collection.global_excluded {
            body.push_str(&listing_entry(&excluded.relative_path, excluded.is_dir));
        }
        body.push('\n');
    }

    let mut grouped: Vec<_> = collection.ignore_exclusions_by_directory().into_iter().collect();
    grouped.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (directory, records) in grouped {
        let _ = writeln!(
            body,
            "## Ignored by rules in {}\n",
            collection.directory_label(directory)
        );
        for record in records {
            body.push_str(&listing_entry(&record.relative_path, record.is_dir));
        }
        body.push('\n');
    }

    if !report.binary_skipped.is_empty() {
        body.push_str("## Binary files skipped\n\n");
        for path in &report.binary_skipped {
            body.push_str(&listing_entry(path, false));
        }
        body.push('\n');
    }

    if !report.read_failures.is_empty() {
        body.push_str("## Unreadable files\n\n");
        for failure in &report.read_failures {
            let _ = writeln!(body, "- {}: {}", failure.relative_path, failure.message);
        }
        body.push('\n');
    }

    if body.is_empty() {
        None
    } else {
        Some(format!("# Excluded Files\n\n{}", body))
    }
}

fn timings_section(summary: &ProcessingSummary) -> String {
    let mut out = String::from("# Timings\n\n");
    for (stage, elapsed) in &summary.timings {
        let _ = writeln!(out, "- {}: {:.2?}", stage, elapsed);
    }
    let _ = writeln!(out, "- total: {:.2?}", summary.total_time());
    out.push('\n');
    out
}

/// Joins the optional sections and the file fragments into one Markdown
/// document, in a fixed order: summary, instructions, exclusions, timings,
/// tree, files.
pub fn assemble_document(
    report: &MergeReport,
    summary: &ProcessingSummary,
    tree: Option<&str>,
    options: &MergeOptions,
) -> String {
    let fragments_len: usize = report.files.iter().map(|f| f.fragment.len()).sum();
    let mut document = String::with_capacity(fragments_len + 1024);

    if options.include_summary {
        document.push_str(&summary_section(report, summary));
    }
    if let Some(instructions) = options
        .instructions
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        document.push_str(instructions.trim_end());
        document.push_str("\n\n");
    }
    if options.include_exclusion_lists {
        if let Some(section) = exclusions_section(report) {
            document.push_str(&section);
        }
    }
    if options.include_timings && !summary.timings.is_empty() {
        document.push_str(&timings_section(summary));
    }
    if options.include_tree {
        if let Some(tree) = tree {
            let _ = write!(document, "# File Tree\n\n```\n{}```\n\n", tree);
        }
    }
    for file in &report.files {
        document.push_str(&file.fragment);
    }
    document
}
