use crate::aggregate::assemble_document;
use crate::cancel::CancellationToken;
use crate::classify::{FileOutcome, ProcessedFileResult, read_candidate};
use crate::collect::{CollectContext, CollectionReport, SelectionRoot, collect_selection};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::fs::FileSystem;
use crate::global_exclude::GlobalExcluder;
use crate::ignore_files::{IgnoreFileCache, IgnoreHierarchy, IgnoreLocator};
use crate::summary::ProcessingSummary;
use crate::tree::summarize_paths;
use rayon::prelude::*;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Per-run switches. Built from a [`Config`] plus any caller overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    pub exclude_patterns: Vec<String>,
    pub use_ignore_files: bool,
    pub include_summary: bool,
    pub instructions: Option<String>,
    pub include_exclusion_lists: bool,
    pub include_timings: bool,
    pub include_tree: bool,
}

impl MergeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            exclude_patterns: config.effective_exclude_patterns(),
            use_ignore_files: config.general.use_ignore_files,
            include_summary: config.output.include_summary,
            instructions: config.effective_instructions().map(str::to_string),
            include_exclusion_lists: config.output.include_exclusion_lists,
            include_timings: config.output.include_timings,
            include_tree: config.output.include_tree,
        }
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub workspace_root: PathBuf,
    pub roots: Vec<SelectionRoot>,
    pub options: MergeOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ReadFailure {
    pub relative_path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct MergeReport {
    pub collection: CollectionReport,
    /// Text files merged into the document, sorted by relative path.
    pub files: Vec<ProcessedFileResult>,
    pub binary_skipped: Vec<String>,
    pub read_failures: Vec<ReadFailure>,
}

#[derive(Debug, Clone)]
pub struct MergedDocument {
    pub document: String,
    pub summary: ProcessingSummary,
    pub report: MergeReport,
}

#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Merged(MergedDocument),
    /// Nothing survived filtering; the report says why.
    Empty(MergeReport),
    /// No document is produced.
    Cancelled,
}

/// Resolves user-supplied paths to selection roots.
///
/// Paths that cannot be stat'ed are dropped with a warning. Fails only when
/// none of them can be used.
pub fn resolve_roots(fs: &dyn FileSystem, paths: &[PathBuf]) -> Result<Vec<SelectionRoot>> {
    let mut roots = Vec::with_capacity(paths.len());
    for path in paths {
        match SelectionRoot::resolve(fs, path) {
            Ok(root) => roots.push(root),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    if roots.is_empty() {
        return Err(AppError::NoUsableRoots(
            "none of the selected paths could be stat'ed".to_string(),
        ));
    }
    Ok(roots)
}

fn with_collect_context<T>(
    workspace_root: &Path,
    options: &MergeOptions,
    fs: &dyn FileSystem,
    cache: &IgnoreFileCache,
    cancel: &CancellationToken,
    summary: &mut ProcessingSummary,
    f: impl FnOnce(&CollectContext<'_>) -> Result<T>,
) -> Result<T> {
    cache.clear();
    let excluder = summary.time("exclusions", || GlobalExcluder::new(&options.exclude_patterns))?;
    let hierarchy = options
        .use_ignore_files
        .then(|| IgnoreHierarchy::new(IgnoreLocator::new(fs, workspace_root, cache)));
    let ctx = CollectContext {
        fs,
        workspace_root,
        excluder: &excluder,
        hierarchy: hierarchy.as_ref(),
        cancel,
    };
    summary.time("collect", || f(&ctx))
}

/// Runs collection only. Used to explain why paths are or are not merged.
pub fn explain_selection(
    request: &MergeRequest,
    fs: &dyn FileSystem,
    cache: &IgnoreFileCache,
    cancel: &CancellationToken,
) -> Result<CollectionReport> {
    let mut summary = ProcessingSummary::default();
    with_collect_context(
        &request.workspace_root,
        &request.options,
        fs,
        cache,
        cancel,
        &mut summary,
        |ctx| collect_selection(&request.roots, ctx),
    )
}

fn read_all(
    collection: CollectionReport,
    fs: &dyn FileSystem,
    cancel: &CancellationToken,
) -> Result<MergeReport> {
    let outcomes: Vec<FileOutcome> = collection
        .included
        .par_iter()
        .map(|file| -> Result<FileOutcome> {
            cancel.check()?;
            Ok(read_candidate(fs, file))
        })
        .collect::<Result<_>>()?;

    let mut report = MergeReport {
        collection,
        ..Default::default()
    };
    for (file, outcome) in report.collection.included.iter().zip(outcomes) {
        match outcome {
            FileOutcome::Text(result) => report.files.push(result),
            FileOutcome::Binary => report.binary_skipped.push(file.relative_path.clone()),
            FileOutcome::Failed(message) => report.read_failures.push(ReadFailure {
                relative_path: file.relative_path.clone(),
                message,
            }),
        }
    }
    Ok(report)
}

fn run_merge(
    request: &MergeRequest,
    fs: &dyn FileSystem,
    cache: &IgnoreFileCache,
    cancel: &CancellationToken,
) -> Result<MergeOutcome> {
    let started = Instant::now();
    let options = &request.options;
    let mut summary = ProcessingSummary::default();

    let collection = with_collect_context(
        &request.workspace_root,
        options,
        fs,
        cache,
        cancel,
        &mut summary,
        |ctx| collect_selection(&request.roots, ctx),
    )?;
    summary.total_files = collection.included.len();

    let report = summary.time("read", || read_all(collection, fs, cancel))?;
    summary.processed_files = report.files.len();
    summary.total_size = report.files.iter().map(|f| f.size).sum();
    summary.estimated_tokens = report.files.iter().map(|f| f.estimated_tokens).sum();

    if report.files.is_empty() {
        log::info!("No text files left to merge.");
        return Ok(MergeOutcome::Empty(report));
    }

    let tree = if options.include_tree {
        let paths: Vec<String> = report.files.iter().map(|f| f.relative_path.clone()).collect();
        summary.time("tree", || summarize_paths(&paths))
    } else {
        None
    };

    cancel.check()?;
    let assembly_started = Instant::now();
    let document = assemble_document(&report, &summary, tree.as_deref(), options);
    summary.record_timing("assemble", assembly_started.elapsed());

    log::info!(
        "Merged {} files (~{} tokens) in {:?}.",
        summary.processed_files,
        summary.estimated_tokens,
        started.elapsed()
    );
    Ok(MergeOutcome::Merged(MergedDocument {
        document,
        summary,
        report,
    }))
}

/// Collects, filters, reads and assembles the selection into one document.
///
/// The ignore-file cache is cleared first so edits since the previous run are
/// seen. Cancellation is polled on every path and every file read; a
/// cancelled run yields [`MergeOutcome::Cancelled`] and no document.
pub fn merge_selection(
    request: &MergeRequest,
    fs: &dyn FileSystem,
    cache: &IgnoreFileCache,
    cancel: &CancellationToken,
) -> Result<MergeOutcome> {
    match run_merge(request, fs, cache, cancel) {
        Err(AppError::Cancelled) => {
            log::info!("Merge cancelled.");
            Ok(MergeOutcome::Cancelled)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use std::fs;
    use tempfile::TempDir;

    fn workspace(files: &[(&str, &[u8])]) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        (temp_dir, root)
    }

    fn request(root: &Path) -> MergeRequest {
        MergeRequest {
            workspace_root: root.to_path_buf(),
            roots: vec![SelectionRoot::directory(root)],
            options: MergeOptions {
                exclude_patterns: Vec::new(),
                ..MergeOptions::default()
            },
        }
    }

    #[test]
    fn merged_outcome_reports_binary_and_counts() {
        let (_guard, root) = workspace(&[
            ("src/a.rs", b"fn a() {}"),
            ("src/b.rs", b"fn b() {}"),
            ("blob", &[0, 1, 2]),
        ]);
        let outcome = merge_selection(
            &request(&root),
            &LocalFileSystem,
            &IgnoreFileCache::new(),
            &CancellationToken::new(),
        )
        .unwrap();

        let MergeOutcome::Merged(merged) = outcome else {
            panic!("expected a merged document");
        };
        assert_eq!(merged.summary.total_files, 3);
        assert_eq!(merged.summary.processed_files, 2);
        assert_eq!(merged.report.binary_skipped, vec!["blob".to_string()]);
        assert!(merged.document.contains("## Binary files skipped\n\n- blob\n"));
        assert!(merged.document.contains("# File Tree"));
        assert!(merged.summary.timings.contains_key("collect"));
    }

    #[test]
    fn only_binary_files_is_empty() {
        let (_guard, root) = workspace(&[("blob", &[0, 1, 2])]);
        let outcome = merge_selection(
            &request(&root),
            &LocalFileSystem,
            &IgnoreFileCache::new(),
            &CancellationToken::new(),
        )
        .unwrap();
        match outcome {
            MergeOutcome::Empty(report) => assert_eq!(report.binary_skipped.len(), 1),
            other => panic!("expected empty outcome, got {:?}", other),
        }
    }

    #[test]
    fn cache_is_cleared_between_runs() {
        let (_guard, root) = workspace(&[("a.txt", b"a"), ("b.txt", b"b")]);
        let cache = IgnoreFileCache::new();
        let cancel = CancellationToken::new();

        let first = explain_selection(&request(&root), &LocalFileSystem, &cache, &cancel).unwrap();
        assert_eq!(first.included.len(), 2);

        fs::write(root.join(".gitignore"), "b.txt\n").unwrap();
        let second = explain_selection(&request(&root), &LocalFileSystem, &cache, &cancel).unwrap();
        let included: Vec<_> = second.included.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(included, vec![".gitignore", "a.txt"]);
        assert_eq!(second.ignore_excluded.len(), 1);
    }

    #[test]
    fn ignore_files_can_be_disabled() {
        let (_guard, root) = workspace(&[(".gitignore", b"*.txt\n"), ("a.txt", b"a")]);
        let mut req = request(&root);
        req.options.use_ignore_files = false;
        let report = explain_selection(
            &req,
            &LocalFileSystem,
            &IgnoreFileCache::new(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(report.included.len(), 2);
        assert!(report.ignore_excluded.is_empty());
    }

    #[test]
    fn cancelled_before_start_produces_no_document() {
        let (_guard, root) = workspace(&[("a.txt", b"a")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome =
            merge_selection(&request(&root), &LocalFileSystem, &IgnoreFileCache::new(), &cancel)
                .unwrap();
        assert!(matches!(outcome, MergeOutcome::Cancelled));
    }

    #[test]
    fn unresolvable_roots_are_dropped() {
        let (_guard, root) = workspace(&[("a.txt", b"a")]);
        let roots =
            resolve_roots(&LocalFileSystem, &[root.join("a.txt"), root.join("missing")]).unwrap();
        assert_eq!(roots, vec![SelectionRoot::file(root.join("a.txt"))]);
        assert!(matches!(
            resolve_roots(&LocalFileSystem, &[root.join("missing")]),
            Err(AppError::NoUsableRoots(_))
        ));
    }
}
