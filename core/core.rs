pub mod aggregate;
pub mod cancel;
pub mod classify;
pub mod collect;
pub mod config;
pub mod error;
pub mod fs;
pub mod global_exclude;
pub mod ignore_files;
pub mod ignore_rules;
pub mod merge;
pub mod summary;
pub mod tree;

pub use cancel::CancellationToken;
pub use classify::{ContentKind, ProcessedFileResult, classify, estimate_tokens, human_size};
pub use collect::{
    CollectedFile, CollectionReport, ExcludedPath, ExclusionRecord, RootKind, SelectionRoot,
    SkippedRoot,
};
pub use config::Config;
pub use error::{AppError, Result};
pub use fs::{FileSystem, LocalFileSystem};
pub use global_exclude::{DEFAULT_EXCLUDE_PATTERNS, GlobalExcluder, default_exclude_patterns};
pub use ignore_files::{GENERIC_IGNORE_FILE, IgnoreFileCache, TOOL_IGNORE_FILE};
pub use merge::{
    MergeOptions, MergeOutcome, MergeReport, MergeRequest, MergedDocument, ReadFailure,
    explain_selection, merge_selection, resolve_roots,
};
pub use summary::ProcessingSummary;
pub use tree::{NodeKind, TreeNode, build_tree_from_paths, render_ascii_tree};
