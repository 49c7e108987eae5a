use crate::cancel::CancellationToken;
use crate::error::{AppError, Result};
use crate::fs::{EntryKind, FileSystem};
use crate::global_exclude::GlobalExcluder;
use crate::ignore_files::IgnoreHierarchy;
use crate::ignore_rules::to_posix;
use indexmap::IndexMap;
use rayon::prelude::*;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "lowercase"))]
pub enum RootKind {
    File,
    Directory,
}

/// One path the user selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRoot {
    pub path: PathBuf,
    pub kind: RootKind,
}

impl SelectionRoot {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RootKind::File,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: RootKind::Directory,
        }
    }

    /// Canonicalizes `path` and stats it to find out what it is.
    pub fn resolve(fs: &dyn FileSystem, path: &Path) -> std::io::Result<Self> {
        let canonical = fs.canonicalize(path)?;
        let stat = fs.stat(&canonical)?;
        let kind = match stat.kind {
            EntryKind::Directory => RootKind::Directory,
            _ => RootKind::File,
        };
        Ok(Self {
            path: canonical,
            kind,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct CollectedFile {
    pub absolute_path: PathBuf,
    pub relative_path: String,
}

/// A path removed by the global exclude patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ExcludedPath {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub is_dir: bool,
}

/// A path removed by the ignore files of `reason_directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ExclusionRecord {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub is_dir: bool,
    pub reason_directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct SkippedRoot {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct CollectionReport {
    pub workspace_root: PathBuf,
    pub included: Vec<CollectedFile>,
    pub global_excluded: Vec<ExcludedPath>,
    pub ignore_excluded: Vec<ExclusionRecord>,
    pub skipped_roots: Vec<SkippedRoot>,
}

impl CollectionReport {
    /// Workspace-relative label of an ignore-rule owner, `.` for the root.
    pub fn directory_label(&self, directory: &Path) -> String {
        match directory.strip_prefix(&self.workspace_root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => format!("{}/", to_posix(rel)),
            Err(_) => directory.display().to_string(),
        }
    }

    /// Ignore exclusions grouped by owning directory, in first-seen order.
    pub fn ignore_exclusions_by_directory(&self) -> IndexMap<&Path, Vec<&ExclusionRecord>> {
        let mut grouped: IndexMap<&Path, Vec<&ExclusionRecord>> = IndexMap::new();
        for record in &self.ignore_excluded {
            grouped
                .entry(record.reason_directory.as_path())
                .or_default()
                .push(record);
        }
        grouped
    }
}

/// Everything the walker consults. Immutable for the duration of a run.
pub struct CollectContext<'a> {
    pub fs: &'a dyn FileSystem,
    pub workspace_root: &'a Path,
    pub excluder: &'a GlobalExcluder,
    /// `None` when ignore files are disabled.
    pub hierarchy: Option<&'a IgnoreHierarchy<'a>>,
    pub cancel: &'a CancellationToken,
}

#[derive(Debug, Default)]
struct Subtree {
    included: Vec<CollectedFile>,
    global_excluded: Vec<ExcludedPath>,
    ignore_excluded: Vec<ExclusionRecord>,
}

impl Subtree {
    fn absorb(&mut self, other: Subtree) {
        self.included.extend(other.included);
        self.global_excluded.extend(other.global_excluded);
        self.ignore_excluded.extend(other.ignore_excluded);
    }
}

impl CollectContext<'_> {
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.workspace_root)
            .map(to_posix)
            .unwrap_or_else(|_| path.to_string_lossy().into_owned())
    }

    fn visit(&self, path: &Path, is_dir: bool) -> Result<Subtree> {
        self.cancel.check()?;
        let mut subtree = Subtree::default();
        let relative_path = self.relative(path);

        if self.excluder.is_excluded(Path::new(&relative_path), is_dir) {
            log::trace!("Excluded by global settings: {}", relative_path);
            subtree.global_excluded.push(ExcludedPath {
                absolute_path: path.to_path_buf(),
                relative_path,
                is_dir,
            });
            return Ok(subtree);
        }

        if let Some(reason_directory) = self.hierarchy.and_then(|h| h.check(path, is_dir)) {
            subtree.ignore_excluded.push(ExclusionRecord {
                absolute_path: path.to_path_buf(),
                relative_path,
                is_dir,
                reason_directory,
            });
            return Ok(subtree);
        }

        if !is_dir {
            log::trace!("Collected: {}", relative_path);
            subtree.included.push(CollectedFile {
                absolute_path: path.to_path_buf(),
                relative_path,
            });
            return Ok(subtree);
        }

        let mut entries = match self.fs.read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Could not read directory {}: {}", path.display(), e);
                return Ok(subtree);
            }
        };
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let children: Vec<Subtree> = entries
            .par_iter()
            .map(|entry| -> Result<Subtree> {
                let child_is_dir = match entry.kind {
                    EntryKind::Directory => true,
                    EntryKind::File => false,
                    EntryKind::Symlink => match self.fs.stat(&entry.path) {
                        Ok(stat) if stat.kind == EntryKind::File => false,
                        Ok(_) => {
                            log::debug!("Not following symlink: {}", entry.path.display());
                            return Ok(Subtree::default());
                        }
                        Err(e) => {
                            log::warn!("Broken symlink {}: {}", entry.path.display(), e);
                            return Ok(Subtree::default());
                        }
                    },
                    EntryKind::Other => return Ok(Subtree::default()),
                };
                self.visit(&entry.path, child_is_dir)
            })
            .collect::<Result<_>>()?;

        for child in children {
            subtree.absorb(child);
        }
        Ok(subtree)
    }
}

/// Walks every selection root and sorts each path into included, globally
/// excluded or ignored.
///
/// Each list is deduplicated by absolute path and sorted by relative path, so
/// the result does not depend on root order or on traversal scheduling.
/// Exclusions below an excluded directory are dropped, since that directory
/// already accounts for them.
pub fn collect_selection(
    roots: &[SelectionRoot],
    ctx: &CollectContext<'_>,
) -> Result<CollectionReport> {
    if roots.is_empty() {
        return Err(AppError::NoUsableRoots("no paths were selected".to_string()));
    }

    let mut report = CollectionReport {
        workspace_root: ctx.workspace_root.to_path_buf(),
        ..Default::default()
    };
    let mut included: IndexMap<PathBuf, CollectedFile> = IndexMap::new();
    let mut global_excluded: IndexMap<PathBuf, ExcludedPath> = IndexMap::new();
    let mut ignore_excluded: IndexMap<PathBuf, ExclusionRecord> = IndexMap::new();

    for root in roots {
        ctx.cancel.check()?;
        if !root.path.starts_with(ctx.workspace_root) {
            log::warn!(
                "Skipping {}: outside the workspace root {}",
                root.path.display(),
                ctx.workspace_root.display()
            );
            report.skipped_roots.push(SkippedRoot {
                path: root.path.clone(),
                reason: "outside the workspace root".to_string(),
            });
            continue;
        }

        log::debug!("Collecting from {}", root.path.display());
        let subtree = ctx.visit(&root.path, root.kind == RootKind::Directory)?;
        for file in subtree.included {
            included.entry(file.absolute_path.clone()).or_insert(file);
        }
        for excluded in subtree.global_excluded {
            global_excluded
                .entry(excluded.absolute_path.clone())
                .or_insert(excluded);
        }
        for record in subtree.ignore_excluded {
            ignore_excluded
                .entry(record.absolute_path.clone())
                .or_insert(record);
        }
    }

    if report.skipped_roots.len() == roots.len() {
        return Err(AppError::NoUsableRoots(
            "every selected path lies outside the workspace root".to_string(),
        ));
    }

    let excluded_dirs: HashSet<PathBuf> = global_excluded
        .values()
        .filter(|e| e.is_dir)
        .map(|e| e.absolute_path.clone())
        .chain(
            ignore_excluded
                .values()
                .filter(|r| r.is_dir)
                .map(|r| r.absolute_path.clone()),
        )
        .collect();
    let covered = |path: &Path| path.ancestors().skip(1).any(|a| excluded_dirs.contains(a));
    global_excluded.retain(|path, _| !covered(path));
    ignore_excluded.retain(|path, _| !covered(path));

    report.included = included.into_values().collect();
    report.included.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    report.global_excluded = global_excluded.into_values().collect();
    report
        .global_excluded
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    report.ignore_excluded = ignore_excluded.into_values().collect();
    report
        .ignore_excluded
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    log::info!(
        "Collected {} files ({} excluded globally, {} ignored).",
        report.included.len(),
        report.global_excluded.len(),
        report.ignore_excluded.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use crate::ignore_files::{IgnoreFileCache, IgnoreLocator};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path().canonicalize().unwrap();
            for (rel, content) in files {
                let path = root.join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
            }
            Self {
                _temp_dir: temp_dir,
                root,
            }
        }

        fn collect(&self, roots: &[SelectionRoot], excludes: &[&str]) -> CollectionReport {
            let patterns: Vec<String> = excludes.iter().map(|s| s.to_string()).collect();
            let excluder = GlobalExcluder::new(&patterns).unwrap();
            let cache = IgnoreFileCache::new();
            let hierarchy =
                IgnoreHierarchy::new(IgnoreLocator::new(&LocalFileSystem, &self.root, &cache));
            let cancel = CancellationToken::new();
            let ctx = CollectContext {
                fs: &LocalFileSystem,
                workspace_root: &self.root,
                excluder: &excluder,
                hierarchy: Some(&hierarchy),
                cancel: &cancel,
            };
            collect_selection(roots, &ctx).unwrap()
        }
    }

    fn included(report: &CollectionReport) -> Vec<&str> {
        report
            .included
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect()
    }

    #[test]
    fn walks_directories_recursively_in_name_order() {
        let fx = Fixture::new(&[("b.txt", "b"), ("a/c.txt", "c"), ("a/d/e.txt", "e")]);
        let report = fx.collect(&[SelectionRoot::directory(&fx.root)], &[]);
        assert_eq!(included(&report), vec!["a/c.txt", "a/d/e.txt", "b.txt"]);
    }

    #[test]
    fn folder_and_nested_file_are_deduplicated() {
        let fx = Fixture::new(&[("src/lib.rs", "x"), ("src/main.rs", "y")]);
        let roots = [
            SelectionRoot::directory(fx.root.join("src")),
            SelectionRoot::file(fx.root.join("src/lib.rs")),
        ];
        let report = fx.collect(&roots, &[]);
        assert_eq!(included(&report), vec!["src/lib.rs", "src/main.rs"]);
    }

    #[test]
    fn global_exclusion_stops_descent_and_precedes_ignore_rules() {
        let fx = Fixture::new(&[
            (".gitignore", "vendor/\n*.png\n"),
            ("vendor/lib.js", "v"),
            ("logo.png", "p"),
            ("keep.rs", "k"),
        ]);
        let report = fx.collect(&[SelectionRoot::directory(&fx.root)], &["vendor/", "*.png"]);

        assert_eq!(included(&report), vec![".gitignore", "keep.rs"]);
        let globals: Vec<_> = report
            .global_excluded
            .iter()
            .map(|e| (e.relative_path.as_str(), e.is_dir))
            .collect();
        assert_eq!(globals, vec![("logo.png", false), ("vendor", true)]);
        assert!(report.ignore_excluded.is_empty());
    }

    #[test]
    fn ignored_paths_are_attributed_to_their_directory() {
        let fx = Fixture::new(&[
            (".gitignore", "*.log\n"),
            ("pkg/.ctxmergeignore", "fixtures/\n"),
            ("pkg/fixtures/a.json", "{}"),
            ("pkg/src/run.log", "log"),
            ("pkg/src/run.rs", "rs"),
        ]);
        let report = fx.collect(&[SelectionRoot::directory(fx.root.join("pkg"))], &[]);

        assert_eq!(included(&report), vec!["pkg/.ctxmergeignore", "pkg/src/run.rs"]);
        let grouped = report.ignore_exclusions_by_directory();
        let labels: Vec<_> = grouped
            .iter()
            .map(|(dir, records)| {
                (
                    report.directory_label(dir),
                    records.iter().map(|r| r.relative_path.clone()).collect::<Vec<_>>(),
                )
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                ("pkg/".to_string(), vec!["pkg/fixtures".to_string()]),
                (".".to_string(), vec!["pkg/src/run.log".to_string()]),
            ]
        );
    }

    #[test]
    fn root_order_does_not_change_result() {
        let fx = Fixture::new(&[
            (".gitignore", "tmp/\n"),
            ("a/x.rs", "x"),
            ("a/tmp/y.rs", "y"),
            ("b/z.rs", "z"),
        ]);
        let forward = [
            SelectionRoot::directory(fx.root.join("a")),
            SelectionRoot::directory(fx.root.join("b")),
            SelectionRoot::file(fx.root.join("a/x.rs")),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let first = fx.collect(&forward, &[]);
        let second = fx.collect(&backward, &[]);
        assert_eq!(first.included, second.included);
        assert_eq!(first.ignore_excluded, second.ignore_excluded);
        assert_eq!(included(&first), vec!["a/x.rs", "b/z.rs"]);
    }

    #[test]
    fn file_below_excluded_directory_adds_no_second_record() {
        let fx = Fixture::new(&[
            (".gitignore", "logs/\n"),
            ("logs/run.log", "l"),
            ("node_modules/x.js", "x"),
            ("a.rs", "a"),
        ]);
        let report = fx.collect(
            &[
                SelectionRoot::directory(&fx.root),
                SelectionRoot::file(fx.root.join("logs/run.log")),
                SelectionRoot::file(fx.root.join("node_modules/x.js")),
            ],
            &["node_modules"],
        );

        assert_eq!(included(&report), vec![".gitignore", "a.rs"]);
        let ignored: Vec<_> = report
            .ignore_excluded
            .iter()
            .map(|r| r.relative_path.as_str())
            .collect();
        assert_eq!(ignored, vec!["logs"]);
        let globals: Vec<_> = report
            .global_excluded
            .iter()
            .map(|e| e.relative_path.as_str())
            .collect();
        assert_eq!(globals, vec!["node_modules"]);
    }

    #[test]
    fn roots_outside_workspace_are_skipped() {
        let fx = Fixture::new(&[("ws/a.txt", "a"), ("elsewhere/b.txt", "b")]);
        let workspace = fx.root.join("ws");
        let excluder = GlobalExcluder::empty();
        let cancel = CancellationToken::new();
        let ctx = CollectContext {
            fs: &LocalFileSystem,
            workspace_root: &workspace,
            excluder: &excluder,
            hierarchy: None,
            cancel: &cancel,
        };

        let report = collect_selection(
            &[
                SelectionRoot::directory(&workspace),
                SelectionRoot::directory(fx.root.join("elsewhere")),
            ],
            &ctx,
        )
        .unwrap();
        assert_eq!(included(&report), vec!["a.txt"]);
        assert_eq!(report.skipped_roots.len(), 1);

        let only_outside = collect_selection(
            &[SelectionRoot::directory(fx.root.join("elsewhere"))],
            &ctx,
        );
        assert!(matches!(only_outside, Err(AppError::NoUsableRoots(_))));
    }

    #[test]
    fn cancelled_token_aborts_collection() {
        let fx = Fixture::new(&[("a.txt", "a")]);
        let excluder = GlobalExcluder::empty();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = CollectContext {
            fs: &LocalFileSystem,
            workspace_root: &fx.root,
            excluder: &excluder,
            hierarchy: None,
            cancel: &cancel,
        };
        let result = collect_selection(&[SelectionRoot::directory(&fx.root)], &ctx);
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn directory_symlinks_are_not_followed() {
        let fx = Fixture::new(&[("real/a.txt", "a")]);
        std::os::unix::fs::symlink(fx.root.join("real"), fx.root.join("loop")).unwrap();
        std::os::unix::fs::symlink(fx.root.join("real/a.txt"), fx.root.join("link.txt")).unwrap();

        let report = fx.collect(&[SelectionRoot::directory(&fx.root)], &[]);
        assert_eq!(included(&report), vec!["link.txt", "real/a.txt"]);
    }
}
