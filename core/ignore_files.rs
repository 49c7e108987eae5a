use crate::fs::FileSystem;
use crate::ignore_rules::{IgnoreMatcher, RuleMatch, parse_ignore_content};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Standard VCS ignore file.
pub const GENERIC_IGNORE_FILE: &str = ".gitignore";
/// ctxmerge-specific override file, parsed exactly like `.gitignore`.
pub const TOOL_IGNORE_FILE: &str = ".ctxmergeignore";
/// Checked at every directory level, in this order (later wins on conflict).
pub const IGNORE_FILE_NAMES: [&str; 2] = [GENERIC_IGNORE_FILE, TOOL_IGNORE_FILE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreFileEntry {
    pub directory: PathBuf,
    pub file_path: PathBuf,
    pub patterns: Vec<String>,
}

/// Ignore files read during one run, keyed by absolute file path.
///
/// Absent and unreadable files are remembered too so each level is probed
/// once. The cache must be cleared before every run; ignore files may change
/// between runs.
#[derive(Debug, Default)]
pub struct IgnoreFileCache {
    entries: RwLock<HashMap<PathBuf, Option<Arc<IgnoreFileEntry>>>>,
}

impl IgnoreFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        log::debug!("Clearing ignore-file cache ({} entries).", entries.len());
        entries.clear();
    }

    /// Number of probed ignore-file paths, present or not.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, file_path: &Path) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(file_path)
    }

    fn get_or_load(
        &self,
        fs: &dyn FileSystem,
        directory: &Path,
        file_path: PathBuf,
    ) -> Option<Arc<IgnoreFileEntry>> {
        if let Some(cached) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&file_path)
        {
            return cached.clone();
        }

        let loaded = load_ignore_file(fs, directory, &file_path).map(Arc::new);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(file_path)
            .or_insert(loaded)
            .clone()
    }
}

fn load_ignore_file(
    fs: &dyn FileSystem,
    directory: &Path,
    file_path: &Path,
) -> Option<IgnoreFileEntry> {
    match fs.read_file(file_path) {
        Ok(bytes) => {
            let patterns = parse_ignore_content(&String::from_utf8_lossy(&bytes));
            log::debug!(
                "Loaded {} ignore patterns from {}",
                patterns.len(),
                file_path.display()
            );
            Some(IgnoreFileEntry {
                directory: directory.to_path_buf(),
                file_path: file_path.to_path_buf(),
                patterns,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            log::warn!(
                "Could not read ignore file {}: {}. No rules applied at this level.",
                file_path.display(),
                e
            );
            None
        }
    }
}

/// Finds ignore files on the way from a directory up to the workspace root.
pub struct IgnoreLocator<'a> {
    fs: &'a dyn FileSystem,
    workspace_root: &'a Path,
    cache: &'a IgnoreFileCache,
}

impl<'a> IgnoreLocator<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        workspace_root: &'a Path,
        cache: &'a IgnoreFileCache,
    ) -> Self {
        Self {
            fs,
            workspace_root,
            cache,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        self.workspace_root
    }

    /// Ignore files that physically live in `directory`.
    pub fn entries_in(&self, directory: &Path) -> Vec<Arc<IgnoreFileEntry>> {
        IGNORE_FILE_NAMES
            .iter()
            .filter_map(|name| {
                self.cache
                    .get_or_load(self.fs, directory, directory.join(name))
            })
            .collect()
    }

    /// Every ignore file from `start_dir` up to and including the workspace
    /// root, deepest directory first.
    ///
    /// Nothing above the workspace root is ever read; a start directory outside
    /// the workspace yields no entries.
    pub fn locate(&self, start_dir: &Path) -> Vec<Arc<IgnoreFileEntry>> {
        if !start_dir.starts_with(self.workspace_root) {
            log::debug!(
                "{} is outside the workspace root, no ignore files apply.",
                start_dir.display()
            );
            return Vec::new();
        }

        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            if !visited.insert(dir.to_path_buf()) {
                log::warn!("Directory {} visited twice, stopping.", dir.display());
                break;
            }
            found.extend(self.entries_in(dir));
            if dir == self.workspace_root {
                break;
            }
            current = dir.parent();
        }
        found
    }
}

/// Per-directory compiled matchers, consulted deepest-first for each path.
pub struct IgnoreHierarchy<'a> {
    locator: IgnoreLocator<'a>,
    matchers: RwLock<HashMap<PathBuf, Arc<IgnoreMatcher>>>,
    /// Memoized ancestor decisions, keyed by absolute directory path.
    directory_decisions: RwLock<HashMap<PathBuf, Option<PathBuf>>>,
}

impl<'a> IgnoreHierarchy<'a> {
    pub fn new(locator: IgnoreLocator<'a>) -> Self {
        Self {
            locator,
            matchers: RwLock::new(HashMap::new()),
            directory_decisions: RwLock::new(HashMap::new()),
        }
    }

    fn matcher_for(
        &self,
        directory: &Path,
        entries: &[Arc<IgnoreFileEntry>],
    ) -> Arc<IgnoreMatcher> {
        if let Some(m) = self
            .matchers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(directory)
        {
            return Arc::clone(m);
        }

        let compiled = Arc::new(IgnoreMatcher::compile(
            directory,
            entries
                .iter()
                .map(|e| (e.file_path.as_path(), e.patterns.as_slice())),
        ));
        Arc::clone(
            self.matchers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(directory.to_path_buf())
                .or_insert(compiled),
        )
    }

    /// Returns the directory whose ignore rules exclude `path`, if any.
    ///
    /// Every ancestor directory below the workspace root is decided first,
    /// shallowest first; a file inside an ignored directory stays ignored
    /// whatever its own rules say, as in git. The answer is the same whether
    /// the path was reached by walking or selected directly.
    pub fn check(&self, path: &Path, is_dir: bool) -> Option<PathBuf> {
        let root = self.locator.workspace_root();
        let relative = path.strip_prefix(root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }

        let mut ancestor = root.to_path_buf();
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                break;
            }
            ancestor.push(component);
            if let Some(directory) = self.check_directory(&ancestor) {
                log::trace!(
                    "{} is inside ignored directory {}",
                    path.display(),
                    ancestor.display()
                );
                return Some(directory);
            }
        }
        self.decide(path, is_dir)
    }

    fn check_directory(&self, directory: &Path) -> Option<PathBuf> {
        if let Some(decision) = self
            .directory_decisions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(directory)
        {
            return decision.clone();
        }
        let decision = self.decide(directory, true);
        self.directory_decisions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(directory.to_path_buf(), decision.clone());
        decision
    }

    /// Decides `path` alone. Levels are checked from the containing directory
    /// upwards; the first level with a decision ends the walk, so a deeper
    /// `!pattern` keeps a path that a shallower file ignores.
    fn decide(&self, path: &Path, is_dir: bool) -> Option<PathBuf> {
        let start = path.parent()?;

        let mut levels: IndexMap<PathBuf, Vec<Arc<IgnoreFileEntry>>> = IndexMap::new();
        for entry in self.locator.locate(start) {
            levels
                .entry(entry.directory.clone())
                .or_default()
                .push(entry);
        }

        for (directory, entries) in &levels {
            let Ok(relative) = path.strip_prefix(directory) else {
                continue;
            };
            match self.matcher_for(directory, entries).check(relative, is_dir) {
                RuleMatch::NoMatch => continue,
                RuleMatch::Ignored(pattern) => {
                    log::trace!(
                        "{} ignored by '{}' in {}",
                        path.display(),
                        pattern,
                        directory.display()
                    );
                    return Some(directory.clone());
                }
                RuleMatch::Whitelisted(pattern) => {
                    log::trace!(
                        "{} re-included by '{}' in {}",
                        path.display(),
                        pattern,
                        directory.display()
                    );
                    return None;
                }
            }
        }
        None
    }
}
