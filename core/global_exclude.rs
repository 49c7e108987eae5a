use crate::error::{AppError, Result};
use crate::ignore_rules::to_posix;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Built-in exclude list applied when the configuration does not replace it.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    // Lockfiles
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/Cargo.lock",
    "**/poetry.lock",
    "**/Gemfile.lock",
    "**/composer.lock",
    "*.lock",
    // Build output
    "**/dist/**",
    "**/build/**",
    "**/out/**",
    "**/target/**",
    "**/.next/**",
    // Dependencies
    "**/node_modules/**",
    "**/vendor/**",
    "**/.venv/**",
    "**/__pycache__/**",
    // Minified bundles and source maps
    "*.min.js",
    "*.min.css",
    "*.map",
    // Binary and media files
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.bmp",
    "*.webp",
    "*.svg",
    "*.pdf",
    "*.zip",
    "*.tar",
    "*.gz",
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.mp3",
    "*.mp4",
    // Environment files
    "**/.env",
    "**/.env.*",
    // Logs and coverage
    "*.log",
    "**/coverage/**",
    "**/.nyc_output/**",
    // VCS, editor and IDE metadata
    "**/.git/**",
    "**/.vscode/**",
    "**/.idea/**",
    "**/.DS_Store",
];

/// Name of the synthetic child used to test whether a contents pattern such
/// as `**/node_modules/**` covers the directory itself. Only patterns ending
/// in `/**` are tested with it.
const DIR_PROBE: &str = "__ctxmerge_dir_probe__";

pub fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

/// Location-independent exclude globs, checked before any ignore file.
#[derive(Debug, Clone)]
pub struct GlobalExcluder {
    set: GlobSet,
    /// The subset of `set` whose globs end in `/**`.
    contents_set: GlobSet,
    patterns: Vec<String>,
}

impl GlobalExcluder {
    /// Compiles `patterns`. A trailing `/` means "this directory and
    /// everything below it".
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut contents_builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern_str in patterns {
            let mut processed_pattern = pattern_str.trim().to_string();
            if processed_pattern.is_empty() {
                continue;
            }
            if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
                processed_pattern.push_str("**");
            }
            match Glob::new(&processed_pattern) {
                Ok(glob) => {
                    log::trace!(
                        "Adding global exclude pattern: {} (processed as {})",
                        pattern_str,
                        processed_pattern
                    );
                    if processed_pattern.ends_with("/**") {
                        contents_builder.add(glob.clone());
                    }
                    builder.add(glob);
                    kept.push(pattern_str.trim().to_string());
                }
                Err(e) => {
                    log::error!("Invalid exclude pattern \"{}\": {}", pattern_str, e);
                    return Err(AppError::Glob(format!(
                        "Invalid exclude pattern \"{}\" (processed as \"{}\"): {}",
                        pattern_str, processed_pattern, e
                    )));
                }
            }
        }
        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|e| {
                log::error!("Error building exclude glob set: {}", e);
                AppError::Glob(e.to_string())
            })
        };
        let set = build(builder)?;
        let contents_set = build(contents_builder)?;
        log::debug!("Compiled {} global exclude patterns.", kept.len());
        Ok(Self {
            set,
            contents_set,
            patterns: kept,
        })
    }

    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            contents_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn matches_single(&self, posix: &str, is_dir: bool) -> bool {
        self.set.is_match(posix)
            || (is_dir && self.contents_set.is_match(format!("{}/{}", posix, DIR_PROBE)))
    }

    /// Tests a workspace-relative path.
    ///
    /// Each parent directory is tested first, so a file selected on its own
    /// is excluded exactly when a walk from the workspace root would have
    /// pruned it.
    pub fn is_excluded(&self, relative_path: &Path, is_dir: bool) -> bool {
        let posix = to_posix(relative_path);
        if posix.is_empty() {
            return false;
        }
        let excluded_parent = posix
            .match_indices('/')
            .any(|(end, _)| self.matches_single(&posix[..end], true));
        excluded_parent || self.matches_single(&posix, is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excluder(patterns: &[&str]) -> GlobalExcluder {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        GlobalExcluder::new(&patterns).unwrap()
    }

    #[test]
    fn defaults_cover_common_noise() {
        let ex = GlobalExcluder::new(&default_exclude_patterns()).unwrap();
        assert!(ex.is_excluded(Path::new("logo.png"), false));
        assert!(ex.is_excluded(Path::new("assets/img/logo.png"), false));
        assert!(ex.is_excluded(Path::new("node_modules"), true));
        assert!(ex.is_excluded(Path::new("web/node_modules/react/index.js"), false));
        assert!(ex.is_excluded(Path::new("Cargo.lock"), false));
        assert!(ex.is_excluded(Path::new(".env"), false));
        assert!(ex.is_excluded(Path::new("config/.env.local"), false));
        assert!(ex.is_excluded(Path::new("app.min.js"), false));
        assert!(ex.is_excluded(Path::new(".vscode"), true));
        assert!(!ex.is_excluded(Path::new("src/main.rs"), false));
        assert!(!ex.is_excluded(Path::new("src"), true));
    }

    #[test]
    fn trailing_slash_covers_directory_and_contents() {
        let ex = excluder(&["generated/"]);
        assert!(ex.is_excluded(Path::new("generated"), true));
        assert!(ex.is_excluded(Path::new("generated/api.rs"), false));
        assert!(!ex.is_excluded(Path::new("src/generated.rs"), false));
    }

    #[test]
    fn excluded_parent_directory_covers_its_files() {
        let ex = excluder(&["node_modules"]);
        assert!(ex.is_excluded(Path::new("node_modules"), true));
        assert!(ex.is_excluded(Path::new("node_modules/x.js"), false));
        assert!(!ex.is_excluded(Path::new("web/node_modules.rs"), false));
    }

    #[test]
    fn file_patterns_do_not_exclude_directories() {
        let ex = excluder(&["**/_*", "*_*"]);
        assert!(!ex.is_excluded(Path::new("src"), true));
        assert!(!ex.is_excluded(Path::new("docs"), true));
        assert!(!ex.is_excluded(Path::new("src/main.rs"), false));
        assert!(ex.is_excluded(Path::new("src/_draft.rs"), false));
        assert!(ex.is_excluded(Path::new("my_notes.md"), false));
    }

    #[test]
    fn workspace_root_is_never_excluded() {
        let ex = excluder(&["**"]);
        assert!(!ex.is_excluded(Path::new(""), true));
    }

    #[test]
    fn invalid_pattern_is_a_glob_error() {
        let result = GlobalExcluder::new(&["src/[unclosed".to_string()]);
        assert!(matches!(result, Err(AppError::Glob(_))));
    }

    #[test]
    fn blank_patterns_are_skipped() {
        let ex = excluder(&["", "   ", "*.tmp"]);
        assert_eq!(ex.patterns(), &["*.tmp".to_string()]);
    }
}
