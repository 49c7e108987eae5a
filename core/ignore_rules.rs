use ignore::Match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Component, Path, PathBuf};

/// Splits raw ignore-file text into pattern lines.
///
/// Blank lines and lines whose first non-whitespace character is `#` are
/// dropped; everything else is kept verbatim (minus a trailing `\r`).
pub fn parse_ignore_content(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(String::from)
        .collect()
}

/// Joins the normal components of a relative path with `/`.
pub fn to_posix(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    NoMatch,
    /// Excluded by the pattern shown.
    Ignored(String),
    /// Re-included by a `!` pattern.
    Whitelisted(String),
}

impl RuleMatch {
    pub fn is_ignored(&self) -> bool {
        matches!(self, RuleMatch::Ignored(_))
    }
}

/// Compiled gitignore rules of every ignore file that lives in one directory.
#[derive(Debug)]
pub struct IgnoreMatcher {
    directory: PathBuf,
    gitignore: Gitignore,
}

impl IgnoreMatcher {
    /// Compiles the patterns of one or more ignore files owned by `directory`.
    ///
    /// `sources` yields `(ignore file path, pattern lines)`; later sources take
    /// precedence over earlier ones, as later lines do within one file.
    /// Lines that do not compile are logged and skipped.
    pub fn compile<'a, I>(directory: &Path, sources: I) -> Self
    where
        I: IntoIterator<Item = (&'a Path, &'a [String])>,
    {
        let mut builder = GitignoreBuilder::new(directory);
        for (origin, patterns) in sources {
            for line in patterns {
                if let Err(e) = builder.add_line(Some(origin.to_path_buf()), line) {
                    log::warn!(
                        "Skipping unparseable ignore pattern '{}' in {}: {}",
                        line,
                        origin.display(),
                        e
                    );
                }
            }
        }

        let gitignore = builder.build().unwrap_or_else(|e| {
            log::warn!(
                "Failed to compile ignore rules for {}: {}. Treating as empty.",
                directory.display(),
                e
            );
            Gitignore::empty()
        });
        log::trace!(
            "Compiled {} ignore rules for {}",
            gitignore.num_ignores() + gitignore.num_whitelists(),
            directory.display()
        );

        IgnoreMatcher {
            directory: directory.to_path_buf(),
            gitignore,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_empty(&self) -> bool {
        self.gitignore.is_empty()
    }

    /// Decides `relative` (relative to the owning directory) on its own.
    ///
    /// Parent directories are not consulted here; [`IgnoreHierarchy`] checks
    /// every ancestor first, because a file below an ignored directory can
    /// never be re-included.
    ///
    /// [`IgnoreHierarchy`]: crate::ignore_files::IgnoreHierarchy
    pub fn check(&self, relative: &Path, is_dir: bool) -> RuleMatch {
        let posix = to_posix(relative);
        if posix.is_empty() {
            return RuleMatch::NoMatch;
        }
        match self.gitignore.matched(Path::new(&posix), is_dir) {
            Match::None => RuleMatch::NoMatch,
            Match::Ignore(glob) => RuleMatch::Ignored(glob.original().to_string()),
            Match::Whitelist(glob) => RuleMatch::Whitelisted(glob.original().to_string()),
        }
    }

    pub fn matches(&self, relative: &Path, is_dir: bool) -> bool {
        self.check(relative, is_dir).is_ignored()
    }
}
