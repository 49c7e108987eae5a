//! Text/binary classification and Markdown fragment formatting.
//!
//! The classifier is a plain heuristic, tuned against a small fixture set:
//!
//! 1. A known-binary extension is binary without looking at the bytes.
//! 2. An empty file is text.
//! 3. Only the first [`SAMPLE_LEN`] bytes are inspected. A UTF-8 byte-order
//!    mark means text; UTF-16/32 byte-order marks mean binary (they are not
//!    decoded).
//! 4. Any NUL byte in the sample means binary, whatever the extension says.
//! 5. Unless the extension is a known text one, more than
//!    [`MAX_CONTROL_RATIO`] suspicious control bytes in the sample means
//!    binary. Tab, LF, CR, form feed and ESC are not suspicious.

use crate::collect::CollectedFile;
use crate::fs::FileSystem;
use byte_unit::{Byte, UnitType};
use once_cell::sync::Lazy;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

pub const SAMPLE_LEN: usize = 8000;
pub const MAX_CONTROL_RATIO: f64 = 0.10;

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tif", "tiff", "psd", "pdf", "zip",
        "gz", "tgz", "bz2", "xz", "7z", "rar", "tar", "jar", "war", "class", "exe", "dll", "so",
        "dylib", "a", "lib", "o", "obj", "bin", "dat", "wasm", "pyc", "pyo", "woff", "woff2",
        "ttf", "otf", "eot", "mp3", "mp4", "m4a", "wav", "flac", "ogg", "avi", "mov", "mkv",
        "webm", "sqlite", "db", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    ]
    .into_iter()
    .collect()
});

static TEXT_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "txt", "md", "markdown", "rst", "rs", "toml", "json", "yaml", "yml", "xml", "html", "htm",
        "css", "scss", "less", "js", "mjs", "cjs", "jsx", "ts", "tsx", "py", "rb", "go", "java",
        "kt", "c", "h", "cpp", "hpp", "cc", "cs", "php", "sh", "bash", "zsh", "fish", "ps1",
        "sql", "ini", "cfg", "conf", "csv", "tsv", "svg", "vue", "svelte", "lua", "swift",
        "dart", "ex", "exs", "erl", "hs", "ml", "scala", "clj", "r", "pl", "tex", "gradle",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Binary,
}

fn lowercase_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn is_suspicious_control(byte: u8) -> bool {
    match byte {
        b'\t' | b'\n' | b'\r' | 0x0c | 0x1b => false,
        0x00..=0x1f | 0x7f => true,
        _ => false,
    }
}

/// Classifies a file from its name and content.
pub fn classify(file_name: &str, bytes: &[u8]) -> ContentKind {
    let extension = lowercase_extension(file_name);
    if let Some(ext) = extension.as_deref() {
        if BINARY_EXTENSIONS.contains(ext) {
            return ContentKind::Binary;
        }
    }
    if bytes.is_empty() {
        return ContentKind::Text;
    }

    let sample = &bytes[..bytes.len().min(SAMPLE_LEN)];
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return ContentKind::Text;
    }
    if sample.starts_with(&[0xFF, 0xFE]) || sample.starts_with(&[0xFE, 0xFF]) {
        return ContentKind::Binary;
    }
    if sample.contains(&0) {
        return ContentKind::Binary;
    }

    let known_text = extension
        .as_deref()
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(ext));
    if !known_text {
        let suspicious = sample.iter().filter(|b| is_suspicious_control(**b)).count();
        if suspicious as f64 / sample.len() as f64 > MAX_CONTROL_RATIO {
            return ContentKind::Binary;
        }
    }
    ContentKind::Text
}

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(content: &str) -> usize {
    content.chars().count().div_ceil(4)
}

pub fn human_size(bytes: u64) -> String {
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    format!("{:.2}", adjusted)
}

pub fn format_fragment(relative_path: &str, size: u64, extension: &str, content: &str) -> String {
    format!(
        "## Path: {} ({})\n\n```{}\n{}\n```\n\n",
        relative_path,
        human_size(size),
        extension,
        content
    )
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ProcessedFileResult {
    pub relative_path: String,
    pub size: u64,
    pub extension: String,
    #[cfg_attr(feature = "serde_support", serde(skip))]
    pub fragment: String,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Text(ProcessedFileResult),
    Binary,
    Failed(String),
}

/// Reads one collected file and turns it into a Markdown fragment.
///
/// A read failure is returned as [`FileOutcome::Failed`]; it never aborts the
/// run.
pub fn read_candidate(fs: &dyn FileSystem, file: &CollectedFile) -> FileOutcome {
    let bytes = match fs.read_file(&file.absolute_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Failed to read {}: {}", file.absolute_path.display(), e);
            return FileOutcome::Failed(e.to_string());
        }
    };

    let file_name = file
        .absolute_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if classify(&file_name, &bytes) == ContentKind::Binary {
        log::debug!("Skipping binary file: {}", file.relative_path);
        return FileOutcome::Binary;
    }

    let size = bytes.len() as u64;
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::debug!("Decoding non-UTF-8 text lossily: {}", file.relative_path);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    let extension = Path::new(&file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    FileOutcome::Text(ProcessedFileResult {
        fragment: format_fragment(&file.relative_path, size, &extension, &content),
        relative_path: file.relative_path.clone(),
        size,
        extension,
        estimated_tokens: estimate_tokens(&content),
    })
}
