use crate::error::{AppError, Result};
use crate::global_exclude::default_exclude_patterns;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".ctxmerge";
pub const DEFAULT_CONFIG_FILENAME: &str = "ctxmerge.toml";
pub const USER_CONFIG_DIR: &str = "ctxmerge";
pub const USER_CONFIG_FILENAME: &str = "config.toml";
pub const WORKSPACE_ENV_VAR: &str = "CTXMERGE_WORKSPACE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Honour `.gitignore` and `.ctxmergeignore` files.
    #[serde(default = "default_true")]
    pub use_ignore_files: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    /// Global exclude globs. Replaces the built-in list when set.
    #[serde(default = "default_exclude_patterns")]
    pub exclude: Vec<String>,
    /// Appended to `exclude` instead of replacing it.
    #[serde(default)]
    pub extend_default_excludes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub include_summary: bool,
    /// Free-text preamble placed before the file contents.
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_true")]
    pub include_exclusion_lists: bool,
    #[serde(default = "default_false")]
    pub include_timings: bool,
    #[serde(default = "default_true")]
    pub include_tree: bool,
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            use_ignore_files: default_true(),
        }
    }
}
impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude_patterns(),
            extend_default_excludes: Vec::new(),
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_summary: default_true(),
            instructions: None,
            include_exclusion_lists: default_true(),
            include_timings: default_false(),
            include_tree: default_true(),
        }
    }
}

impl Config {
    /// `exclude` followed by `extend_default_excludes`, without duplicates.
    pub fn effective_exclude_patterns(&self) -> Vec<String> {
        let mut patterns = self.filters.exclude.clone();
        for extra in &self.filters.extend_default_excludes {
            if !patterns.contains(extra) {
                patterns.push(extra.clone());
            }
        }
        patterns
    }

    /// Instructions, if configured and not blank.
    pub fn effective_instructions(&self) -> Option<&str> {
        self.output
            .instructions
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn determine_workspace_root(cli_workspace_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_workspace_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var(WORKSPACE_ENV_VAR).ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        let canonical = path_to_resolve.canonicalize().map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to canonicalize workspace root '{}': {}",
                    path_to_resolve.display(),
                    e
                ),
            ))
        })?;
        if !canonical.is_dir() {
            return Err(AppError::InvalidArgument(format!(
                "Workspace root '{}' is not a directory",
                canonical.display()
            )));
        }
        Ok(canonical)
    }

    pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
        workspace_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILENAME)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILENAME))
    }

    /// Picks the config file to load: an explicit path, then the workspace
    /// file, then the user file. `Ok(None)` means built-in defaults.
    pub fn resolve_config_path(
        workspace_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        if let Some(p_str) = cli_config_file {
            let expanded = shellexpand::tilde(p_str);
            let mut path = PathBuf::from(expanded.as_ref());
            if path.is_relative() {
                path = workspace_root.join(path);
            }
            if !path.exists() && path.extension().is_none() {
                path.set_extension("toml");
            }
            if !path.exists() {
                return Err(AppError::Config(format!(
                    "Specified config file not found at path: {}",
                    path.display()
                )));
            }
            log::debug!("Using specified config file path: {}", path.display());
            return Ok(Some(path));
        }

        let workspace_path = Self::workspace_config_path(workspace_root);
        if workspace_path.exists() {
            log::debug!("Using workspace config file: {}", workspace_path.display());
            return Ok(Some(workspace_path));
        }

        match Self::user_config_path() {
            Some(user_path) if user_path.exists() => {
                log::debug!("Using user config file: {}", user_path.display());
                Ok(Some(user_path))
            }
            _ => {
                log::debug!(
                    "No config file found (looked at {}), using defaults.",
                    workspace_path.display()
                );
                Ok(None)
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml_str(toml_content: &str) -> Result<Self> {
        toml::from_str::<Config>(toml_content).map_err(|e| {
            AppError::TomlParse(format!("{}. Check TOML syntax and structure.", e))
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert!(config.general.use_ignore_files);
        assert!(config.output.include_summary);
        assert!(config.output.include_exclusion_lists);
        assert!(config.output.include_tree);
        assert!(!config.output.include_timings);
        assert_eq!(config.output.instructions, None);
        assert!(config.filters.exclude.contains(&"*.png".to_string()));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [output]
            include_timings = true
            instructions = "Review this code."

            [filters]
            extend_default_excludes = ["*.snap"]
            "#,
        )
        .unwrap();

        assert!(config.output.include_timings);
        assert!(config.output.include_tree);
        assert_eq!(config.effective_instructions(), Some("Review this code."));
        let patterns = config.effective_exclude_patterns();
        assert!(patterns.contains(&"*.png".to_string()));
        assert_eq!(patterns.last(), Some(&"*.snap".to_string()));
    }

    #[test]
    fn explicit_exclude_replaces_defaults() {
        let config = Config::from_toml_str("[filters]\nexclude = [\"*.tmp\"]\n").unwrap();
        assert_eq!(config.effective_exclude_patterns(), vec!["*.tmp".to_string()]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = Config::from_toml_str("[output]\ninclude_everything = true\n");
        assert!(matches!(result, Err(AppError::TomlParse(_))));
    }

    #[test]
    fn blank_instructions_are_ignored() {
        let mut config = Config::default();
        config.output.instructions = Some("   \n".to_string());
        assert_eq!(config.effective_instructions(), None);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn resolve_prefers_explicit_then_workspace_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let workspace_file = Config::workspace_config_path(root);
        fs::create_dir_all(workspace_file.parent().unwrap()).unwrap();
        fs::write(&workspace_file, "").unwrap();
        fs::write(root.join("custom.toml"), "").unwrap();

        let explicit =
            Config::resolve_config_path(root, Some(&"custom".to_string()), false).unwrap();
        assert_eq!(explicit, Some(root.join("custom.toml")));

        let implicit = Config::resolve_config_path(root, None, false).unwrap();
        assert_eq!(implicit, Some(workspace_file));

        assert_eq!(Config::resolve_config_path(root, None, true).unwrap(), None);
        let missing = "missing.toml".to_string();
        assert!(Config::resolve_config_path(root, Some(&missing), false).is_err());
    }

    #[test]
    fn explicit_workspace_root_is_canonicalized() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a");
        fs::create_dir(&nested).unwrap();
        let given = nested.join("..").join("a");

        let root = Config::determine_workspace_root(Some(&given)).unwrap();
        assert_eq!(root, nested.canonicalize().unwrap());

        let file = nested.join("f.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            Config::determine_workspace_root(Some(&file)),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
