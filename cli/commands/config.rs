use crate::cli_args::ConfigArgs;
use crate::output::{may_write, write_to_file, write_to_stdout};
use anyhow::{Context, Result};
use colored::*;
use ctxmerge_core::Config;
use std::path::Path;

pub fn handle_config_command(args: &ConfigArgs, workspace_root: &Path, quiet: bool) -> Result<()> {
    let content = Config::default()
        .to_toml_string()
        .context("Failed to serialize default configuration")?;

    if !args.save {
        return write_to_stdout(&content);
    }

    let save_path = Config::workspace_config_path(workspace_root);
    if !may_write(&save_path, quiet)? {
        println!("Save cancelled.");
        return Ok(());
    }
    write_to_file(&save_path, &content)?;
    if !quiet {
        println!(
            "{} Default configuration saved to: {}",
            "✅".green(),
            save_path.display().to_string().blue()
        );
    }
    Ok(())
}
