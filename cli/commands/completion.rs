use crate::cli_args::{Cli, CompletionArgs};
use crate::output::may_write;
use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use colored::*;
use ctxmerge_core::AppError;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

fn parse_shell(name: &str) -> Result<Shell, AppError> {
    match name.to_lowercase().as_str() {
        "fish" => Ok(Shell::Fish),
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "powershell" | "pwsh" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        _ => Err(AppError::InvalidArgument(format!(
            "Unsupported shell for completion: {}",
            name
        ))),
    }
}

/// Conventional per-user completion file for `shell`.
fn default_save_path(shell: Shell, bin_name: &str) -> Result<PathBuf, AppError> {
    let location = match shell {
        Shell::Fish => dirs::config_dir()
            .map(|p| p.join("fish").join("completions").join(format!("{}.fish", bin_name))),
        Shell::Bash => dirs::data_local_dir().map(|p| {
            p.join("bash-completion")
                .join("completions")
                .join(bin_name)
        }),
        Shell::Zsh => dirs::data_local_dir()
            .map(|p| p.join("zsh").join("site-functions").join(format!("_{}", bin_name))),
        other => {
            return Err(AppError::InvalidArgument(format!(
                "Default save location not known for shell: {}",
                other
            )));
        }
    };
    location.ok_or_else(|| {
        AppError::Config("Could not determine standard completion directory.".to_string())
    })
}

pub fn handle_completion_command(args: &CompletionArgs, quiet: bool) -> Result<()> {
    let shell_name = args.shell.as_deref().unwrap_or("fish");
    let shell = parse_shell(shell_name)?;

    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();

    if !args.save {
        generate(shell, &mut command, bin_name, &mut io::stdout());
        return Ok(());
    }

    let save_path = default_save_path(shell, &bin_name)?;
    if !may_write(&save_path, quiet)? {
        println!("Save cancelled.");
        return Ok(());
    }
    if let Some(save_dir) = save_path.parent() {
        fs::create_dir_all(save_dir)
            .with_context(|| format!("Failed to create directory {}", save_dir.display()))?;
    }
    let mut file = File::create(&save_path)
        .with_context(|| format!("Failed to create file {}", save_path.display()))?;
    generate(shell, &mut command, bin_name, &mut file);

    if !quiet {
        println!(
            "{} {} completions saved to: {}",
            "✅".green(),
            shell_name.cyan(),
            save_path.display().to_string().blue()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_names_are_case_insensitive() {
        assert_eq!(parse_shell("ZSH").unwrap(), Shell::Zsh);
        assert_eq!(parse_shell("pwsh").unwrap(), Shell::PowerShell);
        assert!(matches!(parse_shell("tcsh"), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn zsh_completion_file_is_prefixed() {
        if let Ok(path) = default_save_path(Shell::Zsh, "ctxmerge") {
            assert_eq!(path.file_name().unwrap(), "_ctxmerge");
        }
        assert!(default_save_path(Shell::Elvish, "ctxmerge").is_err());
    }
}
