mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use std::path::{Path, PathBuf};
use std::process;

use cli_args::{Cli, Commands, FilterOpts, WorkspaceOpts};
use ctxmerge_core::{
    AppError, Config, LocalFileSystem, MergeOptions, MergeRequest, resolve_roots,
};

const EXIT_CANCELLED: i32 = 130;

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            if exit_code == EXIT_CANCELLED {
                if !quiet {
                    eprintln!("{} Cancelled, no output written.", "⚠️".yellow());
                }
            } else if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::TomlSerialize(_)) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::Glob(_)) => 1,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(AppError::Cancelled) => EXIT_CANCELLED,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Merge(args) => {
                log::debug!("Executing 'merge' command...");
                commands::merge::handle_merge_command(args, quiet)?;
            }
            Commands::Explain(args) => {
                log::debug!("Executing 'explain' command...");
                commands::explain::handle_explain_command(args, quiet)?;
            }
            Commands::Stats(args) => {
                log::debug!("Executing 'stats' command...");
                commands::stats::handle_stats_command(args, quiet)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                let workspace_root =
                    Config::determine_workspace_root(args.workspace.workspace.as_ref())
                        .context("Failed to determine workspace root for config command")?;
                commands::config::handle_config_command(&args, &workspace_root, quiet)?;
            }
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
        },
    }
    Ok(())
}

fn apply_filter_overrides(mut config: Config, filters: &FilterOpts) -> Config {
    log::trace!("Applying filter CLI overrides to config...");
    if filters.no_default_excludes {
        config.filters.exclude.clear();
        config.filters.extend_default_excludes.clear();
    }
    config
        .filters
        .extend_default_excludes
        .extend(filters.exclude.iter().cloned());
    if filters.no_ignore_files {
        config.general.use_ignore_files = false;
    }
    config
}

/// Loads the config the workspace options point at, then layers the filter
/// flags on top.
pub fn load_config_for_command(
    workspace_root: &Path,
    workspace_opts: &WorkspaceOpts,
    filters: Option<&FilterOpts>,
) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        workspace_root,
        workspace_opts.config.as_ref(),
        workspace_opts.no_config,
    )
    .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    Ok(match filters {
        Some(filters) => apply_filter_overrides(config, filters),
        None => config,
    })
}

/// Workspace root, effective config and resolved selection for the
/// path-taking subcommands.
pub fn prepare_request(
    paths: &[PathBuf],
    workspace_opts: &WorkspaceOpts,
    filters: &FilterOpts,
) -> Result<(Config, MergeRequest)> {
    let workspace_root = Config::determine_workspace_root(workspace_opts.workspace.as_ref())
        .context("Failed to determine workspace root")?;
    log::info!("Workspace root determined: {}", workspace_root.display());

    let config = load_config_for_command(&workspace_root, workspace_opts, Some(filters))?;
    let roots = resolve_roots(&LocalFileSystem, paths).context("Failed to resolve selected paths")?;

    let request = MergeRequest {
        workspace_root,
        roots,
        options: MergeOptions::from_config(&config),
    };
    Ok((config, request))
}
