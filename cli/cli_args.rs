use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct WorkspaceOpts {
    #[arg(
        long,
        help = "Workspace root that bounds ignore-file lookup \
                (default: $CTXMERGE_WORKSPACE or current dir).",
        help_heading = "Workspace",
        value_name = "DIR"
    )]
    pub workspace: Option<PathBuf>,

    #[arg(
        long,
        help = "Path/filename of the TOML config file (default: .ctxmerge/ctxmerge.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Workspace"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        help = "Do not load any TOML config file.",
        conflicts_with = "config",
        help_heading = "Workspace"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(
        short = 'e',
        long = "exclude",
        value_name = "GLOB",
        help = "Additional global exclude pattern (repeatable).",
        help_heading = "Filtering"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long,
        help = "Start from an empty exclude list instead of the defaults.",
        help_heading = "Filtering"
    )]
    pub no_default_excludes: bool,

    #[arg(
        long,
        help = "Ignore .gitignore and .ctxmergeignore files.",
        help_heading = "Filtering"
    )]
    pub no_ignore_files: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Merge selected files and folders into one Markdown document for LLM prompts.",
    long_about = "ctxmerge walks the selected paths, honours .gitignore/.ctxmergeignore files and \n\
                  global exclude patterns, skips binary files, and concatenates the rest into a \n\
                  single Markdown document with an optional summary, exclusion report and file tree.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  \
                  ctxmerge merge src README.md -o context.md\n  \
                  ctxmerge explain src --json\n  \
                  ctxmerge stats .\n  \
                  ctxmerge config --save",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase message verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "m",
        about = "Merge the selected paths into one Markdown document."
    )]
    Merge(MergeArgs),

    #[command(
        visible_alias = "x",
        about = "Show which paths would be merged and why others are excluded."
    )]
    Explain(ExplainArgs),

    #[command(about = "Show file counts, sizes and estimated tokens for a selection.")]
    Stats(StatsArgs),

    #[command(about = "Show or save the default configuration file.")]
    Config(ConfigArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(required = true, value_name = "PATHS", help = "Files and folders to merge.")]
    pub paths: Vec<PathBuf>,

    #[clap(flatten)]
    pub workspace: WorkspaceOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the document to FILE instead of stdout.",
        help_heading = "Output Control"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Omit the summary section.", help_heading = "Sections")]
    pub no_summary: bool,

    #[arg(
        long,
        value_name = "TEXT",
        conflicts_with = "instructions_file",
        help = "Preamble text placed before the files.",
        help_heading = "Sections"
    )]
    pub instructions: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Read the preamble text from FILE.",
        help_heading = "Sections"
    )]
    pub instructions_file: Option<PathBuf>,

    #[arg(
        long,
        help = "Omit the excluded/binary/unreadable listings.",
        help_heading = "Sections"
    )]
    pub no_exclusions: bool,

    #[arg(long, help = "Include the stage timing breakdown.", help_heading = "Sections")]
    pub timings: bool,

    #[arg(long, help = "Omit the file tree.", help_heading = "Sections")]
    pub no_tree: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExplainArgs {
    #[arg(required = true, value_name = "PATHS", help = "Files and folders to inspect.")]
    pub paths: Vec<PathBuf>,

    #[clap(flatten)]
    pub workspace: WorkspaceOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,

    #[arg(long, help = "Print the collection report as JSON.")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(required = true, value_name = "PATHS", help = "Files and folders to measure.")]
    pub paths: Vec<PathBuf>,

    #[clap(flatten)]
    pub workspace: WorkspaceOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub workspace: WorkspaceOpts,

    #[arg(
        long,
        help = "Save the default config to the workspace config path (prompts overwrite)."
    )]
    pub save: bool,
}
