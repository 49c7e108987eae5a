use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use ctxmerge_core::{MergeReport, ProcessingSummary, human_size};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

pub fn write_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to file {}", path.display()))?;
    Ok(())
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Asks on stdin whether `path` may be overwritten. Refuses in quiet mode.
pub fn confirm_overwrite(path: &Path, quiet: bool) -> Result<bool> {
    if quiet {
        anyhow::bail!(
            "Target file '{}' exists. Overwrite prevented in quiet mode.",
            path.display()
        );
    }
    print!(
        "{} File already exists at '{}'. Overwrite? [{}/{}] ",
        "⚠️".yellow(),
        path.display().to_string().cyan(),
        "y".green(),
        "N".red()
    );
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut response = String::new();
    io::stdin()
        .read_line(&mut response)
        .context("Failed to read user input")?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

/// True when `path` is free, or the user agreed to replace it.
pub fn may_write(path: &Path, quiet: bool) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    confirm_overwrite(path, quiet)
}

/// Warns about files that could not be read. Shown even when the document
/// goes to stdout.
pub fn print_read_failures(report: &MergeReport, quiet: bool) {
    if quiet {
        return;
    }
    for failure in &report.read_failures {
        eprintln!(
            "{} Could not read {}: {}",
            "⚠️".yellow(),
            failure.relative_path.cyan(),
            failure.message
        );
    }
}

pub fn print_stats_table(summary: &ProcessingSummary, report: &MergeReport) -> Result<()> {
    println!();
    println!("{}", " Selection Summary ".green().bold().underline());
    println!(
        "{:<24} {}",
        "Files Collected:".green(),
        summary.total_files.to_string().cyan()
    );
    println!(
        "{:<24} {}",
        "Text Files:".green(),
        summary.processed_files.to_string().cyan()
    );
    println!(
        "{:<24} {}",
        "Total Size:".green(),
        human_size(summary.total_size).cyan()
    );
    println!(
        "{:<24} {}",
        "Est. Tokens:".green(),
        summary.estimated_tokens.to_string().cyan()
    );
    println!(
        "{:<24} {}",
        "Excluded (global):".green(),
        report.collection.global_excluded.len().to_string().yellow()
    );
    println!(
        "{:<24} {}",
        "Ignored (rules):".green(),
        report.collection.ignore_excluded.len().to_string().yellow()
    );
    println!(
        "{:<24} {}",
        "Binary Skipped:".green(),
        report.binary_skipped.len().to_string().yellow()
    );

    if report.files.is_empty() {
        println!("\n{}", "(No text files in the selection)".yellow());
    } else {
        println!("\n{}", " File Details ".green().bold().underline());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Path").fg(Color::Green),
            Cell::new("Size").fg(Color::Green),
            Cell::new("Tokens").fg(Color::Green),
        ]);
        for file in &report.files {
            table.add_row(vec![
                Cell::new(&file.relative_path).fg(Color::Cyan),
                Cell::new(human_size(file.size))
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
                Cell::new(file.estimated_tokens).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }

    if !summary.timings.is_empty() {
        println!("\n{}", " Timings ".green().bold().underline());
        for (stage, elapsed) in &summary.timings {
            println!("{:<24} {:.2?}", format!("{}:", stage).green(), elapsed);
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_to_file_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out/nested/context.md");
        write_to_file(&target, "# Summary\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "# Summary\n");
    }

    #[test]
    fn existing_output_is_kept_in_quiet_mode() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("context.md");
        assert!(may_write(&target, true).unwrap());

        fs::write(&target, "previous").unwrap();
        assert!(may_write(&target, true).is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "previous");
    }
}
