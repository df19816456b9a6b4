//! md-avater - avatar images for markdown documents
//!
//! A CLI tool that rewrites avatar image references in markdown files into
//! generated, embedded data URLs.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod cli;
mod walker;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use md_avater::{collect_targets, mdast, transform_markdown, ImageGenerator, MdAvaterOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// Main entry point for the md-avater CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform {
            input,
            output,
            config,
            root,
            verbose,
        } => {
            init_logging(verbose);
            handle_transform_command(&input, output, config, root)?;
        }

        Commands::Check { input, verbose } => {
            init_logging(verbose);
            handle_check_command(&input)?;
        }
    }

    Ok(())
}

/// Initialize logging, `RUST_LOG` wins unless verbose is set
fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

/// Handle the transform command
fn handle_transform_command(
    input: &Path,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    root: Option<PathBuf>,
) -> Result<()> {
    let options = load_options(input, config.as_deref())?;
    let files = walker::find_markdown_files(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    if input.is_file() {
        let result = transform_file(input, &options, root.as_deref())?;
        match output {
            Some(path) => write_output(&path, &result)?,
            None => print!("{}", result),
        }
        return Ok(());
    }

    for file in &files {
        let result = transform_file(file, &options, root.as_deref())?;
        let target = match output {
            Some(ref dir) => dir.join(file.strip_prefix(input).unwrap_or(file)),
            None => file.clone(),
        };
        write_output(&target, &result)?;
        log::info!("Wrote {}", target.display());
    }
    eprintln!("✓ Transformed {} markdown files", files.len());

    Ok(())
}

/// Handle the check command
fn handle_check_command(input: &Path) -> Result<()> {
    let files = walker::find_markdown_files(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut total = 0;
    for file in &files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read file {}", file.display()))?;
        let tree = mdast::parse(&content);

        for found in collect_targets(&tree) {
            let members = found.target.members;
            println!(
                "{}: paragraph {}, children {}..{}: {}{}",
                file.display(),
                found.paragraph,
                members.start,
                members.end,
                found.target.kind,
                if members.len() > 1 { " (with base)" } else { "" }
            );
            total += 1;
        }
    }
    println!("\n{} avatar unit(s) in {} file(s)", total, files.len());

    Ok(())
}

/// Options from `--config`, or `md-avater.toml` next to the input
fn load_options(input: &Path, config: Option<&Path>) -> Result<MdAvaterOptions> {
    if let Some(path) = config {
        return MdAvaterOptions::load(path)
            .with_context(|| format!("Failed to load options from {}", path.display()));
    }

    let dir = if input.is_dir() {
        input
    } else {
        parent_dir(input)
    };
    MdAvaterOptions::discover(dir)
        .with_context(|| format!("Failed to load options from {}", dir.display()))
}

/// Transform a single markdown file, resolving images against `root` or the file's directory
fn transform_file(path: &Path, options: &MdAvaterOptions, root: Option<&Path>) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file {}", path.display()))?;
    let generator = ImageGenerator::new(root.unwrap_or_else(|| parent_dir(path)));

    transform_markdown(&content, options, &generator)
        .with_context(|| format!("Failed to transform {}", path.display()))
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write file {}", path.display()))
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}
