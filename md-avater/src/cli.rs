//! Command-line interface definitions for md-avater

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI structure for the md-avater application
#[derive(Parser)]
#[command(name = "md-avater")]
#[command(version)]
#[command(about = "Turn avatar image references in markdown into generated data URLs", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for md-avater
#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite avatar images of a markdown file or directory
    Transform {
        /// Markdown file or directory
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Output file (file input, defaults to stdout) or directory (directory input,
        /// defaults to rewriting in place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Options file (defaults to md-avater.toml next to the input)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory image paths are resolved against and confined to (defaults to each file's directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the avatar units found in a markdown file or directory
    Check {
        /// Markdown file or directory
        #[arg(value_name = "PATH", default_value = ".")]
        input: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}
