//! Directory walker for discovering markdown files

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Errors that can occur while walking a directory
#[derive(Debug)]
pub enum WalkerError {
    /// IO error
    Io(std::io::Error),
    /// Input path is neither a file nor a directory
    NotFound(PathBuf),
}

impl From<std::io::Error> for WalkerError {
    fn from(err: std::io::Error) -> Self {
        WalkerError::Io(err)
    }
}

impl std::fmt::Display for WalkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkerError::Io(e) => write!(f, "IO error: {}", e),
            WalkerError::NotFound(path) => write!(f, "No such file or directory: {}", path.display()),
        }
    }
}

impl std::error::Error for WalkerError {}

/// Collect the markdown files for an input path
///
/// # Parameters
/// * `input` - A markdown file, or a directory to search recursively
///
/// # Returns
/// * `Ok(Vec<PathBuf>)` - The file itself, or every `.md` file sorted by path
/// * `Err(WalkerError)` - The input does not exist or cannot be read
pub fn find_markdown_files(input: &Path) -> Result<Vec<PathBuf>, WalkerError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(WalkerError::NotFound(input.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();

        // Only process markdown files
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
