//! String helpers for marker stripping and file name extraction

use percent_encoding::percent_decode_str;
use std::path::Path;

/// Control prefix that marks an alt text or URL as an avatar directive
pub const MAKER_PROTOCOL: &str = "avater:";

/// Check whether a string starts with the avatar marker
pub fn has_maker_protocol(s: &str) -> bool {
    s.starts_with(MAKER_PROTOCOL)
}

/// Remove the avatar marker prefix, leaving other strings unchanged
///
/// # Parameters
/// * `s` - Alt text or URL
///
/// # Returns
/// * `String` - The payload after the marker, or `s` itself when unmarked
pub fn strip_maker_protocol(s: &str) -> String {
    s.strip_prefix(MAKER_PROTOCOL).unwrap_or(s).to_string()
}

/// Strip a trailing `?query` and `#fragment` from a URL
pub fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Derive a bare file name (no directory, no extension) from a URL or path
///
/// # Parameters
/// * `url` - URL or relative path, may be empty
///
/// # Returns
/// * `String` - Percent-decoded file stem, empty when there is none
pub fn file_name_from_url(url: &str) -> String {
    let segment = url_path(url).rsplit('/').next().unwrap_or("");
    let decoded = percent_decode_str(segment).decode_utf8_lossy();

    Path::new(decoded.as_ref())
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}
