//! Target selection
//!
//! Classifies the paragraph child at a cursor and works out which siblings
//! belong to the same avatar unit. Selection only reads the siblings; the
//! driver in [`crate::avater`] owns the sequence and does all deletions.

use crate::mdast::{Image, Node};
use crate::util::{has_maker_protocol, url_path};
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

/// Extensions of image files that are turned into avatars as-is
static AVATER_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(png|jpe?g|webp|gif|bmp)$").expect("avatar file pattern is valid")
});

/// How an avatar request is encoded in an image node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvaterSourceKind {
    /// Not an avatar request
    None,
    /// Marker in the alt text: `![avater:fit=30](face.png)`
    ImageAlt,
    /// Marker as URL scheme: `![](avater:face.png)`
    ImageScheme,
    /// Plain reference to an image file: `![](face.png)`
    ImageFile,
}

impl fmt::Display for AvaterSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AvaterSourceKind::None => "none",
            AvaterSourceKind::ImageAlt => "image-alt",
            AvaterSourceKind::ImageScheme => "image-scheme",
            AvaterSourceKind::ImageFile => "image-file",
        };
        f.write_str(name)
    }
}

/// One avatar unit found at a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub kind: AvaterSourceKind,

    /// Sibling positions of the unit: the subject, then the optional base
    pub members: Range<usize>,

    /// Redundant sibling positions to delete once the paragraph is scanned
    ///
    /// The node receiving the generated image is never listed here.
    pub remove_idxs: Vec<usize>,
}

impl TargetInfo {
    fn none(cursor: usize) -> Self {
        Self {
            kind: AvaterSourceKind::None,
            members: cursor..cursor,
            remove_idxs: Vec::new(),
        }
    }

    /// Whether the unit carries a base image
    pub fn has_base(&self) -> bool {
        self.members.len() > 1
    }
}

/// Classify the sibling at `cursor`
///
/// # Parameters
/// * `siblings` - Children of one paragraph
/// * `cursor` - Position to classify; out of range yields `None`
///
/// # Returns
/// * `TargetInfo` - The unit; when the next sibling is an image it joins as
///   the base and the subject at `cursor` becomes redundant
pub fn select_target(siblings: &[Node], cursor: usize) -> TargetInfo {
    let Some(Node::Image(image)) = siblings.get(cursor) else {
        return TargetInfo::none(cursor);
    };

    let kind = classify(image);
    if kind == AvaterSourceKind::None {
        return TargetInfo::none(cursor);
    }

    if matches!(siblings.get(cursor + 1), Some(Node::Image(_))) {
        TargetInfo {
            kind,
            members: cursor..cursor + 2,
            remove_idxs: vec![cursor],
        }
    } else {
        TargetInfo {
            kind,
            members: cursor..cursor + 1,
            remove_idxs: Vec::new(),
        }
    }
}

/// Decide the kind of a single image, marker alt first, then scheme, then file
pub fn classify(image: &Image) -> AvaterSourceKind {
    if !image.alt.is_empty() && has_maker_protocol(&image.alt) {
        AvaterSourceKind::ImageAlt
    } else if has_maker_protocol(&image.url) {
        AvaterSourceKind::ImageScheme
    } else if is_avater_file(&image.url) {
        AvaterSourceKind::ImageFile
    } else {
        AvaterSourceKind::None
    }
}

/// Check whether a URL points at an image file by its extension
pub fn is_avater_file(url: &str) -> bool {
    !url.starts_with("data:") && AVATER_FILE_PATTERN.is_match(url_path(url))
}
