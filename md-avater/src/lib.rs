//! md-avater - avatar images for markdown documents
//!
//! Finds image references in a markdown tree that ask for an avatar, either
//! with an `avater:` marker in the alt text, an `avater:` URL scheme, or a
//! plain image file, and replaces them with generated data URLs.
//!
//! ```no_run
//! use md_avater::{transform_markdown, ImageGenerator, MdAvaterOptions};
//!
//! let markdown = "![avater:fillshape=rect](img/alice.png)![](img/frame.png)\n";
//! let output = transform_markdown(
//!     markdown,
//!     &MdAvaterOptions::default(),
//!     &ImageGenerator::new("docs"),
//! )?;
//! # Ok::<(), md_avater::AvaterError>(())
//! ```

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod avater;
pub mod config;
pub mod generate;
pub mod mdast;
pub mod options;
pub mod select;
pub mod util;

pub use avater::{collect_targets, to_image_data_url, transform_markdown, AvaterError};
pub use config::ConfigError;
pub use generate::{AvaterGenerator, GenerateError, ImageGenerator};
pub use mdast::Node;
pub use options::{decode_options, MdAvaterOptions, ResolvedOptions};
pub use select::{select_target, AvaterSourceKind, TargetInfo};
