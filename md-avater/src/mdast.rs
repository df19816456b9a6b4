//! Markdown syntax tree
//!
//! A deliberately small tree model: only top-level paragraphs and their
//! top-level images are structured. Everything else is carried as literal
//! markdown source so that serializing the tree reproduces it unchanged.

// Submodules
mod node;
mod parser;
mod serializer;

// Re-export public types
pub use node::{Block, Image, Node, Paragraph, Root, Text};
pub use parser::parse;
pub use serializer::to_markdown;
