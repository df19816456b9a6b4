//! Markdown serializer
//!
//! Writes a tree back to markdown. Literal nodes are emitted verbatim, so a
//! parse/serialize round trip only normalizes block spacing and image syntax.

use super::node::{Image, Node};
use itertools::Itertools;

/// Serialize a tree to markdown
///
/// # Parameters
/// * `node` - Any node; a root yields a whole document with a trailing newline
///
/// # Returns
/// * `String` - Markdown source
pub fn to_markdown(node: &Node) -> String {
    match node {
        Node::Root(root) => {
            if root.children.is_empty() {
                return String::new();
            }
            let mut output = root.children.iter().map(to_markdown).join("\n\n");
            output.push('\n');
            output
        }
        Node::Paragraph(paragraph) => paragraph.children.iter().map(to_markdown).collect(),
        Node::Image(image) => image_to_markdown(image),
        Node::Text(text) => text.value.clone(),
        Node::Block(block) => block.value.clone(),
    }
}

fn image_to_markdown(image: &Image) -> String {
    let alt = escape_alt(&image.alt);
    let destination = escape_destination(&image.url);
    match &image.title {
        Some(title) => format!("![{}]({} \"{}\")", alt, destination, escape_title(title)),
        None => format!("![{}]({})", alt, destination),
    }
}

/// Backslash-escape punctuation that inline parsing would otherwise consume
fn escape_alt(alt: &str) -> String {
    let mut escaped = String::with_capacity(alt.len());
    for c in alt.chars() {
        if matches!(c, '\\' | '[' | ']' | '*' | '_' | '`' | '<' | '!' | '&' | '~') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Wrap destinations that the plain form cannot carry in angle brackets
fn escape_destination(url: &str) -> String {
    let needs_brackets = url
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>'));
    if !needs_brackets {
        return url.to_string();
    }

    let mut escaped = String::with_capacity(url.len() + 2);
    escaped.push('<');
    for c in url.chars() {
        if matches!(c, '<' | '>' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('>');
    escaped
}

fn escape_title(title: &str) -> String {
    title.replace('\\', "\\\\").replace('"', "\\\"")
}
