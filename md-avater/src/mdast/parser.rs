//! Markdown source parser
//!
//! Converts pulldown-cmark's offset event stream into a [`Node::Root`]. Only
//! top-level paragraphs are split into children; their direct images become
//! [`Node::Image`] and the source between them becomes [`Node::Text`].

use super::node::{Block, Image, Node, Paragraph, Root, Text};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use std::ops::Range;

/// Parse markdown source into a tree
///
/// # Parameters
/// * `source` - Raw markdown content
///
/// # Returns
/// * `Node` - A `Node::Root` holding the top-level blocks
pub fn parse(source: &str) -> Node {
    let mut builder = TreeBuilder::new(source);

    for (event, range) in Parser::new_ext(source, parser_options()).into_offset_iter() {
        builder.process_event(event, range);
    }

    builder.finish()
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

/// Parser state for converting offset events to a tree
struct TreeBuilder<'s> {
    /// Markdown source the offsets point into
    source: &'s str,

    /// Completed top-level nodes
    children: Vec<Node>,

    /// Current tag nesting depth
    depth: usize,

    /// Source offset up to which top-level content has been consumed
    consumed: usize,

    /// Top-level paragraph being built
    paragraph: Option<ParagraphBuilder>,
}

/// Builder for a top-level paragraph
struct ParagraphBuilder {
    children: Vec<Node>,
    /// Source offset up to which inline content has been consumed
    cursor: usize,
    /// End of the paragraph source
    end: usize,
    /// Direct image child being built
    image: Option<ImageBuilder>,
}

/// Builder for a direct image child
struct ImageBuilder {
    url: String,
    title: String,
    alt: String,
    end: usize,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            children: Vec::new(),
            depth: 0,
            consumed: 0,
            paragraph: None,
        }
    }

    fn process_event(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => self.handle_start_tag(tag, range),
            Event::End(tag_end) => self.handle_end_tag(tag_end),
            Event::Text(text) | Event::Code(text) => self.handle_alt_text(&text),
            Event::SoftBreak | Event::HardBreak => self.handle_alt_text(" "),
            _ if self.depth == 0 => self.push_block(range),
            _ => {}
        }
    }

    fn handle_start_tag(&mut self, tag: Tag<'_>, range: Range<usize>) {
        self.depth += 1;

        if self.depth == 1 {
            self.push_gap(range.start);
            if matches!(tag, Tag::Paragraph) {
                self.paragraph = Some(ParagraphBuilder {
                    children: Vec::new(),
                    cursor: range.start,
                    end: range.end,
                    image: None,
                });
            } else {
                self.push_block(range);
            }
            return;
        }

        // Images nested deeper (inside links, emphasis, ...) stay literal text
        if self.depth != 2 {
            return;
        }
        let Tag::Image {
            dest_url, title, ..
        } = tag
        else {
            return;
        };
        let source = self.source;
        if let Some(paragraph) = self.paragraph.as_mut() {
            paragraph.push_text(&source[paragraph.cursor..range.start]);
            paragraph.image = Some(ImageBuilder {
                url: dest_url.to_string(),
                title: title.to_string(),
                alt: String::new(),
                end: range.end,
            });
        }
    }

    fn handle_end_tag(&mut self, tag_end: TagEnd) {
        self.depth = self.depth.saturating_sub(1);

        if self.depth == 1 && matches!(tag_end, TagEnd::Image) {
            if let Some(paragraph) = self.paragraph.as_mut() {
                paragraph.finish_image();
            }
        } else if self.depth == 0 {
            if let Some(paragraph) = self.paragraph.take() {
                let source = self.source;
                self.consumed = paragraph.end;
                self.children.push(paragraph.finish(source));
            }
        }
    }

    fn handle_alt_text(&mut self, text: &str) {
        if let Some(image) = self
            .paragraph
            .as_mut()
            .and_then(|paragraph| paragraph.image.as_mut())
        {
            image.alt.push_str(text);
        }
    }

    /// Keep a non-paragraph top-level element as literal source
    fn push_block(&mut self, range: Range<usize>) {
        self.push_gap(range.start);
        let value = self.source[range.clone()].trim_end();
        if !value.is_empty() {
            self.children.push(Node::Block(Block {
                value: value.to_string(),
            }));
        }
        self.consumed = self.consumed.max(range.end);
    }

    /// Keep non-blank source between blocks (e.g. link reference definitions)
    fn push_gap(&mut self, until: usize) {
        if self.consumed >= until {
            return;
        }
        let gap = self.source[self.consumed..until].trim();
        if !gap.is_empty() {
            self.children.push(Node::Block(Block {
                value: gap.to_string(),
            }));
        }
        self.consumed = until;
    }

    fn finish(mut self) -> Node {
        self.push_gap(self.source.len());
        Node::Root(Root {
            children: self.children,
        })
    }
}

impl ParagraphBuilder {
    fn push_text(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.children.push(Node::Text(Text {
            value: value.to_string(),
        }));
    }

    fn finish_image(&mut self) {
        let Some(image) = self.image.take() else {
            return;
        };
        self.cursor = image.end;
        self.children.push(Node::Image(Image {
            url: image.url,
            alt: image.alt,
            title: (!image.title.is_empty()).then_some(image.title),
        }));
    }

    fn finish(mut self, source: &str) -> Node {
        let rest = source[self.cursor..self.end].trim_end();
        self.push_text(rest);
        Node::Paragraph(Paragraph {
            children: self.children,
        })
    }
}
