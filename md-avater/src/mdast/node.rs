//! Tree node types

/// A node of the markdown tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Document root
    Root(Root),

    /// A top-level paragraph
    Paragraph(Paragraph),

    /// An inline image that is a direct child of a paragraph
    Image(Image),

    /// Inline content that is not a direct image child, as markdown source
    Text(Text),

    /// A top-level block that is not a paragraph, as markdown source
    Block(Block),
}

/// Document root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Root {
    /// Top-level blocks in document order
    pub children: Vec<Node>,
}

/// A paragraph with its inline children in reading order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub children: Vec<Node>,
}

/// An image reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    /// Destination URL (may be empty)
    pub url: String,

    /// Alternative text (may be empty)
    pub alt: String,

    /// Optional title text
    pub title: Option<String>,
}

/// Literal inline markdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    pub value: String,
}

/// Literal block markdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub value: String,
}

impl Node {
    /// Create an image node
    pub fn image(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Node::Image(Image {
            url: url.into(),
            alt: alt.into(),
            title: None,
        })
    }

    /// Create a text node
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(Text {
            value: value.into(),
        })
    }

    /// Create a paragraph node
    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph(Paragraph { children })
    }

    /// Create a root node
    pub fn root(children: Vec<Node>) -> Self {
        Node::Root(Root { children })
    }

    /// Borrow the node as an image, if it is one
    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Node::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Mutably borrow the node as an image, if it is one
    pub fn as_image_mut(&mut self) -> Option<&mut Image> {
        match self {
            Node::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Child nodes for container variants
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Root(root) => &root.children,
            Node::Paragraph(paragraph) => &paragraph.children,
            Node::Image(_) | Node::Text(_) | Node::Block(_) => &[],
        }
    }
}
