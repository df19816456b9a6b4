//! Avatar resolvers and the tree rewrite driver
//!
//! [`to_image_data_url`] walks the top-level paragraphs of a tree. At each
//! cursor it asks [`select_target`] for an avatar unit, hands the unit's
//! members to the matching resolver, and collects the positions that became
//! redundant. Deletion happens once per paragraph, after the whole scan, so
//! positions recorded earlier stay valid while later cursors are evaluated.

use crate::generate::{AvaterGenerator, GenerateError};
use crate::mdast::{self, Image, Node};
use crate::options::{decode_options, MdAvaterOptions};
use crate::select::{select_target, AvaterSourceKind, TargetInfo};
use crate::util::{file_name_from_url, strip_maker_protocol};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that abort a tree transform
#[derive(Error, Debug)]
pub enum AvaterError {
    #[error("Failed to generate avatar: {0}")]
    Generate(#[from] GenerateError),

    #[error("Avatar unit member {index} is not an image")]
    NotAnImage { index: usize },
}

/// Sources read from an avatar unit before generation
struct UnitSources {
    url: String,
    alt: String,
    base: String,
}

fn read_unit(unit: &[Node]) -> Result<UnitSources, AvaterError> {
    let image = member(unit, 0)?;
    let base = match unit.get(1) {
        Some(_) => member(unit, 1)?.url.clone(),
        None => String::new(),
    };
    Ok(UnitSources {
        url: image.url.clone(),
        alt: image.alt.clone(),
        base,
    })
}

fn member(unit: &[Node], index: usize) -> Result<&Image, AvaterError> {
    unit.get(index)
        .and_then(Node::as_image)
        .ok_or(AvaterError::NotAnImage { index })
}

/// Store the generated image in the unit
///
/// A two-member unit writes into its base; the subject is left for the
/// driver to delete. A single image is rewritten in place and takes `alt`
/// when one is given.
fn write_back(unit: &mut [Node], data_url: String, alt: Option<String>) -> Result<(), AvaterError> {
    let index = if unit.len() > 1 { 1 } else { 0 };
    let image = unit
        .get_mut(index)
        .and_then(Node::as_image_mut)
        .ok_or(AvaterError::NotAnImage { index })?;

    image.url = data_url;
    if index == 0 {
        if let Some(alt) = alt {
            image.alt = alt;
        }
    }
    Ok(())
}

/// Resolve a unit whose subject carries the marker in its alt text
///
/// # Parameters
/// * `unit` - The subject and the optional base image
/// * `options` - Declarative options
/// * `generator` - Image generator
///
/// # Returns
/// * `Ok(())` - The generated image has been written into the unit
/// * `Err(AvaterError)` - Generation failed or a member is not an image
pub fn by_image_alt(
    unit: &mut [Node],
    options: &MdAvaterOptions,
    generator: &impl AvaterGenerator,
) -> Result<(), AvaterError> {
    let sources = read_unit(unit)?;
    let alt = strip_maker_protocol(&sources.alt);

    let resolved = decode_options(options, &[&alt]);
    let data_url = generator.generate(&sources.url, &sources.base, &resolved)?;

    write_back(unit, data_url, Some(alt))
}

/// Resolve a unit whose subject URL uses the marker as its scheme
///
/// Rewritten in place, the image's alt becomes the stripped URL text: the alt
/// only carried options, and the stripped text names the source the avatar
/// was made from. With a base the base keeps its own alt.
pub fn by_image_scheme(
    unit: &mut [Node],
    options: &MdAvaterOptions,
    generator: &impl AvaterGenerator,
) -> Result<(), AvaterError> {
    let sources = read_unit(unit)?;
    let text = strip_maker_protocol(&sources.url);

    let resolved = decode_options(options, &[&sources.alt]);
    let data_url = generator.generate(&text, &sources.base, &resolved)?;

    write_back(unit, data_url, Some(text))
}

/// Resolve a unit whose subject is a plain image file
///
/// The file name is decoded as an extra override before the alt text, so
/// `fillshape=rect.png` works without any marker.
pub fn by_image_file(
    unit: &mut [Node],
    options: &MdAvaterOptions,
    generator: &impl AvaterGenerator,
) -> Result<(), AvaterError> {
    let sources = read_unit(unit)?;
    let file_name = file_name_from_url(&sources.url);

    let resolved = decode_options(options, &[&file_name, &sources.alt]);
    let data_url = generator.generate(&sources.url, &sources.base, &resolved)?;

    write_back(unit, data_url, None)
}

/// Merge consumed positions into the paragraph accumulator
pub fn add_remove_idxs(remove_idxs: &mut BTreeSet<usize>, consumed: &[usize]) {
    remove_idxs.extend(consumed.iter().copied());
}

/// Rewrite every avatar unit of the tree into generated images
///
/// # Parameters
/// * `tree` - Tree to mutate; anything but a root is left unchanged
/// * `options` - Declarative options shared by all units
/// * `generator` - Image generator, called once per unit in document order
///
/// # Returns
/// * `Ok(())` - All units rewritten
/// * `Err(AvaterError)` - The first failure; units before it stay rewritten,
///   the failing paragraph keeps its redundant nodes
pub fn to_image_data_url(
    tree: &mut Node,
    options: &MdAvaterOptions,
    generator: &impl AvaterGenerator,
) -> Result<(), AvaterError> {
    let Node::Root(root) = tree else {
        return Ok(());
    };

    for (index, child) in root.children.iter_mut().enumerate() {
        if let Node::Paragraph(paragraph) = child {
            let units = rewrite_paragraph(&mut paragraph.children, options, generator)?;
            if units > 0 {
                log::info!("Rewrote {} avatar unit(s) in paragraph {}", units, index);
            }
        }
    }

    Ok(())
}

/// Scan one paragraph, resolve its units, then drop redundant nodes
fn rewrite_paragraph(
    children: &mut Vec<Node>,
    options: &MdAvaterOptions,
    generator: &impl AvaterGenerator,
) -> Result<usize, AvaterError> {
    let (units, remove_idxs) = resolve_units(children, options, generator)?;

    if !remove_idxs.is_empty() {
        log::trace!("Removing paragraph children {:?}", remove_idxs);
        let mut index = 0;
        children.retain(|_| {
            let keep = !remove_idxs.contains(&index);
            index += 1;
            keep
        });
    }

    Ok(units)
}

/// Resolve every unit of a paragraph left to right, collecting consumed positions
fn resolve_units(
    children: &mut [Node],
    options: &MdAvaterOptions,
    generator: &impl AvaterGenerator,
) -> Result<(usize, BTreeSet<usize>), AvaterError> {
    let mut remove_idxs = BTreeSet::new();
    let mut units = 0;
    // First position not claimed by an earlier unit
    let mut next_free = 0;

    let len = children.len();
    for ii in 0..len {
        if ii < next_free {
            continue;
        }

        let target = select_target(children, ii);
        let unit = &mut children[target.members.clone()];
        match target.kind {
            AvaterSourceKind::None => continue,
            AvaterSourceKind::ImageAlt => by_image_alt(unit, options, generator)?,
            AvaterSourceKind::ImageScheme => by_image_scheme(unit, options, generator)?,
            AvaterSourceKind::ImageFile => by_image_file(unit, options, generator)?,
        }
        log::debug!(
            "Resolved {} avatar at {:?} (base: {})",
            target.kind,
            target.members,
            target.has_base()
        );

        units += 1;
        next_free = target.members.end;
        add_remove_idxs(&mut remove_idxs, &target.remove_idxs);
    }

    Ok((units, remove_idxs))
}

/// A unit found by [`collect_targets`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundTarget {
    /// Index of the paragraph among the root's children
    pub paragraph: usize,
    pub target: TargetInfo,
}

/// List the units [`to_image_data_url`] would resolve, without generating
pub fn collect_targets(tree: &Node) -> Vec<FoundTarget> {
    let mut found = Vec::new();
    let Node::Root(root) = tree else {
        return found;
    };

    for (paragraph, child) in root.children.iter().enumerate() {
        let Node::Paragraph(p) = child else {
            continue;
        };
        let mut next_free = 0;
        for ii in 0..p.children.len() {
            if ii < next_free {
                continue;
            }
            let target = select_target(&p.children, ii);
            if target.kind == AvaterSourceKind::None {
                continue;
            }
            next_free = target.members.end;
            found.push(FoundTarget { paragraph, target });
        }
    }

    found
}

/// Parse markdown, rewrite its avatar units and serialize it again
pub fn transform_markdown(
    source: &str,
    options: &MdAvaterOptions,
    generator: &impl AvaterGenerator,
) -> Result<String, AvaterError> {
    let mut tree = mdast::parse(source);
    to_image_data_url(&mut tree, options, generator)?;
    Ok(mdast::to_markdown(&tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ResolvedOptions;
    use std::cell::RefCell;

    const GENERATED: &str = "data:image/png;base64,AAA=";

    /// Generator recording its calls and returning a fixed data URL
    #[derive(Default)]
    struct StubGenerator {
        calls: RefCell<Vec<(String, String, ResolvedOptions)>>,
        fail_on: Option<usize>,
    }

    impl AvaterGenerator for StubGenerator {
        fn generate(
            &self,
            subject: &str,
            base: &str,
            options: &ResolvedOptions,
        ) -> Result<String, GenerateError> {
            let mut calls = self.calls.borrow_mut();
            if self.fail_on == Some(calls.len()) {
                return Err(GenerateError::UnsupportedSource(subject.to_string()));
            }
            calls.push((subject.to_string(), base.to_string(), options.clone()));
            Ok(GENERATED.to_string())
        }
    }

    fn tree_of(children: Vec<Node>) -> Node {
        Node::root(vec![Node::paragraph(children)])
    }

    fn paragraph(tree: &Node) -> &[Node] {
        tree.children()[0].children()
    }

    #[test]
    fn test_two_node_unit_collapses_to_base() {
        // Arrange: Marker image followed by a base image
        let mut tree = tree_of(vec![
            Node::image("face.png", "avater:fit=40"),
            Node::image("http://base.png", "Base"),
        ]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert: Only the base survives and it holds the generated image
        let children = paragraph(&tree);
        assert_eq!(children.len(), 1);
        let image = children[0].as_image().unwrap();
        assert_eq!(image.url, GENERATED);
        assert_eq!(image.alt, "Base");

        let calls = generator.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "face.png");
        assert_eq!(calls[0].1, "http://base.png");
        assert_eq!(calls[0].2.fit, 40.0);
    }

    #[test]
    fn test_single_alt_unit_rewrites_in_place() {
        // Arrange
        let mut tree = tree_of(vec![Node::image("face.png", "avater:fillshape=rect")]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert: Same node, new url, stripped alt
        let image = paragraph(&tree)[0].as_image().unwrap();
        assert_eq!(paragraph(&tree).len(), 1);
        assert_eq!(image.url, GENERATED);
        assert_eq!(image.alt, "fillshape=rect");
        assert_eq!(generator.calls.borrow()[0].1, "");
    }

    #[test]
    fn test_scheme_unit_strips_url() {
        // Arrange
        let mut tree = tree_of(vec![Node::image("avater:face.png", "padding=10")]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert: Subject is the stripped url, alt is the stripped text
        let calls = generator.calls.borrow();
        assert_eq!(calls[0].0, "face.png");
        assert_eq!(calls[0].2.padding, 10);
        let image = paragraph(&tree)[0].as_image().unwrap();
        assert_eq!(image.url, GENERATED);
        assert_eq!(image.alt, "face.png");
    }

    #[test]
    fn test_scheme_unit_with_base_collapses_to_base() {
        // Arrange: Scheme marker image followed by a base image
        let mut tree = tree_of(vec![
            Node::image("avater:a.png", "fit=30"),
            Node::image("base.png", "Base"),
        ]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert: Stripped subject paired with the base, the base holds the result
        let calls = generator.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "a.png");
        assert_eq!(calls[0].1, "base.png");
        assert_eq!(calls[0].2.fit, 30.0);
        let children = paragraph(&tree);
        assert_eq!(children.len(), 1);
        let image = children[0].as_image().unwrap();
        assert_eq!(image.url, GENERATED);
        assert_eq!(image.alt, "Base");
    }

    #[test]
    fn test_consumed_positions_are_unique_subject_indices() {
        // Arrange: Three paired units of different kinds plus a lone file
        let mut children = vec![
            Node::image("a.png", ""),
            Node::image("b.png", "first base"),
            Node::image("c.png", "avater:"),
            Node::image("d.png", "second base"),
            Node::text(" and "),
            Node::image("avater:e.png", ""),
            Node::image("f.png", "third base"),
            Node::image("g.png", "alone"),
        ];
        let len = children.len();
        let generator = StubGenerator::default();

        // Act
        let (units, remove_idxs) =
            resolve_units(&mut children, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert: Only subjects of paired units are consumed, all in range
        assert_eq!(units, 4);
        assert_eq!(remove_idxs.iter().copied().collect::<Vec<_>>(), vec![0, 2, 5]);
        assert!(remove_idxs.iter().all(|&i| i < len));
        for base in [1, 3, 6, 7] {
            assert_eq!(children[base].as_image().unwrap().url, GENERATED);
        }
    }

    #[test]
    fn test_file_unit_keeps_alt() {
        // Arrange: Plain image file with default options
        let mut tree = tree_of(vec![Node::image("img/cat.png", "")]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert
        let image = paragraph(&tree)[0].as_image().unwrap();
        assert_eq!(image.url, GENERATED);
        assert_eq!(image.alt, "");
        assert_eq!(generator.calls.borrow()[0].0, "img/cat.png");
    }

    #[test]
    fn test_file_name_is_an_override() {
        let mut tree = tree_of(vec![Node::image("img/fit=80.png", "margin=1")]);
        let generator = StubGenerator::default();

        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        let calls = generator.calls.borrow();
        assert_eq!(calls[0].2.fit, 80.0);
        assert_eq!(calls[0].2.margin, 1);
    }

    #[test]
    fn test_non_avatar_content_untouched() {
        // Arrange: Text and images without markers or recognized extensions
        let children = vec![
            Node::text("Hello "),
            Node::image("diagram.svg", "Diagram"),
            Node::text(" and "),
            Node::image("https://example.com/badge", ""),
        ];
        let mut tree = tree_of(children.clone());
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert
        assert_eq!(paragraph(&tree), children.as_slice());
        assert!(generator.calls.borrow().is_empty());
    }

    #[test]
    fn test_base_is_never_a_subject() {
        // Arrange: Both images carry markers
        let mut tree = tree_of(vec![
            Node::image("a.png", "avater:"),
            Node::image("b.png", "avater:fit=10"),
        ]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert: One unit, the second image only serves as base
        assert_eq!(generator.calls.borrow().len(), 1);
        let children = paragraph(&tree);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].as_image().unwrap().alt, "avater:fit=10");
    }

    #[test]
    fn test_consecutive_files_pair_left_to_right() {
        // Arrange: Three plain image files
        let mut tree = tree_of(vec![
            Node::image("a.png", "a"),
            Node::image("b.png", "b"),
            Node::image("c.png", "c"),
        ]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert: (a on b) and c alone
        let calls = generator.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!((calls[0].0.as_str(), calls[0].1.as_str()), ("a.png", "b.png"));
        assert_eq!((calls[1].0.as_str(), calls[1].1.as_str()), ("c.png", ""));

        let alts: Vec<&str> = paragraph(&tree)
            .iter()
            .map(|n| n.as_image().unwrap().alt.as_str())
            .collect();
        assert_eq!(alts, vec!["b", "c"]);
    }

    #[test]
    fn test_deletion_keeps_surrounding_order() {
        // Arrange: Units separated by text
        let mut tree = tree_of(vec![
            Node::text("x"),
            Node::image("a.png", "avater:"),
            Node::image("base1.png", "one"),
            Node::text("y"),
            Node::image("avater:b.png", ""),
            Node::image("base2.png", "two"),
            Node::text("z"),
        ]);
        let generator = StubGenerator::default();

        // Act
        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator).unwrap();

        // Assert
        let children = paragraph(&tree);
        assert_eq!(children.len(), 5);
        assert_eq!(children[0], Node::text("x"));
        assert_eq!(children[1].as_image().unwrap().alt, "one");
        assert_eq!(children[2], Node::text("y"));
        assert_eq!(children[3].as_image().unwrap().alt, "two");
        assert_eq!(children[4], Node::text("z"));
    }

    #[test]
    fn test_remove_idxs_are_deduplicated() {
        let mut remove_idxs = BTreeSet::new();

        add_remove_idxs(&mut remove_idxs, &[3, 1]);
        add_remove_idxs(&mut remove_idxs, &[1]);

        assert_eq!(remove_idxs.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_generation_failure_aborts() {
        // Arrange: Second generation fails
        let mut tree = Node::root(vec![
            Node::paragraph(vec![Node::image("a.png", "")]),
            Node::paragraph(vec![Node::image("b.png", ""), Node::image("c.png", "")]),
        ]);
        let generator = StubGenerator {
            fail_on: Some(1),
            ..Default::default()
        };

        // Act
        let result = to_image_data_url(&mut tree, &MdAvaterOptions::default(), &generator);

        // Assert: Error surfaces; the second paragraph is not modified
        assert!(matches!(result, Err(AvaterError::Generate(_))));
        let first = tree.children()[0].children()[0].as_image().unwrap();
        assert_eq!(first.url, GENERATED);
        assert_eq!(tree.children()[1].children().len(), 2);
        assert_eq!(tree.children()[1].children()[1].as_image().unwrap().url, "c.png");
    }

    #[test]
    fn test_non_root_tree_is_unchanged() {
        let mut tree = Node::paragraph(vec![Node::image("a.png", "")]);
        let before = tree.clone();

        to_image_data_url(&mut tree, &MdAvaterOptions::default(), &StubGenerator::default())
            .unwrap();

        assert_eq!(tree, before);
    }

    #[test]
    fn test_resolver_rejects_non_image_member() {
        let mut unit = vec![Node::text("oops")];

        let result = by_image_file(
            &mut unit,
            &MdAvaterOptions::default(),
            &StubGenerator::default(),
        );

        assert!(matches!(result, Err(AvaterError::NotAnImage { index: 0 })));
    }

    #[test]
    fn test_collect_targets_matches_driver_pairing() {
        // Arrange
        let tree = Node::root(vec![
            Node::Block(crate::mdast::Block {
                value: "# Title".to_string(),
            }),
            Node::paragraph(vec![
                Node::image("a.png", ""),
                Node::image("b.png", ""),
                Node::image("c.png", ""),
            ]),
        ]);

        // Act
        let found = collect_targets(&tree);

        // Assert
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].paragraph, 1);
        assert_eq!(found[0].target.members, 0..2);
        assert_eq!(found[1].target.members, 2..3);
    }

    #[test]
    fn test_transform_markdown() {
        let output = transform_markdown(
            "# Team\n\n![avater:](alice.png)![](frame.png) Alice\n",
            &MdAvaterOptions::default(),
            &StubGenerator::default(),
        )
        .unwrap();

        assert_eq!(output, format!("# Team\n\n![]({}) Alice\n", GENERATED));
    }
}
