//! Loop Unroller - repeats blocks of sibling nodes per collection item
//!
//! `{foreach items as item}` in a paragraph marks the paragraph as the loop
//! boundary. When that paragraph sits in a table cell, the whole row becomes
//! the boundary. The body runs from the boundary's next sibling up to the
//! sibling holding the matching `{/foreach}`. Boundary, body and end marker
//! are replaced by one expanded copy of the body per item.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::config::StructureNames;
use crate::context::{collection_items, Context, INDEX_BINDING};
use crate::error::ParseError;
use crate::generator::Generator;
use crate::tree::{Node, NodePath, FRAGMENT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopHeader {
    pub collection: String,
    pub binding: String,
}

pub fn loop_start_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\{\s*foreach\s+([^\s}]+)\s+as\s+([^\s}]+)\s*\}").expect("valid foreach pattern")
    })
}

pub fn loop_end_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\{\s*/foreach\s*\}").expect("valid end pattern"))
}

/// First loop start marker in `text`
pub fn parse_loop_start(text: &str) -> Option<(LoopHeader, &str)> {
    let captures = loop_start_pattern().captures(text)?;
    let marker = captures.get(0)?.as_str();
    let header = LoopHeader {
        collection: captures.get(1)?.as_str().to_string(),
        binding: captures.get(2)?.as_str().to_string(),
    };
    Some((header, marker))
}

/// Unrolls the first loop found in document order.
///
/// Returns `false` when the tree holds no loop start marker. The tree has
/// changed shape after a `true` return, so scanning must restart at the root.
/// The expanded copies are left in a fragment node, which later scans skip.
pub(crate) fn unroll_first(
    generator: &Generator,
    root: &mut Node,
    context: &mut Context,
) -> Result<bool, ParseError> {
    let structure = generator.structure();
    let container = structure.text_container.as_deref();

    let Some((marker_path, header, marker)) = find_loop_start(root, container) else {
        return Ok(false);
    };

    let boundary = loop_boundary(root, &marker_path, structure)
        .ok_or_else(|| ParseError::MisplacedLoop { marker: marker.clone() })?;
    let Some((&index, parent_path)) = boundary.split_last() else {
        return Err(ParseError::MisplacedLoop { marker });
    };

    let siblings = root.get(parent_path).map(Node::children).unwrap_or_default();
    let end = find_loop_end(siblings, index + 1, container).ok_or_else(|| ParseError::UnclosedLoop {
        collection: header.collection.clone(),
    })?;
    let body = siblings[index + 1..end].to_vec();

    let items = collection_items(context.lookup(&header.collection));
    debug!(
        collection = %header.collection,
        binding = %header.binding,
        items = items.len(),
        body = body.len(),
        "unrolling loop"
    );

    let mut expanded = vec![];
    if !body.is_empty() {
        for (key, item) in items {
            let mut scope = context.scope([
                (header.binding.clone(), item),
                (INDEX_BINDING.to_string(), key),
            ]);
            let mut fragment = Node::fragment(body.clone());
            generator.expand_in_place(&mut fragment, &mut scope)?;
            expanded.extend(fragment.into_children());
        }
    }

    let Some(children) = root.get_mut(parent_path).and_then(Node::children_mut) else {
        return Err(ParseError::MisplacedLoop { marker });
    };
    // Kept as one fragment until the whole tree is done, so the expanded
    // text is never scanned again
    children.splice(index..=end, [Node::fragment(expanded)]);
    Ok(true)
}

fn find_loop_start(root: &Node, container: Option<&str>) -> Option<(NodePath, LoopHeader, String)> {
    root.texts(container).into_iter().find_map(|(path, text)| {
        parse_loop_start(text).map(|(header, marker)| (path, header, marker.to_string()))
    })
}

/// Nearest block ancestor of the marker, promoted to the row when the block
/// sits directly in a table cell. The root never qualifies, it has no siblings.
fn loop_boundary(root: &Node, marker: &[usize], structure: &StructureNames) -> Option<NodePath> {
    let depth = (1..marker.len())
        .rev()
        .find(|&d| root.get(&marker[..d]).is_some_and(|n| n.is_element(&structure.block)))?;

    if depth >= 3 {
        let cell = root.get(&marker[..depth - 1]);
        let row = root.get(&marker[..depth - 2]);
        if cell.is_some_and(|n| n.is_element(&structure.cell))
            && row.is_some_and(|n| n.is_element(&structure.row))
        {
            return Some(marker[..depth - 2].to_vec());
        }
    }

    Some(marker[..depth].to_vec())
}

/// Index of the sibling closing the loop, counting nested starts
fn find_loop_end(siblings: &[Node], start: usize, container: Option<&str>) -> Option<usize> {
    let mut open = 1usize;
    for (index, sibling) in siblings.iter().enumerate().skip(start) {
        if sibling.is_element(FRAGMENT) {
            continue;
        }
        for (_, text) in sibling.texts(container) {
            if loop_start_pattern().is_match(text) {
                open += 1;
            }
            if loop_end_pattern().is_match(text) {
                open -= 1;
                if open == 0 {
                    return Some(index);
                }
            }
        }
    }
    None
}
