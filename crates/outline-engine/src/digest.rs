//! Sibling digest: what has already been written for the other subsections
//! of the section being generated.

use outline_core::ordering::find_leaf;
use outline_core::{Message, NodeCoordinate, OutlineTree, Vocabulary};

use crate::error::Result;

/// Concatenate the non-empty details of every sibling subsection, skipping
/// the node at `coordinate` itself. Simple nodes have no siblings.
pub fn sibling_digest(
    tree: &OutlineTree,
    coordinate: &NodeCoordinate,
    messages: &[Message],
    vocab: &Vocabulary,
) -> Result<String> {
    if coordinate.is_simple_node {
        return Ok(String::new());
    }

    let (section, _) = tree.subsection_at(
        &coordinate.branch_name,
        coordinate.section_ordinal,
        coordinate.subsection_ordinal,
    )?;

    let entries: Vec<String> = section
        .content
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx + 1 != coordinate.subsection_ordinal)
        .filter_map(|(idx, title)| {
            let sibling = NodeCoordinate::complex(
                coordinate.branch_name.as_str(),
                coordinate.branch_index,
                coordinate.section_index,
                idx,
            );
            let detail = find_leaf(messages, &sibling)?.detail_data()?;
            if detail.detail.trim().is_empty() {
                return None;
            }
            Some(format!("{}{}: {}\n{}", idx + 1, vocab.subsection, title, detail.detail))
        })
        .collect();

    Ok(entries.join("\n\n"))
}
