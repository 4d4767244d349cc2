//! Position-correct placement of leaf messages.
//!
//! Conversations read top to bottom as: the user's request, the outline, then
//! generated details in traversal order. Leaf messages are compared by their
//! coordinate's `(branchIndex, sectionIndex, subsectionIndex)`; everything
//! else keeps its insertion position.

use crate::coordinate::NodeCoordinate;
use crate::message::{Message, MessageType};

/// Index at which a leaf for `coord` has to be inserted: before the first
/// leaf with a strictly greater key, else at the end.
pub fn find_insert_index(coord: &NodeCoordinate, messages: &[Message]) -> usize {
    let key = coord.sort_key();
    messages
        .iter()
        .position(|msg| {
            msg.is_leaf()
                && msg
                    .coordinate()
                    .map(|existing| existing.sort_key() > key)
                    .unwrap_or(false)
        })
        .unwrap_or(messages.len())
}

/// Insert at the sorted position and return that position.
pub fn insert_sorted(messages: &mut Vec<Message>, msg: Message) -> usize {
    let idx = match msg.coordinate() {
        Some(coord) => find_insert_index(coord, messages),
        None => messages.len(),
    };
    messages.insert(idx, msg);
    idx
}

/// Find a generated leaf for the node at `coord`.
///
/// Records without coordinate metadata can only match a simple node, by a
/// title equal to the branch name.
pub fn find_leaf<'a>(messages: &'a [Message], coord: &NodeCoordinate) -> Option<&'a Message> {
    messages.iter().filter(|m| m.is_leaf()).find(|msg| {
        let Some(detail) = msg.detail_data() else {
            return false;
        };
        match &detail.node_indexes {
            Some(existing) => existing.same_node(coord),
            None => coord.is_simple_node && detail.title == coord.branch_name,
        }
    })
}

pub fn leaf_exists(messages: &[Message], coord: &NodeCoordinate) -> bool {
    find_leaf(messages, coord).is_some()
}

/// Whether the list satisfies the reading order: user messages before the
/// outline, leaves in non-decreasing coordinate order after it.
pub fn is_ordered(messages: &[Message]) -> bool {
    let first_outline = messages
        .iter()
        .position(|m| m.message_type == MessageType::MainStructure);
    let first_leaf = messages.iter().position(Message::is_leaf);
    if let (Some(outline), Some(leaf)) = (first_outline, first_leaf) {
        if leaf < outline {
            return false;
        }
    }

    let keys: Vec<_> = messages
        .iter()
        .filter_map(|m| m.coordinate().map(NodeCoordinate::sort_key))
        .collect();
    keys.windows(2).all(|w| w[0] <= w[1])
}
