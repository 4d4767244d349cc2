//! Markdown rendering of a conversation.

use outline_core::{BranchValue, Message, OutlineTree};

/// Render the outline followed by every generated detail in coordinate
/// order. Details without a coordinate come last, in list order.
pub fn render_markdown(tree: Option<&OutlineTree>, messages: &[Message]) -> String {
    let mut out = String::new();

    if let Some(tree) = tree {
        out.push_str(&format!("# {}\n\n", tree.root));
        for branch in &tree.branches {
            out.push_str(&format!("## {}\n\n", branch.name));
            match &branch.value {
                BranchValue::ComplexSections(sections) => {
                    for section in sections {
                        out.push_str(&format!("### {}\n\n", section.title));
                        for item in &section.content {
                            out.push_str(&format!("- {}\n", item));
                        }
                        out.push('\n');
                    }
                }
                BranchValue::SimpleList(items) => {
                    for item in items {
                        out.push_str(&format!("- {}\n", item));
                    }
                    out.push('\n');
                }
                BranchValue::SimpleValue(text) => {
                    out.push_str(text.trim());
                    out.push_str("\n\n");
                }
            }
        }
    }

    let mut leaves: Vec<&Message> = messages.iter().filter(|m| m.is_leaf()).collect();
    // Stable sort keeps coordinate-less entries in list order at the end.
    leaves.sort_by_key(|m| match m.coordinate() {
        Some(coord) => (0, coord.sort_key()),
        None => (1, (0, 0, 0)),
    });

    for msg in leaves {
        let Some(detail) = msg.detail_data() else {
            continue;
        };
        let heading = match &detail.subsection_title {
            Some(sub) => format!("{}: {}", detail.title, sub),
            None => detail.title.clone(),
        };
        out.push_str(&format!("### {}\n\n", heading));
        if !msg.content.trim().is_empty() {
            out.push_str(msg.content.trim());
            out.push_str("\n\n");
        }
    }

    out
}
