use std::sync::Arc;

use outline_core::{
    BranchValue, DetailData, Dialect, Message, NodeCoordinate, OutlineTree, Vocabulary,
};
use outline_llm::CompletionClient;
use serde_json::Value;

use crate::digest::sibling_digest;
use crate::error::{EngineError, Result};
use crate::prompt::{build_prompt, DetailNode, DetailTarget, PromptStage};

/// A generated leaf, tagged with its coordinate and ready to become a
/// message.
#[derive(Debug, Clone)]
pub struct DetailResult {
    pub data: DetailData,
    /// Message body; adjusted details carry their headings.
    pub content: String,
}

impl DetailResult {
    pub fn into_message(self, dialect: &Dialect) -> Message {
        Message::detail(self.content, self.data, dialect)
    }
}

/// The outline node a coordinate points at.
struct ResolvedNode {
    section_title: String,
    subsection_title: Option<String>,
    content: String,
}

pub struct DetailGenerator {
    client: Arc<dyn CompletionClient>,
}

impl DetailGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn generate(
        &self,
        coordinate: &NodeCoordinate,
        tree: &OutlineTree,
        messages: &[Message],
        dialect: &Dialect,
    ) -> Result<DetailResult> {
        self.run(coordinate, tree, messages, dialect, None)
            .await
            .map_err(|e| EngineError::failed("generate detail", e))
    }

    /// Regenerate a detail from its current content and the user's
    /// feedback. `nodeIndexes` and `title` stay those of the node.
    pub async fn adjust(
        &self,
        coordinate: &NodeCoordinate,
        tree: &OutlineTree,
        messages: &[Message],
        dialect: &Dialect,
        current: &str,
        feedback: &str,
    ) -> Result<DetailResult> {
        self.run(coordinate, tree, messages, dialect, Some((current, feedback)))
            .await
            .map_err(|e| EngineError::failed("adjust detail", e))
    }

    async fn run(
        &self,
        coordinate: &NodeCoordinate,
        tree: &OutlineTree,
        messages: &[Message],
        dialect: &Dialect,
        adjustment: Option<(&str, &str)>,
    ) -> Result<DetailResult> {
        let vocab = &dialect.vocabulary;
        let node = resolve(coordinate, tree)?;
        let digest = sibling_digest(tree, coordinate, messages, vocab)?;

        let detail_node = match &node.subsection_title {
            Some(subsection_title) => DetailNode::Subsection {
                section_title: &node.section_title,
                subsection_title,
                digest: &digest,
            },
            None => DetailNode::Simple {
                content: &node.content,
            },
        };
        let target = DetailTarget {
            tree,
            coordinate,
            node: detail_node,
        };
        let stage = match adjustment {
            Some((current, feedback)) => PromptStage::AdjustDetail {
                target,
                current,
                feedback,
            },
            None => PromptStage::NewDetail(target),
        };

        let request = build_prompt(dialect, stage).into_request();
        let answer = self.client.complete(&request).await?;
        let detail = read_detail(&answer, vocab)?;

        let content = if adjustment.is_some() {
            render_adjusted(vocab, coordinate, &node, &detail)
        } else {
            detail.clone()
        };

        Ok(DetailResult {
            data: DetailData {
                title: node.section_title,
                subsection_title: node.subsection_title,
                detail,
                detail_id: coordinate.detail_id(),
                node_indexes: Some(coordinate.clone()),
                leaf_type: vocab.leaf_message_type.clone(),
            },
            content,
        })
    }
}

fn resolve(coordinate: &NodeCoordinate, tree: &OutlineTree) -> Result<ResolvedNode> {
    let branch = tree.branch(&coordinate.branch_name).ok_or_else(|| {
        EngineError::Validation(format!(
            "the outline has no branch \"{}\"",
            coordinate.branch_name
        ))
    })?;

    if coordinate.is_simple_node {
        let content = match &coordinate.content {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => branch.value.as_text(),
        };
        return Ok(ResolvedNode {
            section_title: branch.name.clone(),
            subsection_title: None,
            content,
        });
    }

    if !matches!(branch.value, BranchValue::ComplexSections(_)) {
        return Err(EngineError::Validation(format!(
            "branch \"{}\" has no sections",
            coordinate.branch_name
        )));
    }

    let (section, subsection) = tree.subsection_at(
        &coordinate.branch_name,
        coordinate.section_ordinal,
        coordinate.subsection_ordinal,
    )?;
    Ok(ResolvedNode {
        section_title: section.title.clone(),
        subsection_title: Some(subsection.to_string()),
        content: subsection.to_string(),
    })
}

/// Pull the detail text out of the answer, falling back to the common
/// field names when the model ignored the vocabulary.
fn read_detail(answer: &Value, vocab: &Vocabulary) -> Result<String> {
    if let Value::String(text) = answer {
        return Ok(text.clone());
    }

    let value = [vocab.detail_field.as_str(), "detail", "content"]
        .iter()
        .find_map(|key| answer.get(*key).filter(|v| !v.is_null()));

    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(Value::String(_)) | None => Err(EngineError::malformed(
            format!("answer has no \"{}\" field", vocab.detail_field),
            &answer.to_string(),
        )),
        Some(other) => Ok(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
    }
}

fn render_adjusted(
    vocab: &Vocabulary,
    coordinate: &NodeCoordinate,
    node: &ResolvedNode,
    detail: &str,
) -> String {
    match &node.subsection_title {
        Some(subsection_title) => format!(
            "# {} {}: {}\n## {} {}: {}\n\n{}",
            vocab.section,
            coordinate.section_ordinal,
            node.section_title,
            vocab.subsection,
            coordinate.subsection_ordinal,
            subsection_title,
            detail.trim()
        ),
        None => format!("# {}\n\n{}", node.section_title, detail.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_is_read_through_vocabulary_then_fallbacks() {
        let mut vocab = Vocabulary::default();
        vocab.detail_field = "body".to_string();
        assert_eq!(read_detail(&json!({"body": "x"}), &vocab).unwrap(), "x");
        assert_eq!(read_detail(&json!({"content": "y"}), &vocab).unwrap(), "y");
        assert!(read_detail(&json!({"title": "t"}), &vocab).is_err());
        assert!(read_detail(&json!({"body": "  "}), &vocab).is_err());
    }

    #[test]
    fn adjusted_detail_renders_headings() {
        let vocab = Vocabulary::default();
        let coord = NodeCoordinate::complex("Plan", 0, 1, 0);
        let node = ResolvedNode {
            section_title: "Execute".to_string(),
            subsection_title: Some("Announce".to_string()),
            content: "Announce".to_string(),
        };
        assert_eq!(
            render_adjusted(&vocab, &coord, &node, "Post it.\n"),
            "# Step 2: Execute\n## Sub-step 1: Announce\n\nPost it."
        );
    }
}
