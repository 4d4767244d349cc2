use std::sync::Arc;

use outline_core::{Dialect, OutlineTree};
use outline_llm::CompletionClient;

use crate::dynamic::reshape_outline;
use crate::error::{EngineError, Result};
use crate::prompt::{build_prompt, PromptStage};

/// Generates and adjusts outline trees. Callers only see a new tree on
/// success, so a failure never touches existing state.
pub struct OutlineGenerator {
    client: Arc<dyn CompletionClient>,
}

impl OutlineGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn generate(&self, request: &str, dialect: &Dialect) -> Result<OutlineTree> {
        self.run(dialect, PromptStage::NewOutline { request })
            .await
            .map_err(|e| EngineError::failed("generate outline", e))
    }

    pub async fn adjust(
        &self,
        current: &OutlineTree,
        feedback: &str,
        dialect: &Dialect,
    ) -> Result<OutlineTree> {
        self.run(
            dialect,
            PromptStage::AdjustOutline {
                tree: current,
                feedback,
            },
        )
        .await
        .map_err(|e| EngineError::failed("adjust outline", e))
    }

    async fn run(&self, dialect: &Dialect, stage: PromptStage<'_>) -> Result<OutlineTree> {
        if dialect.branch_names.is_empty() {
            return Err(EngineError::ConfigurationMissing(format!(
                "configuration \"{}\" defines no branches",
                dialect.name
            )));
        }

        let request = build_prompt(dialect, stage).into_request();
        let mut answer = self.client.complete(&request).await?;
        if dialect.is_dynamic {
            answer = reshape_outline(&answer, dialect);
        }

        let tree = OutlineTree::from_value(&answer, dialect)?;
        log::debug!(
            "Outline \"{}\" parsed: {} branches, {} leaves",
            tree.root,
            tree.branches.len(),
            tree.leaf_count()
        );
        Ok(tree)
    }
}
