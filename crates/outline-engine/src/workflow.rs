//! One entry point per user action, each ending with a save.

use std::sync::Arc;

use conversation_store::HistorySink;
use outline_core::{Checkpoint, ConversationContext, Dialect, Message, OutlineTree};
use outline_llm::CompletionClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::detail::DetailGenerator;
use crate::dynamic::DynamicConfigGenerator;
use crate::error::{EngineError, Result};
use crate::orchestrator::{TraversalEvent, TraversalOrchestrator, TraversalOutcome};
use crate::outline::OutlineGenerator;

pub struct OutlineWorkflow {
    outlines: OutlineGenerator,
    details: DetailGenerator,
    configs: DynamicConfigGenerator,
    orchestrator: TraversalOrchestrator,
    sink: Arc<dyn HistorySink>,
}

impl OutlineWorkflow {
    pub fn new(client: Arc<dyn CompletionClient>, sink: Arc<dyn HistorySink>) -> Self {
        Self {
            outlines: OutlineGenerator::new(client.clone()),
            details: DetailGenerator::new(client.clone()),
            configs: DynamicConfigGenerator::new(client.clone()),
            orchestrator: TraversalOrchestrator::new(client, sink.clone()),
            sink,
        }
    }

    /// Generate an outline for `request` and record the exchange. Once the
    /// conversation has an outline, its configuration stays pinned.
    pub async fn ask(
        &self,
        ctx: &mut ConversationContext,
        selected: Option<&Dialect>,
        request: &str,
    ) -> Result<OutlineTree> {
        if request.trim().is_empty() {
            return Err(EngineError::Validation("the request is empty".to_string()));
        }
        let dialect = if ctx.has_outline() {
            pinned(ctx, selected)?
        } else {
            selected
                .cloned()
                .or_else(|| ctx.history.dialect.clone())
                .ok_or_else(|| EngineError::ConfigurationMissing("no configuration selected".to_string()))?
        };

        let tree = self.outlines.generate(request, &dialect).await?;

        let snapshot = ctx.clone();
        ctx.push(Message::user(request.trim(), &dialect));
        ctx.set_outline(tree.clone(), &dialect);
        self.save(ctx, snapshot).await?;
        Ok(tree)
    }

    /// Regenerate the current outline from user feedback.
    pub async fn adjust_outline(
        &self,
        ctx: &mut ConversationContext,
        selected: Option<&Dialect>,
        feedback: &str,
    ) -> Result<OutlineTree> {
        let dialect = ctx.pinned_dialect(selected).ok_or_else(|| {
            EngineError::ConfigurationMissing("no configuration selected".to_string())
        })?;
        let current = ctx
            .outline_tree()
            .cloned()
            .ok_or_else(|| EngineError::Validation("there is no outline to adjust".to_string()))?;

        let tree = self.outlines.adjust(&current, feedback, &dialect).await?;

        let snapshot = ctx.clone();
        ctx.push(Message::user(feedback.trim(), &dialect));
        ctx.set_outline(tree.clone(), &dialect);
        self.save(ctx, snapshot).await?;
        Ok(tree)
    }

    pub async fn generate_details(
        &self,
        ctx: &mut ConversationContext,
        selected: Option<&Dialect>,
        start: Option<Checkpoint>,
        event_tx: mpsc::Sender<TraversalEvent>,
        cancel_token: CancellationToken,
    ) -> Result<TraversalOutcome> {
        self.orchestrator
            .run(ctx, selected, start, event_tx, cancel_token)
            .await
    }

    /// Regenerate the detail message `message_id` in place. The message
    /// keeps its id and position.
    pub async fn adjust_detail(
        &self,
        ctx: &mut ConversationContext,
        selected: Option<&Dialect>,
        message_id: &str,
        feedback: &str,
    ) -> Result<Message> {
        let dialect = ctx.pinned_dialect(selected).ok_or_else(|| {
            EngineError::ConfigurationMissing("no configuration selected".to_string())
        })?;
        let tree = ctx
            .outline_tree()
            .cloned()
            .ok_or_else(|| EngineError::Validation("there is no outline yet".to_string()))?;
        let original = ctx
            .find_message(message_id)
            .filter(|m| m.is_leaf())
            .cloned()
            .ok_or_else(|| EngineError::Validation(format!("no detail message \"{}\"", message_id)))?;
        let coordinate = original.coordinate().cloned().ok_or_else(|| {
            EngineError::Validation("the message has no node position and cannot be adjusted".to_string())
        })?;

        let result = self
            .details
            .adjust(
                &coordinate,
                &tree,
                &ctx.messages,
                &dialect,
                &original.content,
                feedback,
            )
            .await?;

        let mut replacement = result.into_message(&dialect);
        replacement.id = original.id.clone();

        let snapshot = ctx.clone();
        ctx.replace_message(message_id, replacement.clone());
        self.save(ctx, snapshot).await?;
        Ok(replacement)
    }

    /// Generate a dynamic configuration and record it in the conversation.
    /// Registering it as the selected configuration is up to the caller.
    pub async fn generate_configuration(
        &self,
        ctx: &mut ConversationContext,
        scenario: &str,
    ) -> Result<Dialect> {
        if ctx.has_outline() {
            return Err(EngineError::Validation(format!(
                "\"{}\" already has an outline; start a new conversation to use another configuration",
                ctx.title()
            )));
        }
        let dialect = self.configs.generate(scenario).await?;

        let snapshot = ctx.clone();
        ctx.push(Message::user(scenario.trim(), &dialect));
        ctx.push(Message::config(dialect.clone()));
        self.save(ctx, snapshot).await?;
        Ok(dialect)
    }

    async fn save(&self, ctx: &mut ConversationContext, snapshot: ConversationContext) -> Result<()> {
        if let Err(e) = self.sink.save_conversation(&ctx.history).await {
            log::error!("[{}] Save failed, restoring previous state: {}", ctx.title(), e);
            *ctx = snapshot;
            return Err(e.into());
        }
        Ok(())
    }
}

/// The conversation's pinned dialect; a different selection is refused.
fn pinned(ctx: &ConversationContext, selected: Option<&Dialect>) -> Result<Dialect> {
    let dialect = ctx
        .pinned_dialect(selected)
        .ok_or_else(|| EngineError::ConfigurationMissing("no configuration selected".to_string()))?;
    match selected {
        Some(other) if other.id != dialect.id => Err(EngineError::Validation(format!(
            "\"{}\" was outlined with configuration \"{}\"; select it again or start a new conversation to use \"{}\"",
            ctx.title(),
            dialect.name,
            other.name
        ))),
        _ => Ok(dialect),
    }
}
