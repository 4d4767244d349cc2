//! Sequential detail generation over every leaf of the outline.

use std::sync::Arc;

use conversation_store::HistorySink;
use outline_core::ordering::leaf_exists;
use outline_core::{Checkpoint, ConversationContext, Dialect, NodeCoordinate};
use outline_llm::CompletionClient;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::detail::DetailGenerator;
use crate::error::{EngineError, Result};
use crate::walker::CoordinateWalker;

/// Progress published while a traversal runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraversalEvent {
    Started {
        conversation_id: String,
        pending: usize,
    },

    NodeSkipped {
        coordinate: NodeCoordinate,
    },

    NodeStarted {
        coordinate: NodeCoordinate,
    },

    NodeCompleted {
        coordinate: NodeCoordinate,
        message_id: String,
    },

    NodeFailed {
        coordinate: NodeCoordinate,
        error: String,
    },

    /// Stopped before starting the node at `resume_at`.
    Cancelled {
        resume_at: Checkpoint,
    },

    Finished {
        generated: usize,
        skipped: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOutcome {
    Finished {
        generated: usize,
        skipped: usize,
    },
    Cancelled {
        generated: usize,
        skipped: usize,
        resume_at: Checkpoint,
    },
}

impl TraversalOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, TraversalOutcome::Finished { .. })
    }

    pub fn generated(&self) -> usize {
        match self {
            TraversalOutcome::Finished { generated, .. }
            | TraversalOutcome::Cancelled { generated, .. } => *generated,
        }
    }
}

pub struct TraversalOrchestrator {
    details: DetailGenerator,
    sink: Arc<dyn HistorySink>,
}

impl TraversalOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, sink: Arc<dyn HistorySink>) -> Self {
        Self {
            details: DetailGenerator::new(client),
            sink,
        }
    }

    /// Generate every missing leaf from `start` (or the stored checkpoint).
    ///
    /// The token is checked before each node; a request already sent is
    /// awaited and its result committed. Each leaf is inserted into both
    /// message lists and saved before the next node starts; a failed save
    /// takes the leaf back out. The first error stops the traversal.
    pub async fn run(
        &self,
        ctx: &mut ConversationContext,
        selected: Option<&Dialect>,
        start: Option<Checkpoint>,
        event_tx: mpsc::Sender<TraversalEvent>,
        cancel_token: CancellationToken,
    ) -> Result<TraversalOutcome> {
        let dialect = ctx.pinned_dialect(selected).ok_or_else(|| {
            EngineError::ConfigurationMissing("no configuration selected".to_string())
        })?;
        let tree = ctx.outline_tree().cloned().ok_or_else(|| {
            EngineError::Validation(format!(
                "the {} is incomplete, generate it before its {}",
                dialect.vocabulary.root, dialect.vocabulary.detail_field
            ))
        })?;

        let start = start.unwrap_or_else(|| ctx.checkpoint());
        let walker = CoordinateWalker::new(&tree, &dialect, start)?;
        let title = ctx.title();
        let pending = walker
            .clone()
            .filter(|c| !leaf_exists(&ctx.messages, c))
            .count();

        log::info!(
            "[{}] Starting traversal at {:?}, {} nodes pending",
            title,
            start,
            pending
        );
        let _ = event_tx
            .send(TraversalEvent::Started {
                conversation_id: ctx.id().to_string(),
                pending,
            })
            .await;

        let mut generated = 0;
        let mut skipped = 0;

        for coordinate in walker {
            if cancel_token.is_cancelled() {
                let resume_at = coordinate.checkpoint();
                log::info!("[{}] Traversal cancelled before {}", title, coordinate.label());
                ctx.set_checkpoint(resume_at);
                if let Err(e) = self.sink.save_conversation(&ctx.history).await {
                    log::warn!("[{}] Failed to save checkpoint: {}", title, e);
                }
                let _ = event_tx.send(TraversalEvent::Cancelled { resume_at }).await;
                return Ok(TraversalOutcome::Cancelled {
                    generated,
                    skipped,
                    resume_at,
                });
            }

            if leaf_exists(&ctx.messages, &coordinate) {
                log::debug!("[{}] Skipping existing node {}", title, coordinate.label());
                skipped += 1;
                let _ = event_tx.send(TraversalEvent::NodeSkipped { coordinate }).await;
                continue;
            }

            log::info!("[{}] Generating node {}", title, coordinate.label());
            let _ = event_tx
                .send(TraversalEvent::NodeStarted {
                    coordinate: coordinate.clone(),
                })
                .await;

            let result = match self
                .details
                .generate(&coordinate, &tree, &ctx.messages, &dialect)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    log::error!("[{}] Node {} failed: {}", title, coordinate.label(), e);
                    ctx.set_checkpoint(coordinate.checkpoint());
                    if let Err(save_err) = self.sink.save_conversation(&ctx.history).await {
                        log::warn!("[{}] Failed to save checkpoint: {}", title, save_err);
                    }
                    let _ = event_tx
                        .send(TraversalEvent::NodeFailed {
                            coordinate,
                            error: e.user_message(),
                        })
                        .await;
                    return Err(e);
                }
            };

            let message = result.into_message(&dialect);
            let message_id = message.id.clone();
            let position = ctx.insert_leaf(message);
            if let Err(e) = self.sink.save_conversation(&ctx.history).await {
                log::error!("[{}] Failed to save node {}: {}", title, coordinate.label(), e);
                ctx.undo_insert(position);
                let err = EngineError::from(e);
                let _ = event_tx
                    .send(TraversalEvent::NodeFailed {
                        coordinate,
                        error: err.user_message(),
                    })
                    .await;
                return Err(err);
            }

            generated += 1;
            log::debug!("[{}] Node {} saved as {}", title, coordinate.label(), message_id);
            let _ = event_tx
                .send(TraversalEvent::NodeCompleted {
                    coordinate,
                    message_id,
                })
                .await;
        }

        ctx.set_checkpoint(Checkpoint::default());
        self.sink.save_conversation(&ctx.history).await?;

        log::info!(
            "[{}] Traversal finished: {} generated, {} skipped",
            title,
            generated,
            skipped
        );
        let _ = event_tx
            .send(TraversalEvent::Finished { generated, skipped })
            .await;
        Ok(TraversalOutcome::Finished { generated, skipped })
    }
}
