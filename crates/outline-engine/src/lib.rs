//! Outline and detail generation on top of the completion client.
//!
//! [`OutlineWorkflow`] is the entry point used by front ends: it owns the
//! generators and the traversal orchestrator and saves the conversation
//! after every change.

pub mod detail;
pub mod digest;
pub mod dynamic;
pub mod error;
pub mod orchestrator;
pub mod outline;
pub mod prompt;
pub mod walker;
pub mod workflow;

pub use detail::{DetailGenerator, DetailResult};
pub use digest::sibling_digest;
pub use dynamic::{dialect_from_answer, reshape_outline, DynamicConfigGenerator};
pub use error::{EngineError, Result};
pub use orchestrator::{TraversalEvent, TraversalOrchestrator, TraversalOutcome};
pub use outline::OutlineGenerator;
pub use prompt::{build_prompt, DetailNode, DetailTarget, Prompt, PromptStage};
pub use walker::CoordinateWalker;
pub use workflow::OutlineWorkflow;
