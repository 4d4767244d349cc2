//! Core types for the outline workflow: dialects, the outline tree, node
//! coordinates, messages and conversation state.

pub mod config;
pub mod context;
pub mod coordinate;
pub mod dialect;
pub mod error;
pub mod message;
pub mod ordering;
pub mod outline;
pub mod paths;

pub use config::AppConfig;
pub use context::{ConversationContext, ConversationRecord, InsertPosition};
pub use coordinate::{Checkpoint, NodeCoordinate};
pub use dialect::{BranchKind, Dialect, FieldDescription, Vocabulary};
pub use error::{CoreError, Result};
pub use message::{DetailData, Message, MessageData, MessageType, Role};
pub use outline::{Branch, BranchValue, OutlineTree, Section};
