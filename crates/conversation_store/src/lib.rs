//! Conversation and configuration persistence over a key-value store.

pub mod configurations;
pub mod error;
pub mod kv;
pub mod manager;
pub mod markdown;
pub mod settings;
pub mod transfer;

pub use configurations::ConfigurationRegistry;
pub use error::{Result, StoreError};
pub use kv::{keys, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use manager::{ConversationManager, ConversationSummary, HistorySink};
pub use markdown::render_markdown;
pub use settings::ApiSettings;
pub use transfer::{export_all, export_configurations, import_all, import_configurations, ImportReport};
