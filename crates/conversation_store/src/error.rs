//! Conversation store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration \"{0}\" not found")]
    ConfigurationNotFound(String),

    #[error("Conversation {0} not found")]
    ConversationNotFound(usize),

    #[error("Cannot switch configuration: conversation \"{conversation}\" already has an outline")]
    ConfigurationLocked { conversation: String },

    #[error(transparent)]
    Core(#[from] outline_core::CoreError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
