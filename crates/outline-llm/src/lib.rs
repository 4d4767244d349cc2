//! Model adapter and completion client.
//!
//! A model id is classified once into a [`ModelClass`]; the matching
//! [`ModelStrategy`] shapes the request and reads the answer. The
//! [`CompletionClient`] is the only place that touches the network.

pub mod client;
pub mod error;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod strategy;
pub mod timer;
pub mod types;

pub use client::{CompletionClient, HttpCompletionClient};
pub use error::{LLMError, Result};
pub use extract::extract_json;
pub use model::ModelClass;
pub use normalize::normalize_descriptions;
pub use strategy::{strategy_for, ModelStrategy};
pub use types::{ChatMessage, ChatRole, CompletionRequest, FunctionSpec};
