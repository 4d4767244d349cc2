use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinate::NodeCoordinate;
use crate::dialect::Dialect;
use crate::outline::OutlineTree;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    User,
    MainStructure,
    SectionDetail,
    Config,
    Text,
}

/// Payload of a generated leaf node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailData {
    /// Section title, or the branch name for a simple node.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection_title: Option<String>,
    pub detail: String,
    /// Missing on records written before coordinates were tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_indexes: Option<NodeCoordinate>,
    #[serde(rename = "type", default)]
    pub leaf_type: String,
    #[serde(default)]
    pub detail_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum MessageData {
    Outline(OutlineTree),
    Detail(DetailData),
    Config(Dialect),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_id", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
    /// Dialect active when the message was produced.
    #[serde(default, alias = "selectedConfig", skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn new(
        role: Role,
        content: impl Into<String>,
        message_type: MessageType,
        data: Option<MessageData>,
        dialect: Option<Dialect>,
    ) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            message_type,
            data,
            dialect,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>, dialect: &Dialect) -> Self {
        Self::new(Role::User, content, MessageType::User, None, Some(dialect.clone()))
    }

    pub fn outline(tree: OutlineTree, dialect: &Dialect) -> Self {
        let content = tree.pretty_json(&dialect.vocabulary);
        Self::new(
            Role::Assistant,
            content,
            MessageType::MainStructure,
            Some(MessageData::Outline(tree)),
            Some(dialect.clone()),
        )
    }

    pub fn detail(content: impl Into<String>, data: DetailData, dialect: &Dialect) -> Self {
        Self::new(
            Role::Assistant,
            content,
            MessageType::SectionDetail,
            Some(MessageData::Detail(data)),
            Some(dialect.clone()),
        )
    }

    pub fn config(dialect: Dialect) -> Self {
        let content = serde_json::to_string_pretty(&dialect).unwrap_or_default();
        Self::new(
            Role::Assistant,
            content,
            MessageType::Config,
            Some(MessageData::Config(dialect.clone())),
            Some(dialect),
        )
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, MessageType::Text, None, None)
    }

    pub fn is_leaf(&self) -> bool {
        self.message_type == MessageType::SectionDetail
    }

    pub fn outline_tree(&self) -> Option<&OutlineTree> {
        match &self.data {
            Some(MessageData::Outline(tree)) => Some(tree),
            _ => None,
        }
    }

    pub fn detail_data(&self) -> Option<&DetailData> {
        match &self.data {
            Some(MessageData::Detail(detail)) => Some(detail),
            _ => None,
        }
    }

    pub fn coordinate(&self) -> Option<&NodeCoordinate> {
        self.detail_data().and_then(|d| d.node_indexes.as_ref())
    }
}
