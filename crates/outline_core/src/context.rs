use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinate::Checkpoint;
use crate::dialect::Dialect;
use crate::message::{Message, MessageType};
use crate::ordering;
use crate::outline::OutlineTree;

const TITLE_CHARS: usize = 10;
pub const UNTITLED: &str = "Untitled";

/// Persisted conversation ("chat history").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline_tree: Option<OutlineTree>,
    #[serde(default)]
    pub traversal_checkpoint: Checkpoint,
    #[serde(default, alias = "selectedConfig", skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for ConversationRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationRecord {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            title: String::new(),
            messages: Vec::new(),
            outline_tree: None,
            traversal_checkpoint: Checkpoint::default(),
            dialect: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// First characters of the first message, or `Untitled`.
    pub fn display_title(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.clone();
        }
        match self.messages.first() {
            Some(first) if !first.content.trim().is_empty() => {
                first.content.trim().chars().take(TITLE_CHARS).collect()
            }
            _ => UNTITLED.to_string(),
        }
    }

    pub fn has_outline(&self) -> bool {
        self.outline_tree.is_some()
            || self
                .messages
                .iter()
                .any(|m| m.message_type == MessageType::MainStructure)
    }

    /// Case-insensitive keyword match over the title and message bodies.
    pub fn matches(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.display_title().to_lowercase().contains(&needle)
            || self
                .messages
                .iter()
                .any(|m| m.content.to_lowercase().contains(&needle))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Live state of the active conversation.
///
/// `messages` is what the user sees; `history` is the mirror that gets
/// persisted. Every mutation goes through methods that touch both so they
/// never drift apart.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub messages: Vec<Message>,
    pub history: ConversationRecord,
}

/// Where a leaf landed in both lists, used to undo an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPosition {
    pub live: usize,
    pub history: usize,
}

impl ConversationContext {
    pub fn new(record: ConversationRecord) -> Self {
        Self {
            messages: record.messages.clone(),
            history: record,
        }
    }

    pub fn id(&self) -> &str {
        &self.history.id
    }

    pub fn title(&self) -> String {
        self.history.display_title()
    }

    pub fn outline_tree(&self) -> Option<&OutlineTree> {
        self.history.outline_tree.as_ref()
    }

    pub fn has_outline(&self) -> bool {
        self.history.has_outline()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.history.traversal_checkpoint
    }

    pub fn set_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.history.traversal_checkpoint = checkpoint;
    }

    /// Dialect recorded on the most recent outline message, falling back to
    /// the conversation's dialect and then to `selected`.
    pub fn pinned_dialect(&self, selected: Option<&Dialect>) -> Option<Dialect> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.message_type == MessageType::MainStructure)
            .find_map(|m| m.dialect.clone())
            .or_else(|| self.history.dialect.clone())
            .or_else(|| selected.cloned())
    }

    /// Append to both lists.
    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg.clone());
        self.history.messages.push(msg);
        self.history.touch();
    }

    /// Record a new outline message and make its tree current.
    pub fn set_outline(&mut self, tree: OutlineTree, dialect: &Dialect) {
        self.history.outline_tree = Some(tree.clone());
        self.history.dialect = Some(dialect.clone());
        self.history.traversal_checkpoint = Checkpoint::default();
        self.push(Message::outline(tree, dialect));
    }

    /// Insert a leaf at its sorted position in both lists.
    pub fn insert_leaf(&mut self, msg: Message) -> InsertPosition {
        let history = ordering::insert_sorted(&mut self.history.messages, msg.clone());
        let live = ordering::insert_sorted(&mut self.messages, msg);
        self.history.touch();
        InsertPosition { live, history }
    }

    pub fn undo_insert(&mut self, pos: InsertPosition) {
        if pos.live < self.messages.len() {
            self.messages.remove(pos.live);
        }
        if pos.history < self.history.messages.len() {
            self.history.messages.remove(pos.history);
        }
    }

    /// Swap the message with `id` for `replacement` in both lists. Returns
    /// the previous message.
    pub fn replace_message(&mut self, id: &str, replacement: Message) -> Option<Message> {
        let live = self.messages.iter().position(|m| m.id == id)?;
        let previous = std::mem::replace(&mut self.messages[live], replacement.clone());
        if let Some(hist) = self.history.messages.iter().position(|m| m.id == id) {
            self.history.messages[hist] = replacement;
        }
        self.history.touch();
        Some(previous)
    }

    pub fn find_message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Snapshot of the persisted side.
    pub fn record(&self) -> ConversationRecord {
        self.history.clone()
    }
}
