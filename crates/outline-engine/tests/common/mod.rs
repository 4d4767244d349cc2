//! Shared fixtures for engine tests: a scripted completion client, sinks
//! and a small two-branch outline.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use conversation_store::{HistorySink, StoreError};
use outline_core::{
    Branch, BranchValue, ConversationContext, ConversationRecord, DetailData, Dialect, Message,
    NodeCoordinate, OutlineTree, Section,
};
use outline_llm::{CompletionClient, CompletionRequest, LLMError};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Replays canned answers in order and records every request.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<Value, LLMError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    /// Cancel the token while answering this (1-based) call.
    cancel_on: Option<(usize, CancellationToken)>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Value>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
            cancel_on: None,
        }
    }

    pub fn with_results(replies: Vec<Result<Value, LLMError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            cancel_on: None,
        }
    }

    pub fn cancel_during(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((call, token));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> outline_llm::Result<Value> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if let Some((on, token)) = &self.cancel_on {
            if *on == call {
                token.cancel();
            }
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LLMError::Transport {
                    status: 500,
                    body: "script exhausted".to_string(),
                })
            })
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Keeps the last saved record; fails the save with the given 1-based
/// number.
#[derive(Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<ConversationRecord>>,
    attempts: AtomicUsize,
    fail_on: Option<usize>,
}

impl RecordingSink {
    pub fn failing_on(attempt: usize) -> Self {
        Self {
            fail_on: Some(attempt),
            ..Default::default()
        }
    }

    pub fn last(&self) -> Option<ConversationRecord> {
        self.saved.lock().unwrap().last().cloned()
    }

    pub fn saves(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl HistorySink for RecordingSink {
    async fn save_conversation(&self, record: &ConversationRecord) -> conversation_store::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(attempt) {
            return Err(StoreError::Storage("disk full".to_string()));
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Two branches: `Plan` (complex) and `Summary` (simple).
pub fn dialect() -> Dialect {
    let mut dialect = Dialect::sample();
    dialect.branch_names = vec!["Plan".to_string(), "Summary".to_string()];
    dialect.complex_branches = vec!["Plan".to_string()];
    dialect.field_descriptions.insert("Plan".to_string(), "Concrete steps".into());
    dialect.field_descriptions.insert("Summary".to_string(), "One paragraph".into());
    dialect
}

pub fn section(title: &str, subs: &[&str]) -> Section {
    Section {
        title: title.to_string(),
        content: subs.iter().map(|s| s.to_string()).collect(),
        detail_flag: true,
    }
}

/// A 2x2 outline under `Plan` only.
pub fn two_by_two() -> OutlineTree {
    OutlineTree {
        root: "Thinking Process".to_string(),
        branches: vec![Branch {
            name: "Plan".to_string(),
            value: BranchValue::ComplexSections(vec![
                section("Prepare", &["Budget", "Team"]),
                section("Execute", &["Announce", "Ship"]),
            ]),
        }],
    }
}

pub fn outline_answer() -> Value {
    json!({
        "Thinking Process": {
            "Plan": [
                {"title": "Prepare", "content": ["Budget", "Team"], "detailFlag": true},
                {"title": "Execute", "content": ["Announce", "Ship"], "detailFlag": true}
            ],
            "Summary": "Launch in Q3"
        }
    })
}

pub fn detail_answer(text: &str) -> Value {
    json!({
        "nodeIndexes": {"sectionOrdinal": 1, "subsectionOrdinal": 1},
        "title": "ignored",
        "detail": text,
        "type": "sectionDetail"
    })
}

pub fn leaf(coordinate: NodeCoordinate, title: &str, detail: &str, dialect: &Dialect) -> Message {
    let data = DetailData {
        title: title.to_string(),
        subsection_title: None,
        detail: detail.to_string(),
        detail_id: coordinate.detail_id(),
        node_indexes: Some(coordinate),
        leaf_type: dialect.vocabulary.leaf_message_type.clone(),
    };
    Message::detail(detail, data, dialect)
}

/// A conversation that already has `tree` as its outline.
pub fn context_with(tree: OutlineTree, dialect: &Dialect) -> ConversationContext {
    let mut ctx = ConversationContext::new(ConversationRecord::new());
    ctx.push(Message::user("Plan a product launch", dialect));
    ctx.set_outline(tree, dialect);
    ctx
}

pub fn client(replies: Vec<Value>) -> Arc<ScriptedClient> {
    Arc::new(ScriptedClient::new(replies))
}
