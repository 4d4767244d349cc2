//! Dynamic configurations: dialects generated from a business scenario, and
//! the reshaping their loosely keyed outline answers need.

use std::sync::Arc;

use outline_core::Dialect;
use outline_llm::CompletionClient;
use serde_json::{json, Map, Value};

use crate::error::{EngineError, Result};
use crate::prompt::dynamic_config_request;

const MIN_BRANCHES: usize = 2;
const MAX_BRANCHES: usize = 36;
const REQUIRED_PARTS: [&str; 3] = ["terms", "fixedDescriptions", "systemRolePrompt"];

pub struct DynamicConfigGenerator {
    client: Arc<dyn CompletionClient>,
}

impl DynamicConfigGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn generate(&self, scenario: &str) -> Result<Dialect> {
        if scenario.trim().is_empty() {
            return Err(EngineError::failed(
                "generate configuration",
                EngineError::Validation("the business scenario is empty".to_string()),
            ));
        }

        let request = dynamic_config_request(scenario);
        let answer = self
            .client
            .complete(&request)
            .await
            .map_err(|e| EngineError::failed("generate configuration", e.into()))?;

        let dialect = dialect_from_answer(&answer)
            .map_err(|e| EngineError::failed("generate configuration", e))?;
        log::info!(
            "Generated dynamic configuration \"{}\" with {} branches",
            dialect.name,
            dialect.branch_names.len()
        );
        Ok(dialect)
    }
}

/// Validate a generated configuration and turn it into the `dynamic`
/// system dialect.
pub fn dialect_from_answer(answer: &Value) -> Result<Dialect> {
    let obj = answer
        .as_object()
        .ok_or_else(|| EngineError::Validation("configuration answer is not an object".to_string()))?;

    let missing: Vec<&str> = REQUIRED_PARTS
        .iter()
        .copied()
        .filter(|key| obj.get(*key).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::Validation(format!(
            "configuration is missing {}",
            missing.join(", ")
        )));
    }

    let terms = &obj["terms"];
    if terms["node1"].as_str().map_or(true, |s| s.trim().is_empty()) {
        return Err(EngineError::Validation("terms.node1 is missing".to_string()));
    }
    let branches = terms["node2"]
        .as_array()
        .ok_or_else(|| EngineError::Validation("terms.node2 must be a list".to_string()))?;
    if !terms["node2ComplexItems"].is_array() {
        return Err(EngineError::Validation(
            "terms.node2ComplexItems must be a list".to_string(),
        ));
    }
    if branches.len() < MIN_BRANCHES || branches.len() > MAX_BRANCHES {
        return Err(EngineError::Validation(format!(
            "terms.node2 must list between {} and {} steps, got {}",
            MIN_BRANCHES,
            MAX_BRANCHES,
            branches.len()
        )));
    }

    let mut dialect: Dialect = serde_json::from_value(answer.clone())
        .map_err(|e| EngineError::Validation(format!("configuration is unreadable: {}", e)))?;
    dialect.vocabulary.fill_defaults();
    dialect.validate()?;
    dialect.repair_descriptions()?;

    dialect.id = Dialect::DYNAMIC_ID.to_string();
    dialect.name = format!("Dynamic: {}", dialect.vocabulary.root);
    dialect.is_dynamic = true;
    dialect.is_system_config = true;
    Ok(dialect)
}

/// Re-key a dynamic dialect's outline answer under the dialect root and
/// coerce every branch to the shape the dialect expects.
///
/// The first object-valued key of the answer is taken as the root. Branches
/// come out in `branchNames` order; branches the answer lacks stay absent.
pub fn reshape_outline(answer: &Value, dialect: &Dialect) -> Value {
    let vocab = &dialect.vocabulary;
    let Some(obj) = answer.as_object() else {
        return answer.clone();
    };

    let body = obj
        .get(&vocab.root)
        .and_then(Value::as_object)
        .or_else(|| {
            if dialect.branch_names.iter().any(|b| obj.contains_key(b)) {
                None
            } else {
                obj.values().find_map(Value::as_object)
            }
        })
        .unwrap_or(obj);

    let mut reshaped = Map::new();
    for name in &dialect.branch_names {
        let Some(raw) = body.get(name) else {
            continue;
        };
        let value = if dialect.is_complex(name) {
            coerce_sections(raw, dialect)
        } else {
            coerce_simple(raw, dialect, name)
        };
        reshaped.insert(name.clone(), value);
    }

    let mut root = Map::new();
    root.insert(vocab.root.clone(), Value::Object(reshaped));
    Value::Object(root)
}

fn coerce_sections(raw: &Value, dialect: &Dialect) -> Value {
    let vocab = &dialect.vocabulary;
    let items: Vec<Value> = match raw {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    };

    let sections = items
        .into_iter()
        .map(|item| {
            let mut section = match item {
                Value::Object(map) => map,
                Value::String(title) => {
                    let mut map = Map::new();
                    map.insert(vocab.title_field.clone(), Value::String(title));
                    map
                }
                other => {
                    let mut map = Map::new();
                    map.insert(vocab.title_field.clone(), Value::String(other.to_string()));
                    map
                }
            };

            let content = match section.remove(&vocab.section_content_field) {
                Some(Value::Array(items)) => Value::Array(items),
                Some(Value::String(text)) if !text.trim().is_empty() => json!([text]),
                _ => json!([]),
            };
            section.insert(vocab.section_content_field.clone(), content);
            section.insert(vocab.detail_flag_field.clone(), Value::Bool(true));
            Value::Object(section)
        })
        .collect();

    Value::Array(sections)
}

fn coerce_simple(raw: &Value, dialect: &Dialect, name: &str) -> Value {
    let vocab = &dialect.vocabulary;
    match raw {
        Value::String(_) => raw.clone(),
        Value::Object(map) => map
            .get(&vocab.title_field)
            .or_else(|| map.get(&vocab.section_content_field))
            .map(|v| match v {
                Value::String(text) => Value::String(text.clone()),
                other => Value::String(other.to_string()),
            })
            .unwrap_or_else(|| Value::String(String::new())),
        Value::Array(items) if dialect.wants_list(name) => Value::Array(items.clone()),
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    }
}
