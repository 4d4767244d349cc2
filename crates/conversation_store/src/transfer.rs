//! Import and export of conversations and configurations.
//!
//! Exports never include system configurations. Imports accept both the
//! current key names and the older `chatHistories` / `selectedConfig`
//! spellings; missing keys become empty defaults. Entries that cannot be
//! read are skipped and counted rather than failing the whole import.

use outline_core::{ConversationRecord, Dialect};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::configurations::ConfigurationRegistry;
use crate::error::Result;
use crate::manager::ConversationManager;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub conversations: Vec<ConversationRecord>,
    pub configurations: Vec<Dialect>,
    pub selected_configuration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportBundle {
    #[serde(default, alias = "chatHistories")]
    conversations: Vec<Value>,
    #[serde(default)]
    configurations: Vec<Value>,
    #[serde(default, alias = "selectedConfig")]
    selected_configuration: Option<Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub conversations: usize,
    pub configurations: usize,
    pub skipped: usize,
}

async fn user_configurations(registry: &ConfigurationRegistry) -> Vec<Dialect> {
    registry
        .list()
        .await
        .into_iter()
        .filter(|c| !c.is_system_config)
        .collect()
}

/// The selection, unless it names a configuration the export leaves out.
async fn exported_selection(registry: &ConfigurationRegistry, exported: &[Dialect]) -> Option<String> {
    registry
        .selected_id()
        .await
        .filter(|id| exported.iter().any(|c| &c.id == id))
}

/// A selection is either an id or a whole configuration object.
fn selected_id(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn read_configurations(values: Vec<Value>, report: &mut ImportReport) -> Vec<Dialect> {
    let mut out = Vec::new();
    for value in values {
        match serde_json::from_value::<Dialect>(value) {
            Ok(dialect) if dialect.is_system_config => {}
            Ok(dialect) => match dialect.validate() {
                Ok(()) => out.push(dialect),
                Err(e) => {
                    log::warn!("Skipping invalid configuration {}: {}", dialect.id, e);
                    report.skipped += 1;
                }
            },
            Err(e) => {
                log::warn!("Skipping unreadable configuration: {}", e);
                report.skipped += 1;
            }
        }
    }
    report.configurations = out.len();
    out
}

pub async fn export_all(manager: &ConversationManager, registry: &ConfigurationRegistry) -> Result<String> {
    let configurations = user_configurations(registry).await;
    let bundle = ExportBundle {
        conversations: manager.all().await,
        selected_configuration: exported_selection(registry, &configurations).await,
        configurations,
    };
    Ok(serde_json::to_string_pretty(&bundle)?)
}

pub async fn import_all(
    manager: &ConversationManager,
    registry: &ConfigurationRegistry,
    json: &str,
) -> Result<ImportReport> {
    let bundle: ImportBundle = serde_json::from_str(json)?;
    let mut report = ImportReport::default();

    let mut conversations = Vec::new();
    for value in bundle.conversations {
        match serde_json::from_value::<ConversationRecord>(value) {
            Ok(record) => conversations.push(record),
            Err(e) => {
                log::warn!("Skipping unreadable conversation: {}", e);
                report.skipped += 1;
            }
        }
    }
    report.conversations = conversations.len();

    let configurations = read_configurations(bundle.configurations, &mut report);
    registry
        .replace_user_configurations(configurations, selected_id(bundle.selected_configuration))
        .await?;
    manager.replace_all(conversations).await?;

    log::info!(
        "Imported {} conversations and {} configurations ({} skipped)",
        report.conversations,
        report.configurations,
        report.skipped
    );
    Ok(report)
}

pub async fn export_configurations(registry: &ConfigurationRegistry) -> Result<String> {
    let configurations = user_configurations(registry).await;
    let bundle = ExportBundle {
        conversations: Vec::new(),
        selected_configuration: exported_selection(registry, &configurations).await,
        configurations,
    };
    let mut value = serde_json::to_value(&bundle)?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("conversations");
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

pub async fn import_configurations(registry: &ConfigurationRegistry, json: &str) -> Result<ImportReport> {
    let bundle: ImportBundle = serde_json::from_str(json)?;
    let mut report = ImportReport::default();
    let configurations = read_configurations(bundle.configurations, &mut report);
    registry
        .replace_user_configurations(configurations, selected_id(bundle.selected_configuration))
        .await?;
    Ok(report)
}
