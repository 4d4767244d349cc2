//! Configuration (dialect) registry

use std::sync::Arc;

use outline_core::{ConversationRecord, Dialect};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::kv::{get_as, keys, set_as, KeyValueStore};

const NEW_CONFIGURATION_NAME: &str = "New configuration";

struct RegistryState {
    configurations: Vec<Dialect>,
    selected: Option<String>,
}

pub struct ConfigurationRegistry {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<RegistryState>,
}

impl ConfigurationRegistry {
    /// Load configurations, synthesizing the sample one when none exist.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut configurations: Vec<Dialect> =
            match get_as(store.as_ref(), keys::CONFIGURATIONS).await {
                Ok(list) => list.unwrap_or_default(),
                Err(e) => {
                    log::error!("Failed to parse stored configurations: {}", e);
                    Vec::new()
                }
            };

        let mut dirty = false;
        if configurations.is_empty() {
            configurations.push(Dialect::sample());
            dirty = true;
        }

        let stored: Option<String> = get_as(store.as_ref(), keys::SELECTED_CONFIGURATION)
            .await
            .unwrap_or(None);
        let selected = match stored {
            Some(id) if configurations.iter().any(|c| c.id == id) => Some(id),
            _ => {
                dirty = true;
                configurations.first().map(|c| c.id.clone())
            }
        };

        let registry = Self {
            store,
            state: RwLock::new(RegistryState {
                configurations,
                selected,
            }),
        };
        if dirty {
            let state = registry.state.read().await;
            registry.persist(&state).await?;
        }
        Ok(registry)
    }

    async fn persist(&self, state: &RegistryState) -> Result<()> {
        set_as(self.store.as_ref(), keys::CONFIGURATIONS, &state.configurations).await?;
        match &state.selected {
            Some(id) => set_as(self.store.as_ref(), keys::SELECTED_CONFIGURATION, id).await,
            None => self.store.remove(keys::SELECTED_CONFIGURATION).await,
        }
    }

    pub async fn list(&self) -> Vec<Dialect> {
        self.state.read().await.configurations.clone()
    }

    pub async fn get(&self, id: &str) -> Result<Dialect> {
        self.state
            .read()
            .await
            .configurations
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::ConfigurationNotFound(id.to_string()))
    }

    pub async fn selected_id(&self) -> Option<String> {
        self.state.read().await.selected.clone()
    }

    pub async fn selected(&self) -> Option<Dialect> {
        let state = self.state.read().await;
        let id = state.selected.as_ref()?;
        state.configurations.iter().find(|c| &c.id == id).cloned()
    }

    /// Select `id` for `conversation`. Refused once the conversation has an
    /// outline, unless `id` is already the selection.
    pub async fn select(&self, id: &str, conversation: &ConversationRecord) -> Result<Dialect> {
        let mut state = self.state.write().await;
        let dialect = state
            .configurations
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::ConfigurationNotFound(id.to_string()))?;

        if state.selected.as_deref() == Some(id) {
            return Ok(dialect);
        }
        if conversation.has_outline() {
            return Err(StoreError::ConfigurationLocked {
                conversation: conversation.display_title(),
            });
        }

        state.selected = Some(id.to_string());
        self.persist(&state).await?;
        log::info!("Selected configuration {} ({})", dialect.name, dialect.id);
        Ok(dialect)
    }

    /// Add a copy of the default configuration under a fresh id.
    pub async fn add(&self) -> Result<Dialect> {
        let mut state = self.state.write().await;
        let mut dialect = state
            .configurations
            .iter()
            .find(|c| c.id == Dialect::DEFAULT_ID)
            .cloned()
            .unwrap_or_else(Dialect::sample);
        dialect.id = Uuid::new_v4().to_string();
        dialect.name = NEW_CONFIGURATION_NAME.to_string();
        dialect.is_dynamic = false;
        dialect.is_system_config = false;

        state.configurations.push(dialect.clone());
        self.persist(&state).await?;
        Ok(dialect)
    }

    /// Replace configuration `id` with the JSON document `json`. The
    /// document must carry a `name`; its own `id` is ignored.
    pub async fn edit_from_json(&self, id: &str, json: &str) -> Result<Dialect> {
        let value: Value = serde_json::from_str(json)?;
        let has_name = value
            .get("name")
            .and_then(Value::as_str)
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false);
        if !has_name {
            return Err(StoreError::Validation("configuration must have a name".to_string()));
        }

        let mut dialect: Dialect = serde_json::from_value(value)?;
        dialect.id = id.to_string();
        dialect.validate()?;

        let mut state = self.state.write().await;
        let slot = state
            .configurations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::ConfigurationNotFound(id.to_string()))?;
        *slot = dialect.clone();
        self.persist(&state).await?;
        Ok(dialect)
    }

    /// Delete `id`, clearing the selection when it was selected.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.configurations.len();
        state.configurations.retain(|c| c.id != id);
        if state.configurations.len() == before {
            return Err(StoreError::ConfigurationNotFound(id.to_string()));
        }
        if state.selected.as_deref() == Some(id) {
            state.selected = None;
        }
        self.persist(&state).await
    }

    /// Insert or replace a generated configuration and select it for
    /// `conversation`. Refused once the conversation has an outline, since
    /// replacing the selected entry would change its configuration too.
    pub async fn upsert_system(&self, dialect: Dialect, conversation: &ConversationRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if conversation.has_outline() {
            return Err(StoreError::ConfigurationLocked {
                conversation: conversation.display_title(),
            });
        }
        match state.configurations.iter_mut().find(|c| c.id == dialect.id) {
            Some(slot) => *slot = dialect.clone(),
            None => state.configurations.push(dialect.clone()),
        }
        state.selected = Some(dialect.id.clone());
        self.persist(&state).await
    }

    /// Point the selection back at the configuration `conversation` was
    /// outlined with. A pinned system configuration that is no longer listed
    /// is registered again. Conversations without an outline leave the
    /// selection alone.
    pub async fn follow_conversation(&self, conversation: &ConversationRecord) -> Result<Option<Dialect>> {
        let pinned = match (&conversation.dialect, conversation.has_outline()) {
            (Some(dialect), true) => dialect,
            _ => return Ok(None),
        };

        let mut state = self.state.write().await;
        let mut changed = false;
        if !state.configurations.iter().any(|c| c.id == pinned.id) {
            if !pinned.is_system_config {
                log::warn!(
                    "Configuration {} of \"{}\" no longer exists",
                    pinned.id,
                    conversation.display_title()
                );
                return Ok(None);
            }
            state.configurations.push(pinned.clone());
            changed = true;
        }
        if state.selected.as_deref() != Some(pinned.id.as_str()) {
            state.selected = Some(pinned.id.clone());
            changed = true;
        }
        if changed {
            self.persist(&state).await?;
            log::info!(
                "Selected configuration {} ({}) for \"{}\"",
                pinned.name,
                pinned.id,
                conversation.display_title()
            );
        }
        let dialect = state
            .configurations
            .iter()
            .find(|c| c.id == pinned.id)
            .cloned()
            .unwrap_or_else(|| pinned.clone());
        Ok(Some(dialect))
    }

    /// Replace user configurations, keeping system ones. Falls back to the
    /// sample configuration when nothing remains.
    pub async fn replace_user_configurations(
        &self,
        configurations: Vec<Dialect>,
        selected: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let mut merged: Vec<Dialect> = state
            .configurations
            .iter()
            .filter(|c| c.is_system_config)
            .cloned()
            .collect();
        for dialect in configurations.into_iter().filter(|c| !c.is_system_config) {
            merged.retain(|c| c.id != dialect.id);
            merged.push(dialect);
        }
        if merged.is_empty() {
            merged.push(Dialect::sample());
        }

        let previous = state.selected.clone();
        state.selected = selected
            .filter(|id| merged.iter().any(|c| &c.id == id))
            .or_else(|| previous.filter(|id| merged.iter().any(|c| &c.id == id)))
            .or_else(|| merged.first().map(|c| c.id.clone()));
        state.configurations = merged;
        self.persist(&state).await
    }
}
