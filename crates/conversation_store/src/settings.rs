//! Persisted API endpoint and key.

use serde::Serialize;

use crate::error::Result;
use crate::kv::{get_as, keys, set_as, KeyValueStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

impl ApiSettings {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        Ok(Self {
            api_url: get_as(store, keys::API_URL).await?,
            api_key: get_as(store, keys::API_KEY).await?,
        })
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        save_optional(store, keys::API_URL, self.api_url.as_deref()).await?;
        save_optional(store, keys::API_KEY, self.api_key.as_deref()).await
    }
}

async fn save_optional(store: &dyn KeyValueStore, key: &str, value: Option<&str>) -> Result<()> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => set_as(store, key, v).await,
        None => store.remove(key).await,
    }
}
