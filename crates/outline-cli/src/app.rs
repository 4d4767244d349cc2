//! Wiring between the file store, the registries and the workflow.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use conversation_store::{
    ApiSettings, ConfigurationRegistry, ConversationManager, FileKeyValueStore, KeyValueStore,
};
use outline_core::{paths, AppConfig, ConversationContext, Dialect};
use outline_engine::{EngineError, OutlineWorkflow};
use outline_llm::HttpCompletionClient;

/// Endpoint and key after layering flags/env, stored settings and the
/// config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub api_key: Option<String>,
}

/// Flags (and their env vars) first, then settings saved with
/// `outline settings set`, then the config file.
pub fn resolve_endpoint(
    url_flag: Option<&str>,
    key_flag: Option<&str>,
    stored: &ApiSettings,
    config: &AppConfig,
) -> Endpoint {
    let non_blank = |v: &&str| !v.trim().is_empty();
    let url = url_flag
        .filter(non_blank)
        .or(stored.api_url.as_deref().filter(non_blank))
        .unwrap_or(config.api_url.as_str())
        .to_string();
    let api_key = key_flag
        .filter(non_blank)
        .or(stored.api_key.as_deref().filter(non_blank))
        .or(config.api_key.as_deref().filter(non_blank))
        .map(str::to_string);
    Endpoint { url, api_key }
}

pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub manager: Arc<ConversationManager>,
    pub registry: ConfigurationRegistry,
}

impl App {
    pub async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let data_dir = paths::ensure_dir(&config.data_dir())
            .with_context(|| format!("cannot create {}", config.data_dir().display()))?;
        log::debug!("Using data directory {}", data_dir.display());

        let store: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(&data_dir));
        let manager = Arc::new(ConversationManager::load(store.clone()).await?);
        let registry = ConfigurationRegistry::load(store.clone()).await?;
        Ok(Self {
            config,
            store,
            manager,
            registry,
        })
    }

    pub async fn context(&self) -> ConversationContext {
        ConversationContext::new(self.manager.active().await)
    }

    pub async fn selected(&self) -> Option<Dialect> {
        self.registry.selected().await
    }

    pub async fn workflow(&self, url_flag: Option<&str>, key_flag: Option<&str>) -> anyhow::Result<OutlineWorkflow> {
        let stored = ApiSettings::load(self.store.as_ref()).await?;
        let endpoint = resolve_endpoint(url_flag, key_flag, &stored, &self.config);
        let api_key = endpoint.api_key.ok_or_else(|| {
            anyhow!("No API key configured. Use `outline settings set --key <KEY>` or OUTLINE_API_KEY.")
        })?;
        log::debug!("Completion endpoint {} with model {}", endpoint.url, self.config.model);

        let client = HttpCompletionClient::with_proxy(
            endpoint.url,
            api_key,
            self.config.model.clone(),
            &self.config.http_proxy,
        )
        .map_err(|e| engine_error(e.into()))?;
        Ok(OutlineWorkflow::new(Arc::new(client), self.manager.clone()))
    }
}

/// Engine errors carry their own user-facing wording.
pub fn engine_error(e: EngineError) -> anyhow::Error {
    log::debug!("{:?}", e);
    anyhow!(e.user_message())
}
