use std::sync::Arc;

use crate::app::Config;
use crate::constants::TOKEN_TYPE_DEVELOPER;
use crate::download::{DownloadOrchestrator, UseCaseStore};
use crate::models::{Engine, ProviderKind};
use crate::registry::{CredentialStore, ServiceRegistry, SharedRegistry};
use crate::runtime::Runtime;
use crate::session::{ChatSession, SessionControl};

/// Global application state
///
/// One registry and one set of lane slots shared by the chat session, the
/// download orchestrator and the runtime.
pub struct AppState {
    pub config: Config,
    pub registry: SharedRegistry,
    pub control: SessionControl,
    pub chat: Arc<ChatSession>,
    pub downloads: Arc<DownloadOrchestrator>,
    pub runtime: Runtime,
}

impl AppState {
    /// Wire every component against the host's engine and stores
    pub fn new(
        config: Config,
        engine: Arc<dyn Engine>,
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn UseCaseStore>,
    ) -> Self {
        for (name, key) in config.cloud_credentials() {
            credentials.save_token(&ProviderKind::cloud(name), TOKEN_TYPE_DEVELOPER, &key);
        }

        let registry = ServiceRegistry::shared(credentials);
        let control = SessionControl::new();
        let chat = Arc::new(ChatSession::new(
            engine.clone(),
            registry.clone(),
            control.clone(),
            config.session.temperature,
        ));
        let downloads = Arc::new(DownloadOrchestrator::new(
            engine.clone(),
            registry.clone(),
            control.clone(),
            store,
            config.download_settings(),
        ));
        let runtime = Runtime::new(
            engine,
            registry.clone(),
            control.clone(),
            chat.clone(),
            downloads.clone(),
            config.runtime_settings(),
        );

        Self {
            config,
            registry,
            control,
            chat,
            downloads,
            runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::CloudConfig;
    use crate::download::MemoryUseCaseStore;
    use crate::models::Lane;
    use crate::registry::MemoryCredentialStore;
    use crate::test_support::ScriptedEngine;

    #[tokio::test]
    async fn test_startup_registers_configured_clouds() {
        let mut config = Config::default();
        config.engine.license = Some("license".into());
        config.engine.developer_token = Some("dev".into());
        config.session.refresh_delay_ms = 0;
        config.cloud = vec![CloudConfig {
            name: "gemini".into(),
            model: "gemini-2.0-flash".into(),
            vision: true,
            api_key: Some("g-key".into()),
        }];

        let state = AppState::new(
            config,
            Arc::new(ScriptedEngine::new()),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryUseCaseStore::new()),
        );
        state.runtime.startup().await.unwrap();

        let registry = state.registry.read();
        let candidates = registry.candidates(Lane::Prompt);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id(), "gemini/gemini-2.0-flash");
        assert_eq!(candidates[0].credential.as_deref(), Some("g-key"));
    }
}
