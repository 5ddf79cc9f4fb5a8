use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::download::DownloadOrchestrator;
use crate::models::Engine;
use crate::registry::SharedRegistry;
use crate::session::{ChatSession, SessionControl};
use crate::utils::{ParleyError, Result};

/// What a successful startup leaves behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContext {
    pub access_token: String,
    pub client_id: Option<String>,
}

/// Startup inputs, usually from config
#[derive(Debug, Clone, Default)]
pub struct RuntimeSettings {
    pub license: Option<String>,
    pub developer_token: Option<String>,
    /// Pause between a full reset and the next startup
    pub restart_delay: Duration,
}

/// Brings the engine up and tears everything down again
pub struct Runtime {
    engine: Arc<dyn Engine>,
    registry: SharedRegistry,
    control: SessionControl,
    chat: Arc<ChatSession>,
    downloads: Arc<DownloadOrchestrator>,
    settings: RuntimeSettings,
    context: RwLock<Option<RuntimeContext>>,
}

impl Runtime {
    pub fn new(
        engine: Arc<dyn Engine>,
        registry: SharedRegistry,
        control: SessionControl,
        chat: Arc<ChatSession>,
        downloads: Arc<DownloadOrchestrator>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            engine,
            registry,
            control,
            chat,
            downloads,
            settings,
            context: RwLock::new(None),
        }
    }

    pub fn context(&self) -> Option<RuntimeContext> {
        self.context.read().clone()
    }

    /// Start the runtime, authorize, and populate the registry
    pub async fn startup(&self) -> Result<RuntimeContext> {
        let license = self
            .settings
            .license
            .as_deref()
            .ok_or_else(|| ParleyError::Configuration("Missing runtime license".into()))?;
        self.engine
            .start_runtime(license)
            .await
            .map_err(|e| ParleyError::Configuration(format!("Runtime failed to start: {}", e)))?;
        info!("Runtime started");

        let developer_token = self
            .settings
            .developer_token
            .as_deref()
            .ok_or_else(|| ParleyError::Authentication("Missing developer id token".into()))?;
        let token = self
            .engine
            .authorize(developer_token)
            .await
            .map_err(|e| ParleyError::Authentication(e.to_string()))?;
        if token.token.is_empty() {
            return Err(ParleyError::Authentication(
                "Runtime returned no access token".into(),
            ));
        }

        let context = RuntimeContext {
            access_token: token.token,
            client_id: token.client_id,
        };
        *self.context.write() = Some(context.clone());
        self.chat.set_access_token(Some(context.access_token.clone()));
        self.downloads
            .set_access_token(Some(context.access_token.clone()));

        let services = self.downloads.refresh().await;
        info!("Authorized, {} services available", services);
        Ok(context)
    }

    /// Reset the runtime and every piece of state, then start again
    pub async fn remove_everything(&self) -> Result<RuntimeContext> {
        warn!("Removing everything");
        self.control.stop_all();

        if let Err(err) = self.engine.reset_runtime().await {
            warn!("Runtime reset failed: {}", err);
        }
        self.downloads.forget_deployment();
        self.chat.reset();
        self.registry.write().clear();

        *self.context.write() = None;
        self.chat.set_access_token(None);
        self.downloads.set_access_token(None);

        if !self.settings.restart_delay.is_zero() {
            tokio::time::sleep(self.settings.restart_delay).await;
        }
        self.startup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TOKEN_TYPE_DEVELOPER;
    use crate::download::{DownloadSettings, MemoryUseCaseStore, UseCaseStore};
    use crate::models::{ModelDescriptor, ModelKind, ProviderKind, UseCase};
    use crate::registry::{CredentialStore, MemoryCredentialStore, ServiceRegistry};
    use crate::test_support::ScriptedEngine;
    use crate::utils::EngineError;
    use serde_json::json;

    struct Fixture {
        engine: Arc<ScriptedEngine>,
        registry: SharedRegistry,
        store: Arc<MemoryUseCaseStore>,
        runtime: Runtime,
    }

    fn fixture(settings: RuntimeSettings) -> Fixture {
        let engine = Arc::new(ScriptedEngine::new());
        let credentials = MemoryCredentialStore::new();
        credentials.save_token(&ProviderKind::OnDevice, TOKEN_TYPE_DEVELOPER, "api-key");
        let registry = ServiceRegistry::shared(Arc::new(credentials));
        let control = SessionControl::new();
        let store = Arc::new(MemoryUseCaseStore::new());
        store.save(&UseCase::new("1", json!({}))).unwrap();

        let chat = Arc::new(ChatSession::new(
            engine.clone(),
            registry.clone(),
            control.clone(),
            0.1,
        ));
        let downloads = Arc::new(DownloadOrchestrator::new(
            engine.clone(),
            registry.clone(),
            control.clone(),
            store.clone(),
            DownloadSettings {
                api_key: Some("api-key".into()),
                use_case_version: Some("1".into()),
                ..Default::default()
            },
        ));
        let runtime = Runtime::new(
            engine.clone(),
            registry.clone(),
            control,
            chat,
            downloads,
            settings,
        );
        Fixture {
            engine,
            registry,
            store,
            runtime,
        }
    }

    fn settings() -> RuntimeSettings {
        RuntimeSettings {
            license: Some("license".into()),
            developer_token: Some("dev".into()),
            restart_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_startup_authorizes_and_refreshes() {
        let f = fixture(settings());
        f.engine
            .set_models(vec![ModelDescriptor::new("llama", ModelKind::Llm)]);

        let context = f.runtime.startup().await.unwrap();
        assert_eq!(context.access_token, "access-dev");
        assert_eq!(context.client_id.as_deref(), Some("client-1"));
        assert_eq!(f.engine.licenses(), vec!["license".to_string()]);
        assert!(f.registry.read().lists_model("llama"));
        assert_eq!(f.runtime.context(), Some(context));
    }

    #[tokio::test]
    async fn test_startup_requires_license_and_token() {
        let f = fixture(RuntimeSettings::default());
        assert!(matches!(
            f.runtime.startup().await,
            Err(ParleyError::Configuration(_))
        ));

        let f = fixture(RuntimeSettings {
            developer_token: None,
            ..settings()
        });
        assert!(matches!(
            f.runtime.startup().await,
            Err(ParleyError::Authentication(_))
        ));

        let f = fixture(settings());
        f.engine.fail_authorize(EngineError::new("expired token", 401));
        assert!(matches!(
            f.runtime.startup().await,
            Err(ParleyError::Authentication(_))
        ));
        assert_eq!(f.runtime.context(), None);
    }

    #[tokio::test]
    async fn test_start_failure_is_configuration_error() {
        let f = fixture(settings());
        f.engine.fail_start(EngineError::new("invalid license", 403));
        assert!(matches!(
            f.runtime.startup().await,
            Err(ParleyError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_everything_resets_and_restarts() {
        let f = fixture(settings());
        f.engine
            .set_models(vec![ModelDescriptor::new("llama", ModelKind::Llm)]);
        f.runtime.startup().await.unwrap();
        assert!(f.registry.read().lists_model("llama"));

        let context = f.runtime.remove_everything().await.unwrap();
        assert_eq!(context.access_token, "access-dev");
        assert_eq!(f.engine.reset_calls(), 1);
        assert_eq!(f.store.load().unwrap(), None);
        assert_eq!(f.engine.licenses().len(), 2);
        // The reset runtime has no models and no use case is deployed
        assert!(!f.registry.read().lists_model("llama"));
    }
}
