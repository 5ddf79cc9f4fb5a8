use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::phase::{format_elapsed, is_complete, progress_percent, DownloadPhase};
use super::store::{load_matching, UseCaseStore};
use crate::constants::TOKEN_TYPE_DEVELOPER;
use crate::models::{
    ConnectionParams, DownloadEvent, DownloadRequest, Engine, Lane, ModelSpec, ProviderKind,
    UseCase,
};
use crate::registry::{refresh_registry, CloudModel, RefreshSource, SharedRegistry};
use crate::session::SessionControl;
use crate::stream::{CancelHandle, CancellableStream};
use crate::utils::{ParleyError, Result};

/// Static inputs of the downloader, usually from config
#[derive(Debug, Clone, Default)]
pub struct DownloadSettings {
    pub api_key: Option<String>,
    /// Use-case descriptor to deploy when none is deployed
    pub use_case: Option<serde_json::Value>,
    pub use_case_version: Option<String>,
    pub connection: ConnectionParams,
    pub clouds: Vec<CloudModel>,
    pub refresh_delay: Duration,
}

/// A finished download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    pub model_id: String,
    pub elapsed: Duration,
    /// Whether the model was put into the prompt slot
    pub auto_selected: bool,
}

impl DownloadReport {
    pub fn message(&self) -> String {
        format!("Download completed in: {}", format_elapsed(self.elapsed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Ready(DownloadReport),
    Cancelled { model_id: String },
}

/// Drives use-case deployment and model acquisition
///
/// NoUseCase -> Deploying -> Deployed -> Downloading -> Verifying -> Ready,
/// with Failed reachable from every step and Cancelled from Downloading.
/// The deployed use case outlives failed downloads.
pub struct DownloadOrchestrator {
    engine: Arc<dyn Engine>,
    registry: SharedRegistry,
    control: SessionControl,
    store: Arc<dyn UseCaseStore>,
    settings: DownloadSettings,
    access_token: RwLock<Option<String>>,
    deployed: Mutex<Option<UseCase>>,
    just_completed: Mutex<Option<String>>,
    phase: watch::Sender<DownloadPhase>,
}

impl DownloadOrchestrator {
    pub fn new(
        engine: Arc<dyn Engine>,
        registry: SharedRegistry,
        control: SessionControl,
        store: Arc<dyn UseCaseStore>,
        settings: DownloadSettings,
    ) -> Self {
        let deployed = load_matching(store.as_ref(), settings.use_case_version.as_deref());
        let initial = match &deployed {
            Some(use_case) => DownloadPhase::Deployed(use_case.clone()),
            None => DownloadPhase::NoUseCase,
        };
        let (phase, _) = watch::channel(initial);

        Self {
            engine,
            registry,
            control,
            store,
            settings,
            access_token: RwLock::new(None),
            deployed: Mutex::new(deployed),
            just_completed: Mutex::new(None),
            phase,
        }
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    pub fn phase(&self) -> DownloadPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadPhase> {
        self.phase.subscribe()
    }

    pub fn deployed_use_case(&self) -> Option<UseCase> {
        self.deployed.lock().clone()
    }

    /// Model whose progress reached 100.00 and is waiting to be auto-selected
    pub fn just_completed(&self) -> Option<String> {
        self.just_completed.lock().clone()
    }

    /// Inputs for a registry refresh with the current deployment
    pub fn refresh_source(&self) -> RefreshSource {
        RefreshSource {
            access_token: self.access_token.read().clone(),
            use_case: self.deployed_use_case(),
            connection: self.settings.connection.clone(),
            clouds: self.settings.clouds.clone(),
            delay: self.settings.refresh_delay,
        }
    }

    pub async fn refresh(&self) -> usize {
        let source = self.refresh_source();
        refresh_registry(self.engine.as_ref(), &self.registry, &source).await
    }

    /// Deploy the configured use case unless one is already deployed
    pub async fn ensure_deployed(&self) -> Result<UseCase> {
        if let Some(use_case) = self.deployed_use_case() {
            return Ok(use_case);
        }
        let (access_token, api_key) = self.credentials()?;
        self.deploy(&access_token, &api_key).await
    }

    /// Fetch a model, verify it, register it
    ///
    /// The download lane is held from before deployment until the model is
    /// verified, so a second call fails with `LaneBusy`.
    pub async fn download(&self, spec: ModelSpec) -> Result<DownloadOutcome> {
        let (access_token, api_key) = self.credentials()?;
        let handle = CancelHandle::new();
        self.control.acquire(Lane::Download, handle.clone())?;

        let result = self
            .run_download(spec, &access_token, &api_key, handle.clone())
            .await;
        self.control.release(Lane::Download, &handle);
        result
    }

    async fn run_download(
        &self,
        spec: ModelSpec,
        access_token: &str,
        api_key: &str,
        handle: CancelHandle,
    ) -> Result<DownloadOutcome> {
        let started = Instant::now();
        let use_case = match self.deployed_use_case() {
            Some(use_case) => use_case,
            None => self.deploy(access_token, api_key).await?,
        };

        let model_id = spec.id.clone();
        *self.just_completed.lock() = None;
        self.set_phase(DownloadPhase::Downloading {
            model_id: model_id.clone(),
            progress: 0.0,
        });
        info!("Downloading model {}", model_id);

        let request = DownloadRequest {
            model: spec,
            access_token: access_token.to_string(),
            api_key: api_key.to_string(),
            use_case: use_case.clone(),
        };
        let provider = match self.engine.stream_model_download(request).await {
            Ok(provider) => provider,
            Err(err) => return Err(self.fail(ParleyError::Transport(err.to_string()))),
        };

        let mut stream = CancellableStream::with_handle(provider, handle);
        let received = self.consume(&mut stream, &model_id).await;

        let completed_id = match received {
            Ok(Some(id)) => id,
            Ok(None) if stream.is_cancelled() => {
                info!("Download of {} cancelled", model_id);
                *self.just_completed.lock() = None;
                self.set_phase(DownloadPhase::Cancelled {
                    model_id: model_id.clone(),
                });
                return Ok(DownloadOutcome::Cancelled { model_id });
            }
            Ok(None) => {
                return Err(self.reject(
                    &model_id,
                    format!("download of {} ended before completion", model_id),
                ))
            }
            Err(err) => return Err(self.fail(err)),
        };

        self.set_phase(DownloadPhase::Verifying {
            model_id: model_id.clone(),
        });
        if completed_id != model_id {
            return Err(self.reject(
                &model_id,
                format!("expected {}, runtime reported {}", model_id, completed_id),
            ));
        }
        match self
            .engine
            .confirm_model_available(&model_id, access_token, api_key, &use_case)
            .await
        {
            Ok(found) if found.id == model_id => {}
            Ok(found) => {
                return Err(self.reject(
                    &model_id,
                    format!("expected {}, found {}", model_id, found.id),
                ))
            }
            Err(err) => return Err(self.reject(&model_id, err.to_string())),
        }

        self.refresh().await;
        self.set_phase(DownloadPhase::Ready {
            model_id: model_id.clone(),
        });
        let auto_selected = self.auto_select();

        let report = DownloadReport {
            model_id,
            elapsed: started.elapsed(),
            auto_selected,
        };
        info!("{}", report.message());
        Ok(DownloadOutcome::Ready(report))
    }

    /// Delete an installed model, then refresh the registry either way
    pub async fn delete_model(&self, model_id: &str) -> Result<()> {
        let (access_token, api_key) = self.credentials()?;
        let use_case = self.deployed_use_case().ok_or_else(|| {
            ParleyError::Configuration("No use case deployed, nothing to delete".into())
        })?;
        let result = self
            .engine
            .delete_model(model_id, &access_token, &api_key, &use_case)
            .await;
        self.refresh().await;

        match result {
            Ok(()) => {
                info!("Deleted model {}", model_id);
                Ok(())
            }
            Err(err) => {
                error!("Failed to delete {}: {}", model_id, err);
                Err(ParleyError::Transport(err.to_string()))
            }
        }
    }

    /// Drop the stored deployment, e.g. before a runtime reset
    pub fn forget_deployment(&self) {
        if let Err(err) = self.store.clear() {
            warn!("Failed to clear stored use case: {}", err);
        }
        *self.deployed.lock() = None;
        *self.just_completed.lock() = None;
        self.set_phase(DownloadPhase::NoUseCase);
    }

    fn credentials(&self) -> Result<(String, String)> {
        let access_token = self
            .access_token
            .read()
            .clone()
            .ok_or_else(|| ParleyError::Authentication("Runtime is not authorized".into()))?;
        let api_key = self
            .settings
            .api_key
            .clone()
            .ok_or_else(|| ParleyError::Configuration("Missing use case API key".into()))?;
        Ok((access_token, api_key))
    }

    async fn deploy(&self, access_token: &str, api_key: &str) -> Result<UseCase> {
        let Some(descriptor) = self.settings.use_case.clone() else {
            return Err(self.fail(ParleyError::Configuration(
                "No use case descriptor configured".into(),
            )));
        };

        self.set_phase(DownloadPhase::Deploying);
        info!("Deploying use case");
        let use_case = match self
            .engine
            .deploy_use_case(access_token, api_key, &descriptor)
            .await
        {
            Ok(use_case) => use_case,
            Err(err) => {
                let err = self.fail(ParleyError::Transport(err.to_string()));
                self.refresh().await;
                return Err(err);
            }
        };

        if let Err(err) = self.store.save(&use_case) {
            warn!("Failed to persist use case: {}", err);
        }
        *self.deployed.lock() = Some(use_case.clone());
        self.registry
            .read()
            .credentials()
            .save_token(&ProviderKind::OnDevice, TOKEN_TYPE_DEVELOPER, api_key);
        self.set_phase(DownloadPhase::Deployed(use_case.clone()));

        self.refresh().await;
        Ok(use_case)
    }

    // Returns the completed model id, or None when the stream ended without one
    async fn consume(
        &self,
        stream: &mut CancellableStream<DownloadEvent>,
        model_id: &str,
    ) -> Result<Option<String>> {
        while let Some(item) = stream.next().await {
            match item {
                Ok(DownloadEvent::Progress {
                    bytes_transferred,
                    total_bytes,
                }) => {
                    let progress = progress_percent(bytes_transferred, total_bytes);
                    if is_complete(progress) {
                        *self.just_completed.lock() = Some(model_id.to_string());
                    }
                    debug!("{}: {:.2}%", model_id, progress);
                    self.set_phase(DownloadPhase::Downloading {
                        model_id: model_id.to_string(),
                        progress,
                    });
                }
                Ok(DownloadEvent::Completed { model_id }) => return Ok(Some(model_id)),
                Err(ParleyError::Decode(reason)) => {
                    warn!("Skipping malformed download event: {}", reason);
                }
                Err(err) => {
                    stream.cancel();
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    // Put the new model into the prompt slot when the choice is obvious
    fn auto_select(&self) -> bool {
        let just_completed = self.just_completed.lock().take();
        let mut registry = self.registry.write();

        let target = {
            let on_device = registry.on_device_services();
            if on_device.len() == 1 {
                Some(on_device[0].clone())
            } else {
                just_completed.and_then(|id| {
                    on_device
                        .iter()
                        .find(|s| s.model_id() == Some(id.as_str()))
                        .map(|s| (*s).clone())
                })
            }
        };

        match target {
            Some(service) => match registry.select(Lane::Prompt, service) {
                Ok(()) => true,
                Err(err) => {
                    debug!("Auto-select skipped: {}", err);
                    false
                }
            },
            None => false,
        }
    }

    fn reject(&self, model_id: &str, reason: String) -> ParleyError {
        if self.registry.write().remove_model(model_id) {
            debug!("Removed unverified model {} from registry", model_id);
        }
        *self.just_completed.lock() = None;
        self.fail(ParleyError::Verification(reason))
    }

    fn fail(&self, err: ParleyError) -> ParleyError {
        error!("Download failed: {}", err);
        self.set_phase(DownloadPhase::Failed(err.clone()));
        err
    }

    fn set_phase(&self, phase: DownloadPhase) {
        self.phase.send_replace(phase);
    }
}
