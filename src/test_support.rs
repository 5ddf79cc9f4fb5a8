//! Scripted in-memory engine for unit tests

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::models::{
    AccessToken, ChatRequest, CompletionEvent, DownloadEvent, DownloadRequest, Engine,
    ModelDescriptor, UseCase,
};
use crate::stream::{ProviderStream, RequestHandle};
use crate::utils::{EngineError, Result};

/// Events for one stream. `open` keeps the sender so the test can push more
struct StreamScript<T> {
    events: Vec<Result<T>>,
    open: bool,
}

#[derive(Default)]
struct EngineState {
    models: Vec<ModelDescriptor>,
    list_error: Option<EngineError>,
    start_error: Option<EngineError>,
    authorize_error: Option<EngineError>,
    deploy_error: Option<EngineError>,
    confirm_error: Option<EngineError>,
    delete_error: Option<EngineError>,
    chat_scripts: VecDeque<StreamScript<CompletionEvent>>,
    download_scripts: VecDeque<StreamScript<DownloadEvent>>,
    chat_sender: Option<mpsc::UnboundedSender<Result<CompletionEvent>>>,
    download_sender: Option<mpsc::UnboundedSender<Result<DownloadEvent>>>,
    chat_requests: Vec<ChatRequest>,
    download_requests: Vec<DownloadRequest>,
    tokens: Vec<CancellationToken>,
    licenses: Vec<String>,
    deploy_calls: usize,
    reset_calls: usize,
    deleted: Vec<String>,
    yield_on_open: bool,
}

pub struct ScriptedEngine {
    state: Mutex<EngineState>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn set_models(&self, models: Vec<ModelDescriptor>) {
        self.state.lock().models = models;
    }

    /// Suspend once inside every stream open, letting a concurrent caller run
    pub fn yield_on_open(&self) {
        self.state.lock().yield_on_open = true;
    }

    async fn pause_if_scripted(&self) {
        let pause = self.state.lock().yield_on_open;
        if pause {
            tokio::task::yield_now().await;
        }
    }

    pub fn fail_list(&self, err: EngineError) {
        self.state.lock().list_error = Some(err);
    }

    pub fn fail_start(&self, err: EngineError) {
        self.state.lock().start_error = Some(err);
    }

    pub fn fail_authorize(&self, err: EngineError) {
        self.state.lock().authorize_error = Some(err);
    }

    pub fn fail_deploy(&self, err: Option<EngineError>) {
        self.state.lock().deploy_error = err;
    }

    pub fn fail_confirm(&self, err: EngineError) {
        self.state.lock().confirm_error = Some(err);
    }

    pub fn fail_delete(&self, err: EngineError) {
        self.state.lock().delete_error = Some(err);
    }

    /// Next chat stream delivers `events` and closes
    pub fn script_chat(&self, events: Vec<Result<CompletionEvent>>) {
        self.state.lock().chat_scripts.push_back(StreamScript {
            events,
            open: false,
        });
    }

    /// Next chat stream delivers `events` and stays open
    pub fn script_open_chat(&self, events: Vec<Result<CompletionEvent>>) {
        self.state
            .lock()
            .chat_scripts
            .push_back(StreamScript { events, open: true });
    }

    pub fn script_download(&self, events: Vec<Result<DownloadEvent>>) {
        self.state.lock().download_scripts.push_back(StreamScript {
            events,
            open: false,
        });
    }

    pub fn script_open_download(&self, events: Vec<Result<DownloadEvent>>) {
        self.state
            .lock()
            .download_scripts
            .push_back(StreamScript { events, open: true });
    }

    /// Sender of the most recent open chat stream
    pub fn chat_sender(&self) -> Option<mpsc::UnboundedSender<Result<CompletionEvent>>> {
        self.state.lock().chat_sender.clone()
    }

    pub fn download_sender(&self) -> Option<mpsc::UnboundedSender<Result<DownloadEvent>>> {
        self.state.lock().download_sender.clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.state.lock().chat_requests.clone()
    }

    pub fn download_requests(&self) -> Vec<DownloadRequest> {
        self.state.lock().download_requests.clone()
    }

    /// Cancellation tokens handed out with every request, in order
    pub fn request_tokens(&self) -> Vec<CancellationToken> {
        self.state.lock().tokens.clone()
    }

    pub fn licenses(&self) -> Vec<String> {
        self.state.lock().licenses.clone()
    }

    pub fn deploy_calls(&self) -> usize {
        self.state.lock().deploy_calls
    }

    pub fn reset_calls(&self) -> usize {
        self.state.lock().reset_calls
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    fn open_stream<T: Send + 'static>(
        &self,
        script: Option<StreamScript<T>>,
        prefix: &str,
    ) -> (ProviderStream<T>, Option<mpsc::UnboundedSender<Result<T>>>) {
        let (handle_tx, handle_rx) = oneshot::channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        let request = RequestHandle::new(format!("{}-{}", prefix, state.tokens.len() + 1));
        state.tokens.push(request.token());
        drop(state);
        let _ = handle_tx.send(request);

        let script = script.unwrap_or(StreamScript {
            events: Vec::new(),
            open: true,
        });
        for event in script.events {
            let _ = event_tx.send(event);
        }
        let live = script.open.then_some(event_tx);

        (
            ProviderStream::new(handle_rx, UnboundedReceiverStream::new(event_rx).boxed()),
            live,
        )
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn start_runtime(&self, license: &str) -> std::result::Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(err) = state.start_error.clone() {
            return Err(err);
        }
        state.licenses.push(license.to_string());
        Ok(())
    }

    async fn authorize(
        &self,
        developer_token: &str,
    ) -> std::result::Result<AccessToken, EngineError> {
        if let Some(err) = self.state.lock().authorize_error.clone() {
            return Err(err);
        }
        Ok(AccessToken {
            token: format!("access-{}", developer_token),
            client_id: Some("client-1".into()),
        })
    }

    async fn list_models(
        &self,
        _access_token: &str,
        _api_key: &str,
        _use_case: &UseCase,
    ) -> std::result::Result<Vec<ModelDescriptor>, EngineError> {
        let state = self.state.lock();
        match &state.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.models.clone()),
        }
    }

    async fn deploy_use_case(
        &self,
        _access_token: &str,
        _api_key: &str,
        descriptor: &serde_json::Value,
    ) -> std::result::Result<UseCase, EngineError> {
        let mut state = self.state.lock();
        state.deploy_calls += 1;
        if let Some(err) = state.deploy_error.clone() {
            return Err(err);
        }
        Ok(UseCase {
            id: Some("use-case-1".into()),
            version: descriptor
                .get("version")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            descriptor: descriptor.clone(),
        })
    }

    async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ProviderStream<CompletionEvent>, EngineError> {
        self.pause_if_scripted().await;
        let script = {
            let mut state = self.state.lock();
            state.chat_requests.push(request);
            state.chat_scripts.pop_front()
        };
        let (stream, live) = self.open_stream(script, "chat");
        if live.is_some() {
            self.state.lock().chat_sender = live;
        }
        Ok(stream)
    }

    async fn stream_model_download(
        &self,
        request: DownloadRequest,
    ) -> std::result::Result<ProviderStream<DownloadEvent>, EngineError> {
        self.pause_if_scripted().await;
        let script = {
            let mut state = self.state.lock();
            state.download_requests.push(request);
            state.download_scripts.pop_front()
        };
        let (stream, live) = self.open_stream(script, "download");
        if live.is_some() {
            self.state.lock().download_sender = live;
        }
        Ok(stream)
    }

    async fn confirm_model_available(
        &self,
        model_id: &str,
        _access_token: &str,
        _api_key: &str,
        _use_case: &UseCase,
    ) -> std::result::Result<ModelDescriptor, EngineError> {
        let state = self.state.lock();
        if let Some(err) = state.confirm_error.clone() {
            return Err(err);
        }
        state
            .models
            .iter()
            .find(|m| m.id == model_id)
            .cloned()
            .ok_or_else(|| EngineError::new("model not found", 404))
    }

    async fn delete_model(
        &self,
        model_id: &str,
        _access_token: &str,
        _api_key: &str,
        _use_case: &UseCase,
    ) -> std::result::Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(err) = state.delete_error.clone() {
            return Err(err);
        }
        state.models.retain(|m| m.id != model_id);
        state.deleted.push(model_id.to_string());
        Ok(())
    }

    async fn reset_runtime(&self) -> std::result::Result<(), EngineError> {
        let mut state = self.state.lock();
        state.reset_calls += 1;
        state.models.clear();
        Ok(())
    }
}
