use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::aggregator::{Step, StreamAggregator, StreamOutcome};
use super::control::SessionControl;
use super::prompt;
use super::state::SessionSnapshot;
use super::timeline::Timeline;
use super::usage::UsageLedger;
use crate::models::{Attachment, ChatRequest, Engine, Lane, Message, ServiceConfiguration};
use crate::registry::SharedRegistry;
use crate::stream::{CancelHandle, CancellableStream};
use crate::utils::{ParleyError, Result};

/// Outcome of `ChatSession::ask`
#[derive(Debug, Clone, PartialEq)]
pub struct AskOutcome {
    pub prompt: StreamOutcome,
    pub validation: Option<StreamOutcome>,
}

#[derive(Default)]
struct SessionInner {
    timeline: Timeline,
    usage: UsageLedger,
    in_flight: String,
    status: Option<String>,
    last_error: Option<String>,
}

/// The conversation a user is having, plus the two chat lanes feeding it
pub struct ChatSession {
    engine: Arc<dyn Engine>,
    registry: SharedRegistry,
    control: SessionControl,
    inner: Mutex<SessionInner>,
    access_token: RwLock<Option<String>>,
    temperature: f32,
    updates: watch::Sender<SessionSnapshot>,
}

impl ChatSession {
    pub fn new(
        engine: Arc<dyn Engine>,
        registry: SharedRegistry,
        control: SessionControl,
        temperature: f32,
    ) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::default());
        Self {
            engine,
            registry,
            control,
            inner: Mutex::new(SessionInner::default()),
            access_token: RwLock::new(None),
            temperature,
            updates,
        }
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        self.build_snapshot(&inner)
    }

    /// Send `text` to the selected prompt service
    ///
    /// With an attachment the prompt service must be vision-capable and the
    /// conversation context is not sent.
    pub async fn send_prompt(
        &self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<StreamOutcome> {
        let service = self
            .registry
            .read()
            .prompt_service()
            .cloned()
            .ok_or_else(|| ParleyError::Selection("No prompt service selected".into()))?;
        self.control.ensure_idle(Lane::Prompt)?;

        let (managed, post) = match &attachment {
            Some(image) => {
                if !service.is_vision() {
                    return Err(ParleyError::Selection(format!(
                        "{} cannot describe images",
                        service.id()
                    )));
                }
                let post = Message::user(text)
                    .with_model_opt(service.model_id().map(str::to_string))
                    .with_thumbnail(image.thumbnail.clone());
                (text.to_string(), post)
            }
            None => {
                let history = self.inner.lock().timeline.snapshot();
                let post =
                    Message::user(text).with_model_opt(service.model_id().map(str::to_string));
                (prompt::build_prompt(&history, text), post)
            }
        };

        self.run_lane(Lane::Prompt, service, managed, post, attachment)
            .await
    }

    /// Ask the validation service to check the conversation so far
    pub async fn send_validation(&self) -> Result<StreamOutcome> {
        let service = self
            .registry
            .read()
            .validation_service()
            .cloned()
            .ok_or_else(|| ParleyError::Selection("No validation service selected".into()))?;
        // Validation only runs once the prompt lane has drained
        self.control.ensure_idle(Lane::Prompt)?;
        self.control.ensure_idle(Lane::Validation)?;

        let history = self.inner.lock().timeline.snapshot();
        let managed = prompt::build_validation_prompt(&history);
        let post = Message::user(prompt::validation_post(&service))
            .with_model_opt(service.model_id().map(str::to_string));

        self.run_lane(Lane::Validation, service, managed, post, None)
            .await
    }

    /// Prompt, then validate when a validation service is selected and the
    /// prompt completed
    pub async fn ask(&self, text: &str, attachment: Option<Attachment>) -> Result<AskOutcome> {
        let prompt = self.send_prompt(text, attachment).await?;

        let wants_validation = self.registry.read().validation_service().is_some();
        let validation = if wants_validation && prompt.is_completed() {
            Some(self.send_validation().await?)
        } else {
            None
        };

        Ok(AskOutcome { prompt, validation })
    }

    /// Cancel the stream on `lane`, if any
    pub fn stop(&self, lane: Lane) -> bool {
        let stopped = self.control.stop(lane);
        self.publish();
        stopped
    }

    /// Empty the timeline, cancelling whatever is writing to it
    pub fn clear_conversation(&self) {
        self.control.stop(Lane::Prompt);
        self.control.stop(Lane::Validation);
        {
            let mut inner = self.inner.lock();
            inner.timeline.clear();
            inner.in_flight.clear();
            inner.status = None;
        }
        info!("Conversation cleared");
        self.publish();
    }

    /// Full session reset: conversation, usage and errors
    pub fn reset(&self) {
        self.control.stop(Lane::Prompt);
        self.control.stop(Lane::Validation);
        {
            let mut inner = self.inner.lock();
            inner.timeline.clear();
            inner.usage.clear();
            inner.in_flight.clear();
            inner.status = None;
            inner.last_error = None;
        }
        info!("Session reset");
        self.publish();
    }

    /// Current status, or guidance derived from the selected services
    pub fn info_message(&self) -> String {
        if let Some(status) = self.inner.lock().status.clone().filter(|s| !s.is_empty()) {
            return status;
        }
        let registry = self.registry.read();
        prompt::default_info_message(registry.prompt_service(), registry.validation_service())
    }

    pub fn transcript(&self, include_prompt: bool) -> String {
        prompt::transcript(self.inner.lock().timeline.entries(), include_prompt)
    }

    async fn run_lane(
        &self,
        lane: Lane,
        service: ServiceConfiguration,
        managed_prompt: String,
        post: Message,
        attachment: Option<Attachment>,
    ) -> Result<StreamOutcome> {
        // The lane is claimed before the timeline or the engine is touched
        let handle = CancelHandle::new();
        self.control.acquire(lane, handle.clone())?;
        if lane == Lane::Validation && self.control.is_active(Lane::Prompt) {
            self.control.release(lane, &handle);
            return Err(ParleyError::LaneBusy(Lane::Prompt));
        }

        let model_id = service.model_id().map(str::to_string);
        let mut aggregator = StreamAggregator::new(model_id);

        {
            let mut inner = self.inner.lock();
            inner.status = Some(prompt::contacting_status(&service));
            inner.last_error = None;
            inner.timeline.append(post);
            inner.timeline.bind_stream(handle.clone());
        }
        self.publish();
        info!("Sending {} request to {}", lane, service.id());

        let request = ChatRequest {
            service,
            prompt: managed_prompt,
            attachment,
            temperature: self.temperature,
            access_token: self.access_token.read().clone(),
        };

        let provider = match self.engine.stream_chat_completion(request).await {
            Ok(provider) => provider,
            Err(err) => {
                let result = if handle.is_cancelled() {
                    Ok(StreamOutcome::Cancelled)
                } else {
                    let failure = ParleyError::Transport(err.to_string());
                    let mut inner = self.inner.lock();
                    let SessionInner {
                        timeline, usage, ..
                    } = &mut *inner;
                    // Records the placeholder reply; the step itself carries nothing new
                    let _ = aggregator.apply(Err(failure.clone()), timeline, usage);
                    Err(failure)
                };
                self.inner.lock().timeline.unbind_stream(&handle);
                self.control.release(lane, &handle);
                return self.finish_lane(lane, result);
            }
        };

        let mut stream = CancellableStream::with_handle(provider, handle.clone());

        let result = loop {
            let item = stream.next().await;

            let mut inner = self.inner.lock();
            if stream.is_cancelled() {
                break Ok(StreamOutcome::Cancelled);
            }
            let Some(item) = item else {
                break Ok(aggregator.finish(&mut inner.timeline));
            };

            let SessionInner {
                timeline, usage, ..
            } = &mut *inner;
            match aggregator.apply(item, timeline, usage) {
                Ok(Step::Continue) => {
                    inner.in_flight = aggregator.in_flight().to_string();
                    if let Some(status) = aggregator.status() {
                        inner.status = Some(status.to_string());
                    } else if !inner.in_flight.is_empty() {
                        inner.status = None;
                    }
                    drop(inner);
                    self.publish();
                }
                Ok(Step::Finished(outcome)) => break Ok(outcome),
                Err(err) => {
                    stream.cancel();
                    break Err(err);
                }
            }
        };

        self.inner.lock().timeline.unbind_stream(&handle);
        self.control.release(lane, &handle);
        self.finish_lane(lane, result)
    }

    // Reset the lane's transient state and record a surfaced failure
    fn finish_lane(&self, lane: Lane, result: Result<StreamOutcome>) -> Result<StreamOutcome> {
        {
            let mut inner = self.inner.lock();
            inner.in_flight.clear();
            inner.status = None;
            match &result {
                Ok(outcome) => debug!("{} finished: {:?}", lane, outcome),
                Err(err) if err.is_surfaced() => {
                    error!("{} failed: {}", lane, err);
                    inner.last_error = Some(err.user_message());
                }
                Err(err) => debug!("{} ended quietly: {}", lane, err),
            }
        }
        self.publish();
        result
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.updates.send_replace(snapshot);
    }

    fn build_snapshot(&self, inner: &SessionInner) -> SessionSnapshot {
        let active_lanes = [Lane::Prompt, Lane::Validation]
            .into_iter()
            .filter(|lane| self.control.is_active(*lane))
            .collect();
        SessionSnapshot {
            messages: inner.timeline.snapshot(),
            in_flight: inner.in_flight.clone(),
            status: inner.status.clone(),
            usage: inner.usage.snapshot(),
            active_lanes,
            last_error: inner.last_error.clone(),
        }
    }
}
