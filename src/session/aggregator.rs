use tracing::{debug, warn};

use super::timeline::Timeline;
use super::usage::UsageLedger;
use crate::constants::{
    CONTROL_STRINGS, STATUS_MODEL_LOADING, STATUS_MODEL_PROCESSING, STATUS_MODEL_READY,
};
use crate::models::{CompletionEvent, Message, UsageRecord};
use crate::utils::{ParleyError, Result};

/// How a chat stream ended
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// A terminal event arrived
    Completed { model_id: Option<String> },
    /// The stream dropped or sent garbage; a placeholder reply was recorded
    Recovered { model_id: Option<String> },
    Cancelled,
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of feeding one event to the aggregator
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue,
    Finished(StreamOutcome),
}

fn is_control_text(text: &str) -> bool {
    CONTROL_STRINGS.iter().any(|marker| text.contains(marker))
}

/// Turns completion events into timeline and usage mutations
///
/// One aggregator per stream. It owns the transient lane state (the
/// in-flight text and the lifecycle status) and nothing else.
#[derive(Debug)]
pub struct StreamAggregator {
    requested_model: Option<String>,
    in_flight: String,
    status: Option<String>,
    finished: bool,
}

impl StreamAggregator {
    pub fn new(requested_model: Option<String>) -> Self {
        Self {
            requested_model,
            in_flight: String::new(),
            status: None,
            finished: false,
        }
    }

    /// Text received so far for live display
    pub fn in_flight(&self) -> &str {
        &self.in_flight
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Apply one stream item. An `Err` means the stream failed and the lane
    /// must be reset; merged content stays in the timeline.
    pub fn apply(
        &mut self,
        item: Result<CompletionEvent>,
        timeline: &mut Timeline,
        usage: &mut UsageLedger,
    ) -> Result<Step> {
        if self.finished {
            debug!("Ignoring event after terminal");
            return Ok(Step::Continue);
        }

        let event = match item {
            Ok(event) => event,
            Err(ParleyError::Decode(reason)) => {
                warn!("Malformed stream event, recording placeholder: {}", reason);
                return Ok(Step::Finished(self.finish(timeline)));
            }
            Err(err) => return Err(self.fail(err, timeline)),
        };

        match event {
            CompletionEvent::ContentDelta {
                message,
                usage: delta_usage,
                is_terminal,
            } => {
                let control = is_control_text(&message.content);
                if !is_terminal {
                    if control {
                        debug!("Discarding control delta {:?}", message.content);
                    } else {
                        self.merge(message, timeline);
                    }
                    return Ok(Step::Continue);
                }

                let model_id = message
                    .model_id
                    .clone()
                    .or_else(|| self.requested_model.clone());
                let tail = if control {
                    Message::assistant("").with_model_opt(model_id.clone())
                } else {
                    message
                };
                self.merge(tail, timeline);
                Ok(Step::Finished(self.complete(model_id, delta_usage, timeline, usage)))
            }
            CompletionEvent::ModelLoading => self.set_status(STATUS_MODEL_LOADING),
            CompletionEvent::ModelReady => self.set_status(STATUS_MODEL_READY),
            CompletionEvent::ModelProcessing => self.set_status(STATUS_MODEL_PROCESSING),
            CompletionEvent::StreamDone {
                usage: done_usage,
                model_id,
            } => {
                let model_id = model_id.or_else(|| self.requested_model.clone());
                Ok(Step::Finished(self.complete(model_id, done_usage, timeline, usage)))
            }
            CompletionEvent::Error {
                domain,
                status_code,
            } => Err(self.fail(
                ParleyError::Provider {
                    domain,
                    status_code,
                },
                timeline,
            )),
        }
    }

    /// The stream ended without a terminal event
    pub fn finish(&mut self, timeline: &mut Timeline) -> StreamOutcome {
        if self.finished {
            return StreamOutcome::Recovered {
                model_id: self.requested_model.clone(),
            };
        }
        warn!(
            "Stream for {:?} ended without a terminal event",
            self.requested_model
        );
        self.placeholder(timeline);
        self.reset();
        StreamOutcome::Recovered {
            model_id: self.requested_model.clone(),
        }
    }

    fn merge(&mut self, mut delta: Message, timeline: &mut Timeline) {
        if delta.model_id.is_none() {
            delta.model_id = self.requested_model.clone();
        }
        if delta.is_assistant() {
            self.in_flight.push_str(&delta.content);
        }
        self.status = None;
        timeline.merge_or_append(delta);
    }

    fn complete(
        &mut self,
        model_id: Option<String>,
        record: Option<UsageRecord>,
        timeline: &mut Timeline,
        usage: &mut UsageLedger,
    ) -> StreamOutcome {
        match (&model_id, record) {
            (Some(id), Some(record)) => {
                debug!("Recording usage for {}: {} tokens", id, record.total_tokens);
                usage.record(id.clone(), record);
            }
            (None, Some(_)) => warn!("Usage reported without a model id, dropping it"),
            _ => {}
        }
        // Empty merge attributes the reply and covers a prompt with no deltas
        timeline.merge_or_append(Message::assistant("").with_model_opt(model_id.clone()));
        self.reset();
        StreamOutcome::Completed { model_id }
    }

    fn fail(&mut self, err: ParleyError, timeline: &mut Timeline) -> ParleyError {
        warn!("Stream failed: {}", err);
        self.placeholder(timeline);
        self.reset();
        err
    }

    fn placeholder(&self, timeline: &mut Timeline) {
        timeline.merge_or_append(
            Message::assistant("").with_model_opt(self.requested_model.clone()),
        );
    }

    fn set_status(&mut self, status: &str) -> Result<Step> {
        self.status = Some(status.to_string());
        Ok(Step::Continue)
    }

    fn reset(&mut self) {
        self.finished = true;
        self.in_flight.clear();
        self.status = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use pretty_assertions::assert_eq;

    fn run(
        events: Vec<Result<CompletionEvent>>,
        timeline: &mut Timeline,
        usage: &mut UsageLedger,
    ) -> Result<Step> {
        let mut aggregator = StreamAggregator::new(Some("m1".into()));
        let mut last = Step::Continue;
        for event in events {
            last = aggregator.apply(event, timeline, usage)?;
        }
        Ok(last)
    }

    #[test]
    fn test_deltas_and_done_build_one_reply() {
        let mut timeline = Timeline::new();
        let mut usage = UsageLedger::new();
        let step = run(
            vec![
                Ok(CompletionEvent::ContentDelta {
                    message: Message::user("hi"),
                    usage: None,
                    is_terminal: false,
                }),
                Ok(CompletionEvent::delta("Hel")),
                Ok(CompletionEvent::delta("lo")),
                Ok(CompletionEvent::done(
                    "m1",
                    UsageRecord {
                        total_tokens: 5,
                        ..Default::default()
                    },
                )),
            ],
            &mut timeline,
            &mut usage,
        )
        .unwrap();

        assert_eq!(
            step,
            Step::Finished(StreamOutcome::Completed {
                model_id: Some("m1".into())
            })
        );
        assert_eq!(
            timeline.snapshot(),
            vec![
                Message::user("hi").with_model("m1"),
                Message::assistant("Hello").with_model("m1"),
            ]
        );
        assert_eq!(usage.get("m1").map(|u| u.total_tokens), Some(5));
    }

    #[test]
    fn test_control_strings_are_discarded() {
        let mut timeline = Timeline::new();
        let mut usage = UsageLedger::new();
        let mut aggregator = StreamAggregator::new(Some("m1".into()));

        for text in ["<|loading_model|>", "[DONE]", "Model loaded successfully"] {
            aggregator
                .apply(Ok(CompletionEvent::delta(text)), &mut timeline, &mut usage)
                .unwrap();
        }
        assert!(timeline.is_empty());
        assert_eq!(aggregator.in_flight(), "");
    }

    #[test]
    fn test_lifecycle_events_only_touch_status() {
        let mut timeline = Timeline::new();
        let mut usage = UsageLedger::new();
        let mut aggregator = StreamAggregator::new(None);

        aggregator
            .apply(Ok(CompletionEvent::ModelLoading), &mut timeline, &mut usage)
            .unwrap();
        assert_eq!(aggregator.status(), Some(STATUS_MODEL_LOADING));
        aggregator
            .apply(Ok(CompletionEvent::ModelProcessing), &mut timeline, &mut usage)
            .unwrap();
        assert_eq!(aggregator.status(), Some(STATUS_MODEL_PROCESSING));
        assert!(timeline.is_empty());

        aggregator
            .apply(Ok(CompletionEvent::delta("x")), &mut timeline, &mut usage)
            .unwrap();
        assert_eq!(aggregator.status(), None);
        assert_eq!(aggregator.in_flight(), "x");
    }

    #[test]
    fn test_terminal_delta_records_usage() {
        let mut timeline = Timeline::new();
        let mut usage = UsageLedger::new();
        let step = run(
            vec![
                Ok(CompletionEvent::delta("a")),
                Ok(CompletionEvent::ContentDelta {
                    message: Message::assistant("b").with_model("m2"),
                    usage: Some(UsageRecord {
                        total_tokens: 3,
                        ..Default::default()
                    }),
                    is_terminal: true,
                }),
            ],
            &mut timeline,
            &mut usage,
        )
        .unwrap();

        assert!(matches!(step, Step::Finished(StreamOutcome::Completed { .. })));
        assert_eq!(usage.get("m2").map(|u| u.total_tokens), Some(3));
        assert_eq!(timeline.snapshot(), vec![Message::assistant("ab").with_model("m2")]);
    }

    #[test]
    fn test_error_keeps_partial_content() {
        let mut timeline = Timeline::new();
        let mut usage = UsageLedger::new();
        timeline.append(Message::user("q"));

        let err = run(
            vec![
                Ok(CompletionEvent::delta("partial")),
                Ok(CompletionEvent::Error {
                    domain: "overloaded".into(),
                    status_code: 503,
                }),
            ],
            &mut timeline,
            &mut usage,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ParleyError::Provider {
                domain: "overloaded".into(),
                status_code: 503
            }
        );
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.last().unwrap().content, "partial");
        assert!(usage.is_empty());
    }

    #[test]
    fn test_dropped_stream_gets_placeholder() {
        let mut timeline = Timeline::new();
        let mut usage = UsageLedger::new();
        timeline.append(Message::user("q"));

        let mut aggregator = StreamAggregator::new(Some("m1".into()));
        aggregator
            .apply(Ok(CompletionEvent::ModelLoading), &mut timeline, &mut usage)
            .unwrap();
        let outcome = aggregator.finish(&mut timeline);

        assert_eq!(
            outcome,
            StreamOutcome::Recovered {
                model_id: Some("m1".into())
            }
        );
        let last = timeline.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "");
        assert_eq!(last.model_id.as_deref(), Some("m1"));
    }

    #[test]
    fn test_decode_error_is_recovered_locally() {
        let mut timeline = Timeline::new();
        let mut usage = UsageLedger::new();
        timeline.append(Message::user("q"));

        let step = run(
            vec![Err(ParleyError::Decode("truncated json".into()))],
            &mut timeline,
            &mut usage,
        )
        .unwrap();

        assert!(matches!(step, Step::Finished(StreamOutcome::Recovered { .. })));
        assert_eq!(timeline.len(), 2);
    }
}
