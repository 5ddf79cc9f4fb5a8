use serde::{Deserialize, Serialize};

use super::types::{Message, ModelKind, ServiceConfiguration, UsageRecord, UseCase};

/// One event of a chat completion stream
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    /// Partial (or final, when `is_terminal`) response text
    ContentDelta {
        message: Message,
        usage: Option<UsageRecord>,
        is_terminal: bool,
    },
    ModelLoading,
    ModelReady,
    ModelProcessing,
    StreamDone {
        usage: Option<UsageRecord>,
        model_id: Option<String>,
    },
    /// In-band provider failure
    Error { domain: String, status_code: u16 },
}

impl CompletionEvent {
    pub fn delta(content: impl Into<String>) -> Self {
        Self::ContentDelta {
            message: Message::assistant(content),
            usage: None,
            is_terminal: false,
        }
    }

    pub fn done(model_id: impl Into<String>, usage: UsageRecord) -> Self {
        Self::StreamDone {
            usage: Some(usage),
            model_id: Some(model_id.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Self::ContentDelta { is_terminal, .. } => *is_terminal,
            Self::StreamDone { .. } | Self::Error { .. } => true,
            _ => false,
        }
    }
}

/// One event of a model download stream
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Progress {
        bytes_transferred: f64,
        total_bytes: f64,
    },
    Completed {
        model_id: String,
    },
}

/// Image sent alongside a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64 thumbnail, already encoded by the host
    pub thumbnail: String,
}

/// Everything the engine needs to start one completion
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub service: ServiceConfiguration,
    /// Fully constructed prompt text, context included
    pub prompt: String,
    pub attachment: Option<Attachment>,
    pub temperature: f32,
    pub access_token: Option<String>,
}

impl ChatRequest {
    pub fn model_id(&self) -> Option<&str> {
        self.service.model_id()
    }
}

/// Model artefact to fetch onto the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub kind: ModelKind,
    #[serde(default)]
    pub expected_download_size: u64,
    #[serde(default)]
    pub chat_template_hint: Option<String>,
    /// Vision projector weights for VLMs
    #[serde(default)]
    pub mmproj_url: Option<String>,
    #[serde(default)]
    pub owned_by: Option<String>,
    #[serde(default)]
    pub exclude_from_backup: bool,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            kind,
            expected_download_size: 0,
            chat_template_hint: None,
            mmproj_url: None,
            owned_by: None,
            exclude_from_backup: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub model: ModelSpec,
    pub access_token: String,
    pub api_key: String,
    pub use_case: UseCase,
}
