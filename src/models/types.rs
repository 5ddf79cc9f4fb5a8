use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{ROLE_ASSISTANT, ROLE_USER};

/// Who authored a timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => ROLE_USER,
            Self::Assistant => ROLE_ASSISTANT,
        }
    }

    /// Parse a wire role; anything other than user/assistant is rejected
    pub fn from_wire(role: &str) -> Option<Self> {
        match role {
            ROLE_USER => Some(Self::User),
            ROLE_ASSISTANT => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A single conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Encoded image thumbnail attached to a user turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_thumbnail: Option<String>,
    /// Model that produced (or was asked) this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachment_thumbnail: None,
            model_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_model_opt(mut self, model_id: Option<String>) -> Self {
        self.model_id = model_id;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.attachment_thumbnail = Some(thumbnail.into());
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Token usage statistics for one completed stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub tokens_per_second: f64,
}

/// Capability class of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Text-only language model
    Llm,
    /// Vision-capable language model
    Vlm,
}

impl ModelKind {
    pub fn is_vision(&self) -> bool {
        matches!(self, Self::Vlm)
    }
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::Llm
    }
}

/// Model as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(default)]
    pub kind: ModelKind,
    /// `Some(false)` marks a model that exists but must not be offered yet
    #[serde(default)]
    pub ready_to_use: Option<bool>,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ready_to_use: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_to_use.unwrap_or(true)
    }
}

/// Backend family that serves a configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// The local inference runtime
    OnDevice,
    /// A named cloud provider (e.g. "gemini")
    Cloud(String),
}

impl ProviderKind {
    pub fn cloud(name: impl Into<String>) -> Self {
        Self::Cloud(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::OnDevice => "on-device",
            Self::Cloud(name) => name,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque connection details the engine needs to reach a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub port: Option<u16>,
    pub client_id: Option<String>,
}

/// A provider endpoint bound to (optionally) one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    pub kind: ProviderKind,
    pub model: Option<ModelDescriptor>,
    pub credential: Option<String>,
    #[serde(default)]
    pub connection: ConnectionParams,
}

impl ServiceConfiguration {
    pub fn new(kind: ProviderKind, model: Option<ModelDescriptor>) -> Self {
        Self {
            kind,
            model,
            credential: None,
            connection: ConnectionParams::default(),
        }
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionParams) -> Self {
        self.connection = connection;
        self
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.id.as_str())
    }

    /// Display identifier, "provider/model"
    pub fn id(&self) -> String {
        match self.model_id() {
            Some(model) => format!("{}/{}", self.kind, model),
            None => self.kind.to_string(),
        }
    }

    pub fn identity(&self) -> (&ProviderKind, Option<&str>) {
        (&self.kind, self.model_id())
    }

    pub fn is_vision(&self) -> bool {
        self.model.as_ref().is_some_and(|m| m.kind.is_vision())
    }

    pub fn is_ready(&self) -> bool {
        self.model.as_ref().map_or(true, ModelDescriptor::is_ready)
    }
}

// Identity is (provider, model); credentials and connection details don't count
impl PartialEq for ServiceConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ServiceConfiguration {}

/// Independent stream slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Prompt,
    Validation,
    Download,
}

impl Lane {
    pub fn is_chat(&self) -> bool {
        matches!(self, Self::Prompt | Self::Validation)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prompt => "prompt",
            Self::Validation => "validation",
            Self::Download => "download",
        };
        write!(f, "{} lane", name)
    }
}

/// A deployed configuration bundle required before model operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCase {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Engine-specific deployment descriptor, passed through untouched
    #[serde(default)]
    pub descriptor: serde_json::Value,
}

impl UseCase {
    pub fn new(version: impl Into<String>, descriptor: serde_json::Value) -> Self {
        Self {
            id: None,
            version: Some(version.into()),
            descriptor,
        }
    }
}

/// Result of authorizing against the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub client_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(Role::from_wire("user"), Some(Role::User));
        assert_eq!(Role::from_wire("assistant"), Some(Role::Assistant));
        assert_eq!(Role::from_wire("system"), None);
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_service_identity_ignores_credentials() {
        let model = ModelDescriptor::new("llama", ModelKind::Llm);
        let a = ServiceConfiguration::new(ProviderKind::OnDevice, Some(model.clone()))
            .with_credential(Some("key-a".into()));
        let b = ServiceConfiguration::new(ProviderKind::OnDevice, Some(model))
            .with_credential(None);
        assert_eq!(a, b);
        assert_eq!(a.id(), "on-device/llama");

        let other = ServiceConfiguration::new(
            ProviderKind::cloud("gemini"),
            Some(ModelDescriptor::new("llama", ModelKind::Llm)),
        );
        assert_ne!(a, other);
    }

    #[test]
    fn test_readiness_defaults_to_ready() {
        let mut model = ModelDescriptor::new("m", ModelKind::Vlm);
        assert!(model.is_ready());
        model.ready_to_use = Some(false);
        assert!(!model.is_ready());

        let service = ServiceConfiguration::new(ProviderKind::OnDevice, Some(model));
        assert!(service.is_vision());
        assert!(!service.is_ready());
    }
}
