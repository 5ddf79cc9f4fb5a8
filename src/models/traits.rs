use async_trait::async_trait;

use super::events::{ChatRequest, CompletionEvent, DownloadEvent, DownloadRequest};
use super::types::{AccessToken, ModelDescriptor, UseCase};
use crate::stream::ProviderStream;
use crate::utils::EngineError;

/// The external AI runtime every provider call goes through
///
/// Implementations own transport, licensing and model storage. The
/// orchestration layer only sees results, event streams, and `EngineError`s.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Start the on-device runtime with a license string
    async fn start_runtime(&self, license: &str) -> Result<(), EngineError>;

    /// Exchange a developer id token for an access token
    async fn authorize(&self, developer_token: &str) -> Result<AccessToken, EngineError>;

    /// Models currently installed on the device
    async fn list_models(
        &self,
        access_token: &str,
        api_key: &str,
        use_case: &UseCase,
    ) -> Result<Vec<ModelDescriptor>, EngineError>;

    /// Deploy a use case. Deploying the same descriptor twice is a no-op
    async fn deploy_use_case(
        &self,
        access_token: &str,
        api_key: &str,
        descriptor: &serde_json::Value,
    ) -> Result<UseCase, EngineError>;

    async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<ProviderStream<CompletionEvent>, EngineError>;

    async fn stream_model_download(
        &self,
        request: DownloadRequest,
    ) -> Result<ProviderStream<DownloadEvent>, EngineError>;

    /// Look a model up by id after a download claims success
    async fn confirm_model_available(
        &self,
        model_id: &str,
        access_token: &str,
        api_key: &str,
        use_case: &UseCase,
    ) -> Result<ModelDescriptor, EngineError>;

    async fn delete_model(
        &self,
        model_id: &str,
        access_token: &str,
        api_key: &str,
        use_case: &UseCase,
    ) -> Result<(), EngineError>;

    /// Drop all runtime state, installed models included
    async fn reset_runtime(&self) -> Result<(), EngineError>;
}
