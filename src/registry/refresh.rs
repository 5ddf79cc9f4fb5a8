use std::time::Duration;
use tracing::{info, warn};

use super::registry::SharedRegistry;
use crate::constants::TOKEN_TYPE_DEVELOPER;
use crate::models::{
    ConnectionParams, Engine, ModelDescriptor, ProviderKind, ServiceConfiguration, UseCase,
};

/// A cloud provider's default model, as configured
#[derive(Debug, Clone, PartialEq)]
pub struct CloudModel {
    pub provider: String,
    pub model: ModelDescriptor,
}

/// What a refresh needs to know besides the engine
#[derive(Debug, Clone, Default)]
pub struct RefreshSource {
    pub access_token: Option<String>,
    pub use_case: Option<UseCase>,
    pub connection: ConnectionParams,
    pub clouds: Vec<CloudModel>,
    /// Pause before enumerating, lets the runtime settle after a change
    pub delay: Duration,
}

/// Rebuild the registry from the engine's installed models and the
/// configured cloud defaults. Returns the number of services registered.
///
/// A failed on-device listing is logged and the cloud services are still
/// registered.
pub async fn refresh_registry(
    engine: &dyn Engine,
    registry: &SharedRegistry,
    source: &RefreshSource,
) -> usize {
    if !source.delay.is_zero() {
        tokio::time::sleep(source.delay).await;
    }

    let credentials = registry.read().credentials();
    let mut services = Vec::new();

    let api_key = credentials.token(&ProviderKind::OnDevice, TOKEN_TYPE_DEVELOPER);
    match (&source.access_token, &api_key, &source.use_case) {
        (Some(access_token), Some(api_key), Some(use_case)) => {
            match engine.list_models(access_token, api_key, use_case).await {
                Ok(models) => {
                    services.extend(models.into_iter().filter(ModelDescriptor::is_ready).map(
                        |model| {
                            ServiceConfiguration::new(ProviderKind::OnDevice, Some(model))
                                .with_credential(Some(api_key.clone()))
                                .with_connection(source.connection.clone())
                        },
                    ));
                }
                Err(err) => warn!("Failed to fetch on-device models: {}", err),
            }
        }
        _ => info!("No deployed use case, skipping on-device models"),
    }

    for cloud in &source.clouds {
        let kind = ProviderKind::cloud(cloud.provider.clone());
        let credential = credentials.token(&kind, TOKEN_TYPE_DEVELOPER);
        services.push(
            ServiceConfiguration::new(kind, Some(cloud.model.clone())).with_credential(credential),
        );
    }

    let mut registry = registry.write();
    registry.replace_services(services);
    registry.services().len()
}
