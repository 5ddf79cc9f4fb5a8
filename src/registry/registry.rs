use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::credentials::CredentialStore;
use crate::constants::TOKEN_TYPE_DEVELOPER;
use crate::models::{Lane, ProviderKind, ServiceConfiguration};
use crate::utils::{ParleyError, Result};

/// Registry shared between the chat session, the downloader and the host
pub type SharedRegistry = Arc<RwLock<ServiceRegistry>>;

/// Services of one provider, for display
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceGroup {
    pub provider: String,
    pub services: Vec<ServiceConfiguration>,
}

/// Configured provider endpoints plus the prompt and validation selections
pub struct ServiceRegistry {
    services: Vec<ServiceConfiguration>,
    prompt: Option<ServiceConfiguration>,
    validation: Option<ServiceConfiguration>,
    credentials: Arc<dyn CredentialStore>,
}

impl ServiceRegistry {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            services: Vec::new(),
            prompt: None,
            validation: None,
            credentials,
        }
    }

    pub fn shared(credentials: Arc<dyn CredentialStore>) -> SharedRegistry {
        Arc::new(RwLock::new(Self::new(credentials)))
    }

    pub fn credentials(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.credentials)
    }

    pub fn services(&self) -> &[ServiceConfiguration] {
        &self.services
    }

    /// Swap in a freshly enumerated set. Selections that vanished are cleared
    pub fn replace_services(&mut self, services: Vec<ServiceConfiguration>) {
        self.services.clear();
        for service in services {
            self.add_or_replace(service);
        }
        self.revalidate_selections();
        info!("Registry holds {} services", self.services.len());
    }

    pub fn add_or_replace(&mut self, service: ServiceConfiguration) {
        match self.services.iter_mut().find(|s| **s == service) {
            Some(existing) => *existing = service,
            None => self.services.push(service),
        }
    }

    /// Drop every configuration serving `model_id`. Returns whether any existed
    pub fn remove_model(&mut self, model_id: &str) -> bool {
        let before = self.services.len();
        self.services.retain(|s| s.model_id() != Some(model_id));
        self.revalidate_selections();
        before != self.services.len()
    }

    /// Forget a provider after it was deauthorized
    pub fn invalidate_provider(&mut self, kind: &ProviderKind) {
        debug!("Invalidating provider {}", kind);
        self.services.retain(|s| &s.kind != kind);
        self.revalidate_selections();
    }

    pub fn clear(&mut self) {
        self.services.clear();
        self.prompt = None;
        self.validation = None;
    }

    pub fn is_authorized(&self, service: &ServiceConfiguration) -> bool {
        self.credentials
            .token(&service.kind, TOKEN_TYPE_DEVELOPER)
            .is_some()
    }

    /// Configurations that may be put into `lane` right now
    pub fn candidates(&self, lane: Lane) -> Vec<ServiceConfiguration> {
        let other = match lane {
            Lane::Prompt => self.validation.as_ref(),
            Lane::Validation => {
                match &self.prompt {
                    Some(prompt) if !prompt.is_vision() => {}
                    _ => return Vec::new(),
                }
                self.prompt.as_ref()
            }
            Lane::Download => return Vec::new(),
        };

        self.services
            .iter()
            .filter(|s| self.is_authorized(s))
            .filter(|s| other != Some(*s))
            .filter(|s| s.is_ready())
            .filter(|s| lane != Lane::Validation || !s.is_vision())
            .cloned()
            .collect()
    }

    /// Candidates grouped by provider, both levels sorted ascending
    pub fn grouped_services(&self, lane: Lane) -> Vec<ServiceGroup> {
        let mut groups: Vec<ServiceGroup> = Vec::new();
        for service in self.candidates(lane) {
            let provider = service.kind.name().to_string();
            match groups.iter_mut().find(|g| g.provider == provider) {
                Some(group) => group.services.push(service),
                None => groups.push(ServiceGroup {
                    provider,
                    services: vec![service],
                }),
            }
        }

        for group in &mut groups {
            group
                .services
                .sort_by(|a, b| a.model_id().unwrap_or("").cmp(b.model_id().unwrap_or("")));
        }
        groups.sort_by(|a, b| a.provider.cmp(&b.provider));
        groups
    }

    pub fn select(&mut self, lane: Lane, service: ServiceConfiguration) -> Result<()> {
        if !self.candidates(lane).contains(&service) {
            return Err(ParleyError::Selection(format!(
                "{} is not available for the {}",
                service.id(),
                lane
            )));
        }

        info!("Selected {} for the {}", service.id(), lane);
        match lane {
            Lane::Prompt => {
                if service.is_vision() && self.validation.take().is_some() {
                    debug!("Vision prompt selected, validation cleared");
                }
                self.prompt = Some(service);
            }
            Lane::Validation => self.validation = Some(service),
            Lane::Download => {}
        }
        Ok(())
    }

    pub fn clear_selection(&mut self, lane: Lane) {
        match lane {
            Lane::Prompt => {
                self.prompt = None;
                self.validation = None;
            }
            Lane::Validation => self.validation = None,
            Lane::Download => {}
        }
    }

    pub fn prompt_service(&self) -> Option<&ServiceConfiguration> {
        self.prompt.as_ref()
    }

    pub fn validation_service(&self) -> Option<&ServiceConfiguration> {
        self.validation.as_ref()
    }

    pub fn lists_model(&self, model_id: &str) -> bool {
        self.services.iter().any(|s| s.model_id() == Some(model_id))
    }

    pub fn on_device_services(&self) -> Vec<&ServiceConfiguration> {
        self.services
            .iter()
            .filter(|s| s.kind == ProviderKind::OnDevice)
            .collect()
    }

    /// All services, `preferred` provider first, then by id
    pub fn sorted_first_by(&self, preferred: &ProviderKind) -> Vec<ServiceConfiguration> {
        let mut sorted = self.services.clone();
        sorted.sort_by(|a, b| {
            (&a.kind != preferred, a.id()).cmp(&(&b.kind != preferred, b.id()))
        });
        sorted
    }

    /// One service per provider. With `preferred`, that provider comes first
    pub fn unique_by_kind(&self, preferred: Option<&ProviderKind>) -> Vec<ServiceConfiguration> {
        let ordered = match preferred {
            Some(kind) => self.sorted_first_by(kind),
            None => self.services.clone(),
        };
        let mut seen = HashSet::new();
        ordered
            .into_iter()
            .filter(|s| seen.insert(s.kind.clone()))
            .collect()
    }

    fn revalidate_selections(&mut self) {
        self.prompt = self.prompt.take().and_then(|prompt| {
            let current = self.services.iter().find(|s| **s == prompt).cloned();
            if current.is_none() {
                info!("Prompt selection {} no longer available", prompt.id());
            }
            current
        });

        let prompt_allows_validation = self.prompt.as_ref().is_some_and(|p| !p.is_vision());
        self.validation = self.validation.take().and_then(|validation| {
            let current = self
                .services
                .iter()
                .find(|s| **s == validation)
                .filter(|_| prompt_allows_validation)
                .cloned();
            if current.is_none() {
                info!("Validation selection {} cleared", validation.id());
            }
            current
        });
    }
}
