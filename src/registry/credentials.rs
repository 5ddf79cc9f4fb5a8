use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::ProviderKind;

/// Per-provider secrets, owned by the host application
///
/// Entries are keyed by (provider, token type). How they are protected at
/// rest is up to the implementation.
pub trait CredentialStore: Send + Sync {
    fn token(&self, kind: &ProviderKind, token_type: &str) -> Option<String>;
    fn save_token(&self, kind: &ProviderKind, token_type: &str, token: &str);
    fn remove_token(&self, kind: &ProviderKind, token_type: &str);
}

/// Storage key for a (provider, token type) pair, e.g. `gemini-developer-token`
pub fn storage_key(kind: &ProviderKind, token_type: &str) -> String {
    format!("{}-{}", kind.name(), token_type)
        .to_lowercase()
        .replace(' ', "-")
}

/// Credential store that lives for the process only
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self, kind: &ProviderKind, token_type: &str) -> Option<String> {
        self.tokens.read().get(&storage_key(kind, token_type)).cloned()
    }

    fn save_token(&self, kind: &ProviderKind, token_type: &str, token: &str) {
        self.tokens
            .write()
            .insert(storage_key(kind, token_type), token.to_string());
    }

    fn remove_token(&self, kind: &ProviderKind, token_type: &str) {
        self.tokens.write().remove(&storage_key(kind, token_type));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TOKEN_TYPE_DEVELOPER;

    #[test]
    fn test_storage_key_format() {
        assert_eq!(
            storage_key(&ProviderKind::cloud("Gemini"), TOKEN_TYPE_DEVELOPER),
            "gemini-developer-token"
        );
        assert_eq!(
            storage_key(&ProviderKind::OnDevice, TOKEN_TYPE_DEVELOPER),
            "on-device-developer-token"
        );
    }

    #[test]
    fn test_tokens_are_scoped_by_provider() {
        let store = MemoryCredentialStore::new();
        let gemini = ProviderKind::cloud("gemini");
        store.save_token(&gemini, TOKEN_TYPE_DEVELOPER, "g-key");

        assert_eq!(
            store.token(&gemini, TOKEN_TYPE_DEVELOPER).as_deref(),
            Some("g-key")
        );
        assert_eq!(store.token(&ProviderKind::OnDevice, TOKEN_TYPE_DEVELOPER), None);

        store.remove_token(&gemini, TOKEN_TYPE_DEVELOPER);
        assert_eq!(store.token(&gemini, TOKEN_TYPE_DEVELOPER), None);
    }
}
