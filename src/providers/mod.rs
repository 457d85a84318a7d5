//! External model providers
//!
//! The completion and embedding providers are opaque collaborators reached
//! over HTTP. Whether a provider is usable is carried in the type
//! ([`ProviderHandle`]) instead of being checked ad hoc at every call site.

pub mod completion;
pub mod embedding;
pub mod retry;

pub use completion::{ChatMessage, ChatRole, CompletionProvider, OpenAiChat};
pub use embedding::{EmbeddingProvider, OpenAiEmbeddings};
pub use retry::RetryPolicy;

use crate::config::{resolve_env_ref, CompletionConfig, EmbeddingConfig, RetryConfig};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Availability of an external collaborator.
///
/// `Unconfigured` records why the collaborator could not be built (usually a
/// missing credential) so that callers which require it can fail fast with a
/// meaningful configuration error.
pub enum ProviderHandle<P: ?Sized> {
    /// Ready to use
    Configured(Arc<P>),
    /// Not available
    Unconfigured {
        /// Why the provider is unavailable
        reason: String,
    },
}

impl<P: ?Sized> ProviderHandle<P> {
    /// Wrap a ready provider
    pub fn configured(provider: Arc<P>) -> Self {
        Self::Configured(provider)
    }

    /// Mark a provider as unavailable
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self::Unconfigured {
            reason: reason.into(),
        }
    }

    /// The provider, if configured
    pub fn get(&self) -> Option<&Arc<P>> {
        match self {
            Self::Configured(p) => Some(p),
            Self::Unconfigured { .. } => None,
        }
    }

    /// The provider, or a configuration error naming why it is missing
    pub fn require(&self) -> Result<&Arc<P>> {
        match self {
            Self::Configured(p) => Ok(p),
            Self::Unconfigured { reason } => Err(Error::Config(reason.clone())),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }
}

impl<P: ?Sized> Clone for ProviderHandle<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Configured(p) => Self::Configured(Arc::clone(p)),
            Self::Unconfigured { reason } => Self::Unconfigured {
                reason: reason.clone(),
            },
        }
    }
}

impl<P: ?Sized> std::fmt::Debug for ProviderHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configured(_) => f.write_str("Configured"),
            Self::Unconfigured { reason } => {
                f.debug_struct("Unconfigured").field("reason", reason).finish()
            }
        }
    }
}

/// Build the completion provider, unconfigured when its API key is absent
pub fn completion_from_config(
    config: &CompletionConfig,
    retry: &RetryConfig,
) -> ProviderHandle<dyn CompletionProvider> {
    let Some(api_key) = resolve_env_ref(&config.api_key_ref) else {
        return ProviderHandle::unconfigured(format!(
            "no completion API key (set ${})",
            config.api_key_ref.to_uppercase()
        ));
    };
    match OpenAiChat::new(config, api_key, RetryPolicy::from_config(retry)) {
        Ok(chat) => ProviderHandle::configured(Arc::new(chat) as Arc<dyn CompletionProvider>),
        Err(e) => ProviderHandle::unconfigured(e.to_string()),
    }
}

/// Build the embedding provider, unconfigured when its API key is absent
pub fn embedding_from_config(
    config: &EmbeddingConfig,
    retry: &RetryConfig,
) -> ProviderHandle<dyn EmbeddingProvider> {
    let Some(api_key) = resolve_env_ref(&config.api_key_ref) else {
        return ProviderHandle::unconfigured(format!(
            "no embedding API key (set ${})",
            config.api_key_ref.to_uppercase()
        ));
    };
    match OpenAiEmbeddings::new(config, api_key, RetryPolicy::from_config(retry)) {
        Ok(embedder) => {
            ProviderHandle::configured(Arc::new(embedder) as Arc<dyn EmbeddingProvider>)
        }
        Err(e) => ProviderHandle::unconfigured(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Fixed;

    impl Named for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_configured_handle() {
        let handle: ProviderHandle<dyn Named> = 
            ProviderHandle::configured(Arc::new(Fixed) as Arc<dyn Named>);
        assert!(handle.is_configured());
        assert_eq!(handle.require().unwrap().name(), "fixed");
        assert!(handle.clone().get().is_some());
    }

    #[test]
    fn test_missing_key_leaves_provider_unconfigured() {
        let config = CompletionConfig {
            api_key_ref: "diarykeep_test_absent_completion_key".to_string(),
            ..Default::default()
        };
        let handle = completion_from_config(&config, &RetryConfig::default());
        match handle.require() {
            Err(Error::Config(reason)) => {
                assert!(reason.contains("DIARYKEEP_TEST_ABSENT_COMPLETION_KEY"))
            }
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_present_key_configures_embeddings() {
        std::env::set_var("DIARYKEEP_TEST_EMBEDDING_KEY", "sk-test");
        let config = EmbeddingConfig {
            api_key_ref: "diarykeep_test_embedding_key".to_string(),
            ..Default::default()
        };
        let handle = embedding_from_config(&config, &RetryConfig::default());
        assert_eq!(handle.require().unwrap().name(), "text-embedding-ada-002");
    }

    #[test]
    fn test_unconfigured_handle_is_config_error() {
        let handle: ProviderHandle<dyn Named> =
            ProviderHandle::unconfigured("no completion API key (set $OPENAI_API_KEY)");
        assert!(!handle.is_configured());
        assert!(handle.get().is_none());
        match handle.require() {
            Err(Error::Config(reason)) => assert!(reason.contains("OPENAI_API_KEY")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }
}
