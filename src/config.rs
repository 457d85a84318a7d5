//! Diarykeep configuration management
//!
//! Every section has a `Default`, so an empty file (or no file at all) is a
//! valid configuration. Credentials are never stored in the file itself:
//! each provider names an environment variable through an `*_ref` field,
//! resolved once when the service is constructed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Diarykeep configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiaryConfig {
    /// Completion (chat model) provider
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Embedding provider
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Remote store
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local cache storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Memory retrieval tuning
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Retry policy for transient provider failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Local HTTP API
    #[serde(default)]
    pub api: ApiConfig,
}

impl DiaryConfig {
    /// Load configuration from a file. The format is chosen by extension:
    /// `.yaml`/`.yml` and `.json` are accepted, anything else is read as TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Completion provider configuration (OpenAI-compatible chat API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Environment variable holding the API key
    pub api_key_ref: String,

    /// API base URL
    pub base_url: String,

    /// Chat model
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum completion tokens
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_ref: "openai_api_key".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 600,
            timeout_secs: 60,
        }
    }
}

/// Embedding provider configuration (OpenAI-compatible embeddings API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Environment variable holding the API key
    pub api_key_ref: String,

    /// API base URL
    pub base_url: String,

    /// Embedding model
    pub model: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key_ref: "openai_api_key".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Remote store configuration (PostgREST-style HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Environment variable holding the project URL
    pub url_ref: String,

    /// Environment variable holding the anon/service key
    pub key_ref: String,

    /// Name of the vector-similarity RPC function
    pub match_function: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url_ref: "supabase_url".to_string(),
            key_ref: "supabase_anon_key".to_string(),
            match_function: "match_memories".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per collection
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: dirs_next::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".diarykeep"),
        }
    }
}

/// Memory retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Similarity floor passed to the nearest-neighbors RPC
    pub match_threshold: f32,

    /// Number of memories requested when building generation context
    pub context_size: usize,

    /// Default result cap for ad-hoc searches
    pub search_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.7,
            context_size: 3,
            search_limit: 5,
        }
    }
}

/// Bounded exponential backoff for transient provider errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

/// Local HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins (empty = any)
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18791,
            cors_origins: Vec::new(),
        }
    }
}

/// Convert a timeout in seconds to a `Duration`, treating 0 as "no timeout".
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Resolve a credential reference from the environment.
///
/// The reference names an environment variable (e.g. `"openai_api_key"`).
/// Both the exact name and its UPPER_CASE form are tried; empty values
/// count as absent.
pub fn resolve_env_ref(reference: &str) -> Option<String> {
    std::env::var(reference)
        .or_else(|_| std::env::var(reference.to_uppercase()))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DiaryConfig::default();
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.completion.max_tokens, 600);
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
        assert!((config.memory.match_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.memory.context_size, 3);
        assert!(config.storage.base_dir.ends_with(".diarykeep"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: DiaryConfig = toml::from_str(
            r#"
            [completion]
            api_key_ref = "my_key"
            base_url = "http://localhost:8080/v1"
            model = "local-model"
            temperature = 0.2
            max_tokens = 256
            timeout_secs = 5

            [storage]
            base_dir = "/tmp/diarykeep-test"
            "#,
        )
        .unwrap();

        assert_eq!(config.completion.model, "local-model");
        assert_eq!(config.storage.base_dir, PathBuf::from("/tmp/diarykeep-test"));
        assert_eq!(config.remote.match_function, "match_memories");
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = TempDir::new().unwrap();

        let yaml_path = dir.path().join("diarykeep.yaml");
        std::fs::write(&yaml_path, "memory:\n  match_threshold: 0.75\n  context_size: 5\n  search_limit: 10\n").unwrap();
        let config = DiaryConfig::from_file(&yaml_path).unwrap();
        assert_eq!(config.memory.context_size, 5);

        let toml_path = dir.path().join("diarykeep.toml");
        std::fs::write(&toml_path, "[api]\nhost = \"0.0.0.0\"\nport = 9000\ncors_origins = []\n").unwrap();
        let config = DiaryConfig::from_file(&toml_path).unwrap();
        assert_eq!(config.api.port, 9000);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[memory\n").unwrap();
        assert!(matches!(
            DiaryConfig::from_file(&broken),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_resolve_env_ref_tries_uppercase() {
        std::env::set_var("DIARYKEEP_TEST_RESOLVE_REF", "secret-value");
        assert_eq!(
            resolve_env_ref("diarykeep_test_resolve_ref").as_deref(),
            Some("secret-value")
        );
        std::env::set_var("DIARYKEEP_TEST_EMPTY_REF", "  ");
        assert!(resolve_env_ref("diarykeep_test_empty_ref").is_none());
        assert!(resolve_env_ref("diarykeep_test_missing_ref").is_none());
    }

    #[test]
    fn test_timeout_zero_disables() {
        assert!(timeout_from_secs(0).is_none());
        assert_eq!(timeout_from_secs(3), Some(Duration::from_secs(3)));
    }
}
