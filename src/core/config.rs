//! Runtime configuration
//!
//! Everything the QA system needs from the environment is resolved once at
//! startup into a [`Config`] and passed explicitly to each component.

use std::path::PathBuf;
use std::time::Duration;

use super::error::SetupError;
use super::paths::ProjectPaths;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const CREDENTIAL_PREFIX: &str = "sk-";
pub const CREDENTIAL_MIN_LEN: usize = 20;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Passages retrieved per query
pub const TOP_K: usize = 3;

/// Chunker target size in bytes and overlap between neighbouring chunks
pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

/// API token for the hosted model provider
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({}***)", CREDENTIAL_PREFIX)
    }
}

/// Check the shape of a credential string.
///
/// Only filters out obviously malformed values; the provider does the real check.
pub fn validate_credential(raw: &str) -> Result<Credential, SetupError> {
    if raw.is_empty() {
        return Err(SetupError::Configuration(format!(
            "{} environment variable is not set",
            API_KEY_VAR
        )));
    }
    if !raw.starts_with(CREDENTIAL_PREFIX) || raw.chars().count() < CREDENTIAL_MIN_LEN {
        return Err(SetupError::Configuration(format!(
            "{} appears to be malformed",
            API_KEY_VAR
        )));
    }
    Ok(Credential(raw.to_string()))
}

/// Read and validate the credential from the process environment.
pub fn load_credential() -> Result<Credential, SetupError> {
    let raw = std::env::var(API_KEY_VAR).unwrap_or_default();
    validate_credential(&raw)
}

/// Load `.env` from the working directory. Variables already set win.
pub fn load_dotenv() {
    dotenv::dotenv().ok();
}

/// Which embedding backend builds and queries the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    OpenAi,
    /// Deterministic offline embedder, no network
    Local,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credential: Credential,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub root: PathBuf,
}

impl Config {
    /// Build from the process environment. Call [`load_dotenv`] first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Self, SetupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credential = validate_credential(&lookup(API_KEY_VAR).unwrap_or_default())?;

        let base_url = get("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let embedding_backend = match get("KBQA_EMBEDDINGS").as_deref() {
            None | Some("openai") => EmbeddingBackend::OpenAi,
            Some("local") => EmbeddingBackend::Local,
            Some(other) => {
                return Err(SetupError::Configuration(format!(
                    "KBQA_EMBEDDINGS must be 'openai' or 'local', got '{}'",
                    other
                )))
            }
        };

        let timeout_secs = match get("KBQA_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    SetupError::Configuration(format!(
                        "KBQA_TIMEOUT_SECS must be a positive number of seconds, got '{}'",
                        v
                    ))
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let temperature = match get("KBQA_TEMPERATURE") {
            Some(v) => v
                .parse::<f32>()
                .ok()
                .filter(|t| (0.0..=2.0).contains(t))
                .ok_or_else(|| {
                    SetupError::Configuration(format!(
                        "KBQA_TEMPERATURE must be between 0.0 and 2.0, got '{}'",
                        v
                    ))
                })?,
            None => DEFAULT_TEMPERATURE,
        };

        let root = match get("KBQA_HOME") {
            Some(home) => PathBuf::from(home),
            None => std::env::current_dir()?,
        };

        Ok(Self {
            credential,
            base_url,
            chat_model: get("KBQA_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            embedding_model: get("KBQA_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_backend,
            temperature,
            request_timeout: Duration::from_secs(timeout_secs),
            top_k: TOP_K,
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
            root,
        })
    }

    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::from_root(self.root.clone())
    }
}
