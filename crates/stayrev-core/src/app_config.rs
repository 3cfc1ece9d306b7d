use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Delay schedule between embedding attempts after a quota rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedBackoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles per retry, with +/-25% jitter.
    Exponential,
}

impl std::fmt::Display for EmbedBackoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedBackoff::Fixed => write!(f, "fixed"),
            EmbedBackoff::Exponential => write!(f, "exponential"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub analysis_model: String,
    pub analysis_timeout_secs: u64,
    pub embed_model: String,
    pub embed_dimension: usize,
    /// HTTP timeout for a single embedding request.
    pub embed_timeout_secs: u64,
    pub embed_max_attempts: u32,
    pub embed_retry_delay_secs: u64,
    pub embed_backoff: EmbedBackoff,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub artifact_path: PathBuf,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("gemini_base_url", &self.gemini_base_url)
            .field("analysis_model", &self.analysis_model)
            .field("analysis_timeout_secs", &self.analysis_timeout_secs)
            .field("embed_model", &self.embed_model)
            .field("embed_dimension", &self.embed_dimension)
            .field("embed_timeout_secs", &self.embed_timeout_secs)
            .field("embed_max_attempts", &self.embed_max_attempts)
            .field("embed_retry_delay_secs", &self.embed_retry_delay_secs)
            .field("embed_backoff", &self.embed_backoff)
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_collection", &self.qdrant_collection)
            .field("artifact_path", &self.artifact_path)
            .finish()
    }
}
