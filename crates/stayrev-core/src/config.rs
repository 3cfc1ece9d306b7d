use crate::app_config::{AppConfig, EmbedBackoff, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation are decoupled from the process environment so tests
/// can drive them with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("STAYREV_ENV", "development"));
    let bind_addr = parse_addr("STAYREV_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("STAYREV_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("STAYREV_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("STAYREV_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("STAYREV_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let gemini_api_key = lookup("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
    let gemini_base_url = or_default(
        "STAYREV_GEMINI_BASE_URL",
        "https://generativelanguage.googleapis.com",
    );
    let analysis_model = or_default("STAYREV_ANALYSIS_MODEL", "gemini-2.5-flash-lite");
    let analysis_timeout_secs = parse_u64("STAYREV_ANALYSIS_TIMEOUT_SECS", "120")?;

    let embed_model = or_default("STAYREV_EMBED_MODEL", "models/embedding-001");
    let embed_dimension = parse_usize("STAYREV_EMBED_DIMENSION", "768")?;
    let embed_timeout_secs = parse_u64("STAYREV_EMBED_TIMEOUT_SECS", "30")?;
    let embed_max_attempts = parse_u32("STAYREV_EMBED_MAX_ATTEMPTS", "3")?;
    if embed_max_attempts == 0 {
        return Err(invalid(
            "STAYREV_EMBED_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let embed_retry_delay_secs = parse_u64("STAYREV_EMBED_RETRY_DELAY_SECS", "20")?;
    let embed_backoff = parse_backoff(&or_default("STAYREV_EMBED_BACKOFF", "fixed"))
        .ok_or_else(|| {
            invalid(
                "STAYREV_EMBED_BACKOFF",
                "expected `fixed` or `exponential`".to_string(),
            )
        })?;

    let qdrant_url = or_default("STAYREV_QDRANT_URL", "http://localhost:6333");
    let qdrant_collection = or_default("STAYREV_QDRANT_COLLECTION", "hotel_reviews");
    let artifact_path = PathBuf::from(or_default(
        "STAYREV_ARTIFACT_PATH",
        "analyzed_data_frontend.json",
    ));

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        gemini_api_key,
        gemini_base_url,
        analysis_model,
        analysis_timeout_secs,
        embed_model,
        embed_dimension,
        embed_timeout_secs,
        embed_max_attempts,
        embed_retry_delay_secs,
        embed_backoff,
        qdrant_url,
        qdrant_collection,
        artifact_path,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_backoff(s: &str) -> Option<EmbedBackoff> {
    match s.trim().to_ascii_lowercase().as_str() {
        "fixed" => Some(EmbedBackoff::Fixed),
        "exponential" => Some(EmbedBackoff::Exponential),
        _ => None,
    }
}
