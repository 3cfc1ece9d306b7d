//! Shared domain types and configuration for the stayrev review pipeline.

pub mod app_config;
pub mod config;
pub mod dates;
pub mod reviews;

use thiserror::Error;

pub use app_config::{AppConfig, EmbedBackoff, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use reviews::{
    parse_prefixed_id, platform_review_id, rating_from_score, system_review_id, Category,
    HasReply, NormalizedReview, Photo, RawReview, ReviewStatus, Sentiment, MAX_CATEGORIES,
    MAX_KEY_PHRASES, MIN_KEY_PHRASES, REVIEW_SOURCE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
