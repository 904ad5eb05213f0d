//! Shared domain types and configuration for the finsent workspace.

pub mod app_config;
pub mod article;
pub mod config;
pub mod models;
pub mod retry;

pub use app_config::{AppConfig, Environment, RerunPolicy};
pub use article::NewArticle;
pub use config::{load_app_config, load_app_config_from_env};
pub use models::{
    find_model, parse_model_list, resolve_models, ModelBackend, ModelKind, ModelSpec,
    MODEL_REGISTRY,
};
pub use retry::RetrySettings;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("unknown {kind} model '{name}' (known: {known})")]
    UnknownModel {
        name: String,
        kind: ModelKind,
        known: String,
    },
}
