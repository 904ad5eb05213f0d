use crate::app_config::{AppConfig, Environment, RerunPolicy};
use crate::models::{parse_model_list, resolve_models, ModelKind};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or name unknown models.
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
/// Returns `ConfigError` if values are invalid or name unknown models.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
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

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let database_url = or_default("DATABASE_URL", "sqlite://financial_news.db");
    let env = parse_environment(&or_default("FINSENT_ENV", "development"))?;

    let bind_addr = or_default("FINSENT_BIND_ADDR", "127.0.0.1:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("FINSENT_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("FINSENT_LOG_LEVEL", "info");

    let news_api_key = optional("NEWS_API_KEY");
    let news_api_url = or_default("FINSENT_NEWS_API_URL", "https://newsapi.org/v2/");
    let news_country = or_default("FINSENT_NEWS_COUNTRY", "us");
    let news_category = or_default("FINSENT_NEWS_CATEGORY", "business");
    let news_page_size = parse_u32("FINSENT_NEWS_PAGE_SIZE", "50")?;
    if !(1..=100).contains(&news_page_size) {
        return Err(invalid(
            "FINSENT_NEWS_PAGE_SIZE",
            format!("must be between 1 and 100, got {news_page_size}"),
        ));
    }

    let sentiment_models =
        parse_model_list(&or_default("FINSENT_SENTIMENT_MODELS", "twitter-roberta"));
    resolve_models(&sentiment_models, ModelKind::Sentiment)?;
    let ner_models = parse_model_list(&or_default("FINSENT_NER_MODELS", "bert-base-ner"));
    resolve_models(&ner_models, ModelKind::Ner)?;

    let batch_size = parse_usize("FINSENT_BATCH_SIZE", "16")?;
    if batch_size == 0 {
        return Err(invalid("FINSENT_BATCH_SIZE", "must be at least 1".to_string()));
    }
    let max_input_chars = parse_usize("FINSENT_MAX_INPUT_CHARS", "512")?;
    if max_input_chars == 0 {
        return Err(invalid(
            "FINSENT_MAX_INPUT_CHARS",
            "must be at least 1".to_string(),
        ));
    }
    let inter_request_delay_ms = parse_u64("FINSENT_INTER_REQUEST_DELAY_MS", "1000")?;
    let rerun_policy = or_default("FINSENT_RERUN_POLICY", "skip")
        .parse::<RerunPolicy>()
        .map_err(|reason| invalid("FINSENT_RERUN_POLICY", reason))?;

    let inference_url = or_default(
        "FINSENT_INFERENCE_URL",
        "https://api-inference.huggingface.co",
    );
    let hf_api_token = optional("HF_API_TOKEN");
    let http_timeout_secs = parse_u64("FINSENT_HTTP_TIMEOUT_SECS", "30")?;
    let max_retries = parse_u32("FINSENT_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("FINSENT_RETRY_BACKOFF_BASE_MS", "500")?;

    let db_max_connections = parse_u32("FINSENT_DB_MAX_CONNECTIONS", "5")?;
    if db_max_connections == 0 {
        return Err(invalid(
            "FINSENT_DB_MAX_CONNECTIONS",
            "must be at least 1".to_string(),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("FINSENT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        news_api_key,
        news_api_url,
        news_country,
        news_category,
        news_page_size,
        sentiment_models,
        ner_models,
        batch_size,
        max_input_chars,
        inter_request_delay_ms,
        rerun_policy,
        inference_url,
        hf_api_token,
        http_timeout_secs,
        max_retries,
        retry_backoff_base_ms,
        db_max_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FINSENT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
