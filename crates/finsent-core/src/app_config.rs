use std::net::SocketAddr;

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

/// What to do when a model is asked to score an article it already scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerunPolicy {
    /// Leave existing results alone and do not run inference again.
    Skip,
    /// Run inference again and overwrite the stored results in place.
    Upsert,
}

impl RerunPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RerunPolicy::Skip => "skip",
            RerunPolicy::Upsert => "upsert",
        }
    }
}

impl std::str::FromStr for RerunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(RerunPolicy::Skip),
            "upsert" => Ok(RerunPolicy::Upsert),
            other => Err(format!("expected 'skip' or 'upsert', got '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub news_api_key: Option<String>,
    pub news_api_url: String,
    pub news_country: String,
    pub news_category: String,
    pub news_page_size: u32,
    pub sentiment_models: Vec<String>,
    pub ner_models: Vec<String>,
    pub batch_size: usize,
    pub max_input_chars: usize,
    pub inter_request_delay_ms: u64,
    pub rerun_policy: RerunPolicy,
    pub inference_url: String,
    pub hf_api_token: Option<String>,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &self.database_url)
            .field(
                "news_api_key",
                &self.news_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("news_api_url", &self.news_api_url)
            .field("news_country", &self.news_country)
            .field("news_category", &self.news_category)
            .field("news_page_size", &self.news_page_size)
            .field("sentiment_models", &self.sentiment_models)
            .field("ner_models", &self.ner_models)
            .field("batch_size", &self.batch_size)
            .field("max_input_chars", &self.max_input_chars)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("rerun_policy", &self.rerun_policy)
            .field("inference_url", &self.inference_url)
            .field(
                "hf_api_token",
                &self.hf_api_token.as_ref().map(|_| "[redacted]"),
            )
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
