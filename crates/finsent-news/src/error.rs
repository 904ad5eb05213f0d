use thiserror::Error;

/// Errors returned by the NewsAPI client.
#[derive(Debug, Error)]
pub enum NewsError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// NewsAPI answered 429.
    #[error("rate limited by NewsAPI")]
    RateLimited,

    /// NewsAPI returned `"status": "error"` with a code and message.
    #[error("NewsAPI error {code}: {message}")]
    Api { code: String, message: String },

    /// Non-success HTTP status without a parseable error envelope.
    #[error("unexpected HTTP status {status} from NewsAPI")]
    UnexpectedStatus { status: u16 },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid NewsAPI base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
