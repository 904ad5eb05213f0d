//! HTTP client for the NewsAPI `top-headlines` endpoint.
//!
//! Wraps `reqwest` with NewsAPI-specific error handling and converts the
//! response into [`NewArticle`]s ready for storage.

use std::time::Duration;

use chrono::{DateTime, Utc};
use finsent_core::{NewArticle, RetrySettings};
use reqwest::{Client, StatusCode, Url};

use crate::error::NewsError;
use crate::retry::retry_with_backoff;
use crate::types::{HeadlinesResponse, RawArticle};

const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2/";

/// Placeholder NewsAPI uses for articles pulled by the publisher.
const REMOVED_MARKER: &str = "[Removed]";

/// Filters for a `top-headlines` request.
#[derive(Debug, Clone)]
pub struct TopHeadlinesQuery {
    pub country: String,
    pub category: String,
    pub page_size: u32,
}

impl Default for TopHeadlinesQuery {
    fn default() -> Self {
        Self {
            country: "us".to_string(),
            category: "business".to_string(),
            page_size: 50,
        }
    }
}

/// Client for the NewsAPI REST API.
///
/// Use [`NewsApiClient::new`] for production or
/// [`NewsApiClient::with_base_url`] to point at a mock server in tests.
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl NewsApiClient {
    /// Creates a client pointed at the production NewsAPI.
    ///
    /// # Errors
    ///
    /// Returns [`NewsError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, NewsError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`NewsError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`NewsError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, NewsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("finsent/0.1 (financial-news-sentiment)")
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing
        // the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| NewsError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    fn headlines_url(&self, query: &TopHeadlinesQuery) -> Result<Url, NewsError> {
        let mut url = self
            .base_url
            .join("top-headlines")
            .map_err(|e| NewsError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("country", &query.country)
            .append_pair("category", &query.category)
            .append_pair("pageSize", &query.page_size.to_string());
        Ok(url)
    }

    /// Fetches one page of top headlines and converts them to articles.
    ///
    /// Entries without a URL or title, and entries NewsAPI marks as removed,
    /// are skipped.
    ///
    /// # Errors
    ///
    /// - [`NewsError::RateLimited`] on HTTP 429.
    /// - [`NewsError::Api`] when NewsAPI reports `"status": "error"`.
    /// - [`NewsError::UnexpectedStatus`] for other non-2xx responses.
    /// - [`NewsError::Deserialize`] if the body does not match the envelope.
    /// - [`NewsError::Http`] on network failure.
    pub async fn top_headlines(
        &self,
        query: &TopHeadlinesQuery,
    ) -> Result<Vec<NewArticle>, NewsError> {
        let url = self.headlines_url(query)?;
        let response = self
            .client
            .get(url.clone())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(NewsError::RateLimited);
        }

        let body = response.text().await?;
        let parsed: Result<HeadlinesResponse, _> = serde_json::from_str(&body);

        match parsed {
            Ok(envelope) if envelope.status == "error" => Err(NewsError::Api {
                code: envelope.code.unwrap_or_else(|| "unknown".to_string()),
                message: envelope.message.unwrap_or_default(),
            }),
            Ok(_) if !status.is_success() => Err(NewsError::UnexpectedStatus {
                status: status.as_u16(),
            }),
            Ok(envelope) => {
                let fetched_at = Utc::now();
                let articles: Vec<NewArticle> = envelope
                    .articles
                    .into_iter()
                    .filter_map(|raw| convert_article(raw, fetched_at))
                    .collect();
                tracing::debug!(
                    total_results = envelope.total_results,
                    kept = articles.len(),
                    "parsed NewsAPI headlines"
                );
                Ok(articles)
            }
            Err(_) if !status.is_success() => Err(NewsError::UnexpectedStatus {
                status: status.as_u16(),
            }),
            Err(e) => Err(NewsError::Deserialize {
                context: url.path().to_string(),
                source: e,
            }),
        }
    }
}

/// Fetch the latest financial headlines, retrying transient failures.
///
/// A final failure is logged and yields an empty list so the pipeline can
/// continue with whatever it already has.
pub async fn fetch_financial_news(
    client: &NewsApiClient,
    query: &TopHeadlinesQuery,
    retry: RetrySettings,
) -> Vec<NewArticle> {
    let result = retry_with_backoff(retry, || {
        client.top_headlines(query)
    })
    .await;

    match result {
        Ok(articles) => {
            tracing::info!(
                count = articles.len(),
                country = %query.country,
                category = %query.category,
                "fetched articles"
            );
            articles
        }
        Err(e) => {
            tracing::error!(error = %e, "error fetching news");
            Vec::new()
        }
    }
}

fn convert_article(raw: RawArticle, fetched_at: DateTime<Utc>) -> Option<NewArticle> {
    let url = raw.url.filter(|u| !u.trim().is_empty())?;
    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && t != REMOVED_MARKER);
    let Some(title) = title else {
        tracing::debug!(url = %url, "skipping article without title");
        return None;
    };

    let description = raw.description.unwrap_or_default();
    let content = format!("{title}. {}", description.trim()).trim().to_string();

    let published_at = raw
        .published_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or(fetched_at, |dt| dt.with_timezone(&Utc));

    Some(NewArticle {
        url,
        title,
        content,
        source_name: raw.source.and_then(|s| s.name),
        published_at,
    })
}
