//! Article source adapter: fetches business headlines from NewsAPI.

pub mod client;
pub mod error;
pub mod types;

mod retry;

pub use client::{fetch_financial_news, NewsApiClient, TopHeadlinesQuery};
pub use error::NewsError;
pub use finsent_core::RetrySettings;
