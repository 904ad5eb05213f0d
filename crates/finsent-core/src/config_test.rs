use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "FINSENT_ENV"));
}

#[test]
fn empty_env_yields_defaults() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).expect("defaults should be valid");

    assert_eq!(cfg.database_url, "sqlite://financial_news.db");
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:3000");
    assert_eq!(cfg.log_level, "info");
    assert!(cfg.news_api_key.is_none());
    assert_eq!(cfg.news_country, "us");
    assert_eq!(cfg.news_category, "business");
    assert_eq!(cfg.news_page_size, 50);
    assert_eq!(cfg.sentiment_models, vec!["twitter-roberta"]);
    assert_eq!(cfg.ner_models, vec!["bert-base-ner"]);
    assert_eq!(cfg.batch_size, 16);
    assert_eq!(cfg.max_input_chars, 512);
    assert_eq!(cfg.inter_request_delay_ms, 1000);
    assert_eq!(cfg.rerun_policy, RerunPolicy::Skip);
    assert_eq!(cfg.inference_url, "https://api-inference.huggingface.co");
    assert!(cfg.hf_api_token.is_none());
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.retry_backoff_base_ms, 500);
    assert_eq!(cfg.db_max_connections, 5);
}

#[test]
fn model_lists_are_parsed_from_env() {
    let mut map = HashMap::new();
    map.insert("FINSENT_SENTIMENT_MODELS", "twitter-roberta, finbert");
    map.insert("FINSENT_NER_MODELS", "bert-base-ner,bert-large-ner");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.sentiment_models, vec!["twitter-roberta", "finbert"]);
    assert_eq!(cfg.ner_models, vec!["bert-base-ner", "bert-large-ner"]);
}

#[test]
fn empty_ner_model_list_is_allowed() {
    let mut map = HashMap::new();
    map.insert("FINSENT_NER_MODELS", "");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.ner_models.is_empty());
}

#[test]
fn unknown_sentiment_model_fails() {
    let mut map = HashMap::new();
    map.insert("FINSENT_SENTIMENT_MODELS", "twitter-roberta,vader");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::UnknownModel { ref name, .. }) if name == "vader"),
        "expected UnknownModel(vader), got: {result:?}"
    );
}

#[test]
fn zero_batch_size_fails() {
    let mut map = HashMap::new();
    map.insert("FINSENT_BATCH_SIZE", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FINSENT_BATCH_SIZE"),
        "expected InvalidEnvVar(FINSENT_BATCH_SIZE), got: {result:?}"
    );
}

#[test]
fn non_numeric_batch_size_fails() {
    let mut map = HashMap::new();
    map.insert("FINSENT_BATCH_SIZE", "lots");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FINSENT_BATCH_SIZE"),
        "expected InvalidEnvVar(FINSENT_BATCH_SIZE), got: {result:?}"
    );
}

#[test]
fn page_size_above_newsapi_limit_fails() {
    let mut map = HashMap::new();
    map.insert("FINSENT_NEWS_PAGE_SIZE", "250");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FINSENT_NEWS_PAGE_SIZE"),
        "expected InvalidEnvVar(FINSENT_NEWS_PAGE_SIZE), got: {result:?}"
    );
}

#[test]
fn rerun_policy_override() {
    let mut map = HashMap::new();
    map.insert("FINSENT_RERUN_POLICY", "Upsert");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.rerun_policy, RerunPolicy::Upsert);
}

#[test]
fn rerun_policy_invalid() {
    let mut map = HashMap::new();
    map.insert("FINSENT_RERUN_POLICY", "overwrite");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FINSENT_RERUN_POLICY"),
        "expected InvalidEnvVar(FINSENT_RERUN_POLICY), got: {result:?}"
    );
}

#[test]
fn invalid_bind_addr_fails() {
    let mut map = HashMap::new();
    map.insert("FINSENT_BIND_ADDR", "not-a-socket-addr");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FINSENT_BIND_ADDR"),
        "expected InvalidEnvVar(FINSENT_BIND_ADDR), got: {result:?}"
    );
}

#[test]
fn blank_secrets_are_treated_as_absent() {
    let mut map = HashMap::new();
    map.insert("NEWS_API_KEY", "   ");
    map.insert("HF_API_TOKEN", "");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.news_api_key.is_none());
    assert!(cfg.hf_api_token.is_none());
}

#[test]
fn debug_output_redacts_secrets() {
    let mut map = HashMap::new();
    map.insert("NEWS_API_KEY", "news-secret");
    map.insert("HF_API_TOKEN", "hf-secret");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let debug = format!("{cfg:?}");
    assert!(!debug.contains("news-secret"));
    assert!(!debug.contains("hf-secret"));
    assert!(debug.contains("[redacted]"));
}
