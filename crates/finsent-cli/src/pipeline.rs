//! The `run` command: fetch, store, analyze, persist.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use finsent_analysis::{
    build_ner_model, build_sentiment_model, AnalysisInput, BatchOutcome, BatchRunner, BatchSink,
    HostedClient, ModelSummary, NerModel, RunnerConfig, SentimentModel,
};
use finsent_core::{
    parse_model_list, resolve_models, AppConfig, ModelKind, ModelSpec, NewArticle, RerunPolicy,
    RetrySettings,
};
use finsent_db::{
    ArticleEntitiesWrite, BatchWrite, DbError, EntityWrite, NewModelRun, SentimentWrite,
    UnscoredWrite,
};
use finsent_news::{fetch_financial_news, NewsApiClient, TopHeadlinesQuery};
use sqlx::SqlitePool;

use crate::{ModelArgs, RunArgs};

/// A built model together with what the run record needs to know about it.
#[derive(Debug, Clone)]
pub(crate) enum SelectedModel {
    Sentiment {
        model: Arc<dyn SentimentModel>,
        model_ref: String,
    },
    Ner {
        model: Arc<dyn NerModel>,
        model_ref: String,
    },
}

impl SelectedModel {
    fn name(&self) -> &str {
        match self {
            SelectedModel::Sentiment { model, .. } => model.name(),
            SelectedModel::Ner { model, .. } => model.name(),
        }
    }

    fn kind(&self) -> ModelKind {
        match self {
            SelectedModel::Sentiment { .. } => ModelKind::Sentiment,
            SelectedModel::Ner { .. } => ModelKind::Ner,
        }
    }

    fn model_ref(&self) -> &str {
        match self {
            SelectedModel::Sentiment { model_ref, .. } | SelectedModel::Ner { model_ref, .. } => {
                model_ref
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct StoreOptions {
    pub rerun_policy: RerunPolicy,
    /// Backoff for batch writes that hit a locked database.
    pub persist_retry: RetrySettings,
}

/// Outcome of one model over the pending articles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelRunReport {
    pub model_name: String,
    /// `None` when every article was already scored and no run was created.
    pub run_id: Option<i64>,
    pub skipped: usize,
    pub requested: usize,
    pub scored: usize,
    pub unscored: usize,
}

/// Registry entries chosen for one invocation.
#[derive(Debug, Clone)]
pub(crate) struct ModelSelection {
    pub sentiment: Vec<&'static ModelSpec>,
    pub ner: Vec<&'static ModelSpec>,
}

impl ModelSelection {
    /// Resolve model names, letting CLI flags override config.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown model names or names of the wrong kind.
    pub(crate) fn resolve(config: &AppConfig, args: &ModelArgs) -> anyhow::Result<Self> {
        let sentiment_names = args
            .sentiment_models
            .as_deref()
            .map_or_else(|| config.sentiment_models.clone(), parse_model_list);
        let ner_names = args
            .ner_models
            .as_deref()
            .map_or_else(|| config.ner_models.clone(), parse_model_list);

        Ok(Self {
            sentiment: resolve_models(&sentiment_names, ModelKind::Sentiment)?,
            ner: resolve_models(&ner_names, ModelKind::Ner)?,
        })
    }
}

/// Inference client shared by every hosted model.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub(crate) fn hosted_client(config: &AppConfig) -> anyhow::Result<HostedClient> {
    Ok(HostedClient::new(
        &config.inference_url,
        config.hf_api_token.clone(),
        config.http_timeout_secs,
    )?)
}

/// Build the selected models, each paired with its registry reference.
///
/// # Errors
///
/// Returns an error for unknown model names or if the hosted client cannot
/// be built.
fn select_models(config: &AppConfig, args: &ModelArgs) -> anyhow::Result<Vec<SelectedModel>> {
    let ModelSelection {
        sentiment: sentiment_specs,
        ner: ner_specs,
    } = ModelSelection::resolve(config, args)?;
    let client = hosted_client(config)?;

    let mut selected = Vec::with_capacity(sentiment_specs.len() + ner_specs.len());
    for spec in sentiment_specs {
        selected.push(SelectedModel::Sentiment {
            model: build_sentiment_model(spec, &client)?,
            model_ref: spec.model_ref.to_string(),
        });
    }
    for spec in ner_specs {
        selected.push(SelectedModel::Ner {
            model: build_ner_model(spec, &client)?,
            model_ref: spec.model_ref.to_string(),
        });
    }
    Ok(selected)
}

/// Execute `finsent run`.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, storing articles fails,
/// or persisting results fails after retries. A failed headline fetch is
/// logged and yields an empty run.
pub(crate) async fn run_pipeline(
    pool: &SqlitePool,
    config: &AppConfig,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let models = select_models(config, &args.models)?;
    if models.is_empty() {
        anyhow::bail!("no models selected; set FINSENT_SENTIMENT_MODELS or FINSENT_NER_MODELS");
    }

    let api_key = config
        .news_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("NEWS_API_KEY is not set"))?;
    let news = NewsApiClient::with_base_url(api_key, config.http_timeout_secs, &config.news_api_url)?;
    let query = TopHeadlinesQuery {
        country: config.news_country.clone(),
        category: config.news_category.clone(),
        page_size: config.news_page_size,
    };
    let retry = RetrySettings::from_app_config(config);

    let articles = fetch_financial_news(&news, &query, retry).await;
    if articles.is_empty() {
        println!("no articles fetched; nothing to analyze");
        return Ok(());
    }

    if args.dry_run {
        let names: Vec<&str> = models.iter().map(SelectedModel::name).collect();
        println!(
            "dry-run: fetched {} articles; would run [{}]",
            articles.len(),
            names.join(", ")
        );
        for article in &articles {
            println!("  {}  {}", article.published_at.format("%Y-%m-%d %H:%M"), article.title);
        }
        return Ok(());
    }

    let inputs = store_articles(pool, &articles).await?;
    tracing::info!(articles = inputs.len(), models = models.len(), "starting analysis");

    let runner = BatchRunner::new(RunnerConfig {
        batch_size: args.batch_size.unwrap_or(config.batch_size),
        max_input_chars: config.max_input_chars,
        inter_request_delay: Duration::from_millis(
            args.delay_ms.unwrap_or(config.inter_request_delay_ms),
        ),
    });
    let options = StoreOptions {
        rerun_policy: args.rerun_policy.unwrap_or(config.rerun_policy),
        persist_retry: retry,
    };

    let reports = analyze_and_store(pool, &runner, &models, &inputs, options).await?;
    print_reports(inputs.len(), &reports);
    Ok(())
}

/// Upsert fetched articles and load them back as model inputs.
///
/// Articles already stored keep their original content.
///
/// # Errors
///
/// Returns an error if any upsert or the reload fails.
pub(crate) async fn store_articles(
    pool: &SqlitePool,
    articles: &[NewArticle],
) -> anyhow::Result<Vec<AnalysisInput>> {
    let mut ids = Vec::with_capacity(articles.len());
    for article in articles {
        let id = finsent_db::upsert_article(pool, article).await?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    let rows = finsent_db::get_articles_by_ids(pool, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|row| AnalysisInput {
            article_id: row.id,
            text: row.content,
        })
        .collect())
}

/// Run each model in turn and persist its batches as they finish.
///
/// Each model gets its own `model_runs` row. A run that cannot persist its
/// results is marked failed and stops the pipeline.
///
/// # Errors
///
/// Returns an error if a run record cannot be created or updated, or a
/// batch cannot be persisted after retries.
pub(crate) async fn analyze_and_store(
    pool: &SqlitePool,
    runner: &BatchRunner,
    models: &[SelectedModel],
    inputs: &[AnalysisInput],
    options: StoreOptions,
) -> anyhow::Result<Vec<ModelRunReport>> {
    let delay = runner.config().inter_request_delay;
    let mut reports = Vec::with_capacity(models.len());

    for (index, selected) in models.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let pending = pending_inputs(pool, selected.name(), inputs, options.rerun_policy).await?;
        let skipped = inputs.len() - pending.len();
        if pending.is_empty() {
            tracing::info!(model = selected.name(), skipped, "all articles already scored");
            reports.push(ModelRunReport {
                model_name: selected.name().to_string(),
                run_id: None,
                skipped,
                requested: 0,
                scored: 0,
                unscored: 0,
            });
            continue;
        }

        let run = finsent_db::create_model_run(
            pool,
            &NewModelRun {
                model_name: selected.name(),
                model_kind: selected.kind(),
                model_ref: selected.model_ref(),
                batch_size: runner.config().batch_size,
            },
        )
        .await?;

        let requested = i64::try_from(pending.len()).unwrap_or(i64::MAX);
        if let Err(e) = finsent_db::start_model_run(pool, run.id, requested).await {
            fail_run_best_effort(pool, run.id, selected.name(), format!("{e:#}")).await;
            return Err(e.into());
        }

        let summary =
            execute_run(pool, runner, selected, run.id, &pending, options.persist_retry).await?;

        tracing::info!(
            model = selected.name(),
            run_id = run.id,
            scored = summary.scored,
            unscored = summary.unscored,
            skipped,
            "model run complete"
        );
        reports.push(ModelRunReport {
            model_name: summary.model_name,
            run_id: Some(run.id),
            skipped,
            requested: summary.requested,
            scored: summary.scored,
            unscored: summary.unscored,
        });
    }

    Ok(reports)
}

/// Run one model over `pending` under a started run, then close the run.
///
/// The run ends `succeeded` with its counts, or `failed` with the error that
/// stopped it.
///
/// # Errors
///
/// Returns the persistence error that stopped the run, or a failure to
/// record completion.
async fn execute_run(
    pool: &SqlitePool,
    runner: &BatchRunner,
    selected: &SelectedModel,
    run_id: i64,
    pending: &[AnalysisInput],
    retry: RetrySettings,
) -> anyhow::Result<ModelSummary> {
    let mut sink = DbSink {
        pool,
        run_id,
        retry,
    };
    let result = match selected {
        SelectedModel::Sentiment { model, .. } => {
            runner.run_sentiment(model.as_ref(), pending, &mut sink).await
        }
        SelectedModel::Ner { model, .. } => runner.run_ner(model.as_ref(), pending, &mut sink).await,
    };

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            fail_run_best_effort(pool, run_id, selected.name(), format!("{e:#}")).await;
            return Err(e.into());
        }
    };

    let scored = i64::try_from(summary.scored).unwrap_or(i64::MAX);
    let unscored = i64::try_from(summary.unscored).unwrap_or(i64::MAX);
    if let Err(e) = finsent_db::complete_model_run(pool, run_id, scored, unscored).await {
        fail_run_best_effort(pool, run_id, selected.name(), format!("{e:#}")).await;
        return Err(e.into());
    }
    Ok(summary)
}

async fn pending_inputs(
    pool: &SqlitePool,
    model_name: &str,
    inputs: &[AnalysisInput],
    policy: RerunPolicy,
) -> Result<Vec<AnalysisInput>, DbError> {
    match policy {
        RerunPolicy::Upsert => Ok(inputs.to_vec()),
        RerunPolicy::Skip => {
            let ids: Vec<i64> = inputs.iter().map(|input| input.article_id).collect();
            let scored = finsent_db::scored_article_ids(pool, model_name, &ids).await?;
            Ok(inputs
                .iter()
                .filter(|input| !scored.contains(&input.article_id))
                .cloned()
                .collect())
        }
    }
}

/// Attempt to mark a model run as failed, logging any secondary error.
async fn fail_run_best_effort(pool: &SqlitePool, run_id: i64, model_name: &str, message: String) {
    if let Err(mark_err) = finsent_db::fail_model_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            model = model_name,
            error = %mark_err,
            "failed to mark model run as failed"
        );
    }
}

/// Writes each finished batch in its own transaction.
struct DbSink<'a> {
    pool: &'a SqlitePool,
    run_id: i64,
    retry: RetrySettings,
}

#[async_trait]
impl BatchSink for DbSink<'_> {
    type Error = DbError;

    async fn on_batch(&mut self, batch: BatchOutcome) -> Result<(), DbError> {
        let write = to_batch_write(self.run_id, &batch);
        let mut attempt: u32 = 0;
        loop {
            match finsent_db::persist_batch(self.pool, &write).await {
                Ok(summary) => {
                    tracing::debug!(
                        run_id = self.run_id,
                        batch = batch.batch_index,
                        sentiment_rows = summary.sentiment_rows,
                        entity_rows = summary.entity_rows,
                        stale_entity_rows_removed = summary.stale_entity_rows_removed,
                        unscored_rows = summary.unscored_rows,
                        "batch persisted"
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        run_id = self.run_id,
                        batch = batch.batch_index,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "batch write hit a busy database; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn to_batch_write(model_run_id: i64, batch: &BatchOutcome) -> BatchWrite {
    BatchWrite {
        model_run_id,
        model_name: batch.model_name.clone(),
        sentiments: batch
            .sentiments
            .iter()
            .map(|s| SentimentWrite {
                article_id: s.article_id,
                label: s.sentiment.label.as_str().to_string(),
                confidence: s.sentiment.confidence,
                signed_score: s.sentiment.signed_score,
            })
            .collect(),
        entities: batch
            .entities
            .iter()
            .map(|article| ArticleEntitiesWrite {
                article_id: article.article_id,
                entities: article
                    .entities
                    .iter()
                    .map(|e| EntityWrite {
                        entity_text: e.text.clone(),
                        entity_type: e.entity_type.clone(),
                        start_offset: i64::try_from(e.start).unwrap_or(i64::MAX),
                        end_offset: i64::try_from(e.end).unwrap_or(i64::MAX),
                        confidence: e.confidence,
                    })
                    .collect(),
            })
            .collect(),
        unscored: batch
            .unscored
            .iter()
            .map(|u| UnscoredWrite {
                article_id: u.article_id,
                error_message: u.reason.clone(),
            })
            .collect(),
    }
}

fn print_reports(article_count: usize, reports: &[ModelRunReport]) {
    println!("analyzed {article_count} articles with {} models", reports.len());
    println!(
        "{:<22}{:<8}{:<11}{:<8}{:<10}SKIPPED",
        "MODEL", "RUN", "REQUESTED", "SCORED", "UNSCORED"
    );
    for report in reports {
        let run = report
            .run_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:<22}{:<8}{:<11}{:<8}{:<10}{}",
            report.model_name, run, report.requested, report.scored, report.unscored, report.skipped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use finsent_analysis::{AnalysisError, RawEntity};
    use finsent_core::find_model;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{ConnectOptions, SqliteConnection};

    #[derive(Debug)]
    struct SpanNer;

    #[async_trait]
    impl NerModel for SpanNer {
        fn name(&self) -> &str {
            "span-ner"
        }

        async fn extract_batch(
            &self,
            texts: &[&str],
        ) -> Result<Vec<Vec<RawEntity>>, AnalysisError> {
            Ok(texts
                .iter()
                .map(|text| match text.find("Acme") {
                    Some(start) => vec![RawEntity {
                        entity_group: "ORG".to_string(),
                        word: "Acme".to_string(),
                        score: 0.97,
                        start: Some(start),
                        end: Some(start + 4),
                    }],
                    None => Vec::new(),
                })
                .collect())
        }
    }

    fn lexicon() -> SelectedModel {
        let spec = find_model("lexicon").expect("lexicon registered");
        let client = HostedClient::new("http://localhost:9", None, 5).expect("client");
        SelectedModel::Sentiment {
            model: build_sentiment_model(spec, &client).expect("lexicon builds"),
            model_ref: spec.model_ref.to_string(),
        }
    }

    fn span_ner() -> SelectedModel {
        SelectedModel::Ner {
            model: Arc::new(SpanNer),
            model_ref: "test/span-ner".to_string(),
        }
    }

    fn runner() -> BatchRunner {
        BatchRunner::new(RunnerConfig {
            batch_size: 2,
            max_input_chars: 512,
            inter_request_delay: Duration::ZERO,
        })
    }

    fn options(rerun_policy: RerunPolicy) -> StoreOptions {
        StoreOptions {
            rerun_policy,
            persist_retry: RetrySettings {
                max_retries: 2,
                backoff_base_ms: 1,
            },
        }
    }

    fn article(url: &str, content: &str) -> NewArticle {
        NewArticle {
            url: url.to_string(),
            title: content.to_string(),
            content: content.to_string(),
            source_name: Some("Wire".to_string()),
            published_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn sample_articles() -> Vec<NewArticle> {
        vec![
            article("https://example.com/a", "Acme profit surges on record growth"),
            article("https://example.com/b", "Shares plunge after weak guidance and losses"),
            article("https://example.com/c", "Acme holds annual meeting"),
        ]
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .expect("count")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn stores_one_row_per_article_per_model(pool: SqlitePool) {
        let inputs = store_articles(&pool, &sample_articles()).await.unwrap();
        let models = vec![lexicon(), span_ner()];

        let reports = analyze_and_store(&pool, &runner(), &models, &inputs, options(RerunPolicy::Skip))
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].scored, 3);
        assert_eq!(reports[1].scored, 3);
        assert_eq!(count(&pool, "sentiment_results").await, 3);
        assert_eq!(count(&pool, "entity_results").await, 2);
        assert_eq!(count(&pool, "scored_articles").await, 6);

        let runs = finsent_db::list_model_runs(&pool, 10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.status == "succeeded"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn skip_policy_does_not_rerun_scored_articles(pool: SqlitePool) {
        let inputs = store_articles(&pool, &sample_articles()).await.unwrap();
        let models = vec![lexicon()];

        analyze_and_store(&pool, &runner(), &models, &inputs, options(RerunPolicy::Skip))
            .await
            .unwrap();
        let second =
            analyze_and_store(&pool, &runner(), &models, &inputs, options(RerunPolicy::Skip))
                .await
                .unwrap();

        assert_eq!(second[0].run_id, None);
        assert_eq!(second[0].skipped, 3);
        assert_eq!(count(&pool, "sentiment_results").await, 3);
        assert_eq!(count(&pool, "model_runs").await, 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn upsert_policy_reruns_without_duplicating(pool: SqlitePool) {
        let inputs = store_articles(&pool, &sample_articles()).await.unwrap();
        let models = vec![lexicon(), span_ner()];

        analyze_and_store(&pool, &runner(), &models, &inputs, options(RerunPolicy::Upsert))
            .await
            .unwrap();
        let second =
            analyze_and_store(&pool, &runner(), &models, &inputs, options(RerunPolicy::Upsert))
                .await
                .unwrap();

        assert!(second.iter().all(|r| r.run_id.is_some() && r.skipped == 0));
        assert_eq!(count(&pool, "sentiment_results").await, 3);
        assert_eq!(count(&pool, "entity_results").await, 2);
        assert_eq!(count(&pool, "model_runs").await, 4);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn refetching_the_same_urls_keeps_one_article_each(pool: SqlitePool) {
        let first = store_articles(&pool, &sample_articles()).await.unwrap();
        let second = store_articles(&pool, &sample_articles()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(count(&pool, "articles").await, 3);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn empty_article_is_recorded_as_unscored(pool: SqlitePool) {
        let mut articles = sample_articles();
        articles.push(article("https://example.com/empty", "   "));
        let inputs = store_articles(&pool, &articles).await.unwrap();

        let reports =
            analyze_and_store(&pool, &runner(), &[lexicon()], &inputs, options(RerunPolicy::Skip))
                .await
                .unwrap();

        assert_eq!(reports[0].scored, 3);
        assert_eq!(reports[0].unscored, 1);
        let run_id = reports[0].run_id.expect("run created");
        let unscored = finsent_db::list_unscored_articles(&pool, run_id).await.unwrap();
        assert_eq!(unscored.len(), 1);
        assert_eq!(unscored[0].url, "https://example.com/empty");

        let run = finsent_db::get_model_run(&pool, run_id).await.unwrap();
        assert_eq!(run.articles_requested, 4);
        assert_eq!(run.articles_scored, 3);
        assert_eq!(run.articles_unscored, 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn persist_failure_marks_run_failed(pool: SqlitePool) {
        let inputs = vec![AnalysisInput {
            article_id: 9_999,
            text: "Acme profit rises".to_string(),
        }];

        let err = analyze_and_store(&pool, &runner(), &[lexicon()], &inputs, options(RerunPolicy::Upsert))
            .await
            .unwrap_err();
        assert!(!err.to_string().is_empty());

        let runs = finsent_db::list_model_runs(&pool, 1).await.unwrap();
        assert_eq!(runs[0].status, "failed");
        assert!(runs[0].error_message.is_some());
        assert_eq!(count(&pool, "sentiment_results").await, 0);
    }

    /// Stores one article and starts a lexicon run over it.
    async fn started_run(pool: &SqlitePool) -> (Vec<AnalysisInput>, i64) {
        let inputs = store_articles(pool, &sample_articles()[..1]).await.unwrap();
        let run = finsent_db::create_model_run(
            pool,
            &NewModelRun {
                model_name: "lexicon",
                model_kind: ModelKind::Sentiment,
                model_ref: "finsent/lexicon-v1",
                batch_size: 2,
            },
        )
        .await
        .unwrap();
        finsent_db::start_model_run(pool, run.id, 1).await.unwrap();
        (inputs, run.id)
    }

    /// Opens a second connection that holds the database write lock.
    async fn hold_write_lock(connect_opts: &SqliteConnectOptions) -> SqliteConnection {
        let mut conn = connect_opts.connect().await.expect("second connection");
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut conn)
            .await
            .expect("take write lock");
        conn
    }

    async fn release_write_lock(mut conn: SqliteConnection) {
        sqlx::query("COMMIT")
            .execute(&mut conn)
            .await
            .expect("release write lock");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn busy_database_write_is_retried_until_it_commits(
        pool_opts: SqlitePoolOptions,
        connect_opts: SqliteConnectOptions,
    ) {
        // Fail fast on the lock so only the sink's own backoff waits.
        let connect_opts = connect_opts.busy_timeout(Duration::ZERO);
        let pool = pool_opts.connect_with(connect_opts.clone()).await.unwrap();
        let (inputs, run_id) = started_run(&pool).await;
        let runner = runner();
        let model = lexicon();
        let retry = RetrySettings {
            max_retries: 5,
            backoff_base_ms: 200,
        };

        let lock = hold_write_lock(&connect_opts).await;
        let started = tokio::time::Instant::now();
        let (result, ()) = tokio::join!(
            execute_run(&pool, &runner, &model, run_id, &inputs, retry),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                release_write_lock(lock).await;
            }
        );

        let summary = result.expect("batch commits once the lock is released");
        assert_eq!(summary.scored, 1);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(count(&pool, "sentiment_results").await, 1);
        let run = finsent_db::get_model_run(&pool, run_id).await.unwrap();
        assert_eq!(run.status, "succeeded");
        assert_eq!(run.articles_scored, 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn run_fails_when_database_stays_locked_past_retries(
        pool_opts: SqlitePoolOptions,
        connect_opts: SqliteConnectOptions,
    ) {
        // Each write waits 1s on the lock: two attempts give up at ~2s, and the
        // failure mark issued right after outlasts the release at 2.5s.
        let connect_opts = connect_opts.busy_timeout(Duration::from_millis(1_000));
        let pool = pool_opts.connect_with(connect_opts.clone()).await.unwrap();
        let (inputs, run_id) = started_run(&pool).await;
        let runner = runner();
        let model = lexicon();
        let retry = RetrySettings {
            max_retries: 1,
            backoff_base_ms: 10,
        };

        let lock = hold_write_lock(&connect_opts).await;
        let (result, ()) = tokio::join!(
            execute_run(&pool, &runner, &model, run_id, &inputs, retry),
            async {
                tokio::time::sleep(Duration::from_millis(2_500)).await;
                release_write_lock(lock).await;
            }
        );

        let err = result.expect_err("writes never get the lock");
        assert!(
            err.downcast_ref::<DbError>().is_some_and(DbError::is_transient),
            "got: {err:#}"
        );
        assert_eq!(count(&pool, "sentiment_results").await, 0);
        let run = finsent_db::get_model_run(&pool, run_id).await.unwrap();
        assert_eq!(run.status, "failed");
        assert!(run.error_message.is_some());
    }

    #[test]
    fn batch_write_carries_offsets_and_reasons() {
        use finsent_analysis::{
            ArticleEntities, ArticleSentiment, NormalizedEntity, NormalizedSentiment,
            SentimentLabel, Unscored,
        };

        let batch = BatchOutcome {
            model_name: "m".to_string(),
            batch_index: 0,
            sentiments: vec![ArticleSentiment {
                article_id: 1,
                sentiment: NormalizedSentiment {
                    label: SentimentLabel::Negative,
                    confidence: 0.8,
                    signed_score: -0.8,
                },
            }],
            entities: vec![ArticleEntities {
                article_id: 2,
                entities: vec![NormalizedEntity {
                    text: "Acme".to_string(),
                    entity_type: "ORG".to_string(),
                    start: 3,
                    end: 7,
                    confidence: 0.9,
                }],
            }],
            unscored: vec![Unscored {
                article_id: 3,
                model_name: "m".to_string(),
                reason: "empty text".to_string(),
            }],
        };

        let write = to_batch_write(42, &batch);
        assert_eq!(write.model_run_id, 42);
        assert_eq!(write.sentiments[0].label, "negative");
        assert_eq!(write.entities[0].entities[0].start_offset, 3);
        assert_eq!(write.entities[0].entities[0].end_offset, 7);
        assert_eq!(write.unscored[0].error_message, "empty text");
    }
}
