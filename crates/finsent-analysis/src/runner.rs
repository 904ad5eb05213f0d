//! Batch inference runner.
//!
//! Splits articles into fixed-size batches, calls each model once per batch,
//! and hands every normalized batch to a [`BatchSink`] before moving on.
//! A batch rejected because of its inputs is retried one article at a time
//! so a single bad input only costs its own result. Any other batch failure
//! leaves the whole batch unscored.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::models::{ModelSet, NerModel, SentimentModel};
use crate::normalize::{normalize_entities, normalize_sentiment};
use crate::text::truncate_chars;
use crate::types::{
    AnalysisInput, ArticleEntities, ArticleSentiment, BatchOutcome, ModelSummary, RawEntity,
    RawSentiment, Unscored,
};

/// Receives each batch as soon as it is normalized.
///
/// Returning an error stops the runner; batches already handed over stay
/// with the sink.
#[async_trait]
pub trait BatchSink: Send {
    type Error: Send;

    async fn on_batch(&mut self, batch: BatchOutcome) -> Result<(), Self::Error>;
}

/// Sink that keeps every batch in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub batches: Vec<BatchOutcome>,
}

#[async_trait]
impl BatchSink for CollectSink {
    type Error = Infallible;

    async fn on_batch(&mut self, batch: BatchOutcome) -> Result<(), Infallible> {
        self.batches.push(batch);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub batch_size: usize,
    pub max_input_chars: usize,
    /// Pause between consecutive model calls.
    pub inter_request_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            max_input_chars: 512,
            inter_request_delay: Duration::ZERO,
        }
    }
}

/// Sleeps between model calls, but not before the first one.
struct Pacer {
    delay: Duration,
    called: bool,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            called: false,
        }
    }

    async fn wait(&mut self) {
        if self.called && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.called = true;
    }
}

/// One model seen through the runner: call it, then record its outputs.
#[async_trait]
trait BatchModel: Send + Sync {
    type Output: Send;

    fn model_name(&self) -> &str;

    async fn call(&self, texts: &[&str]) -> Result<Vec<Self::Output>, AnalysisError>;

    fn record(&self, outcome: &mut BatchOutcome, article_id: i64, text: &str, output: Self::Output);
}

struct SentimentStep<'a>(&'a dyn SentimentModel);

#[async_trait]
impl<'a> BatchModel for SentimentStep<'a> {
    type Output = RawSentiment;

    fn model_name(&self) -> &str {
        self.0.name()
    }

    async fn call(&self, texts: &[&str]) -> Result<Vec<RawSentiment>, AnalysisError> {
        self.0.classify_batch(texts).await
    }

    fn record(&self, outcome: &mut BatchOutcome, article_id: i64, _text: &str, raw: RawSentiment) {
        match normalize_sentiment(&raw, self.0.label_count()) {
            Ok(sentiment) => outcome.sentiments.push(ArticleSentiment {
                article_id,
                sentiment,
            }),
            Err(e) => {
                tracing::warn!(
                    model = self.0.name(),
                    article_id,
                    error = %e,
                    "sentiment output rejected"
                );
                outcome.unscored.push(Unscored {
                    article_id,
                    model_name: self.0.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

struct NerStep<'a>(&'a dyn NerModel);

#[async_trait]
impl<'a> BatchModel for NerStep<'a> {
    type Output = Vec<RawEntity>;

    fn model_name(&self) -> &str {
        self.0.name()
    }

    async fn call(&self, texts: &[&str]) -> Result<Vec<Vec<RawEntity>>, AnalysisError> {
        self.0.extract_batch(texts).await
    }

    fn record(&self, outcome: &mut BatchOutcome, article_id: i64, text: &str, raw: Vec<RawEntity>) {
        outcome.entities.push(ArticleEntities {
            article_id,
            entities: normalize_entities(text, &raw),
        });
    }
}

/// Runs models over articles batch by batch, strictly one call at a time.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: RunnerConfig,
}

impl BatchRunner {
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let config = RunnerConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every model in `models` over `inputs`, sentiment models first.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if it rejects a batch; model failures never
    /// abort the run.
    pub async fn run<S: BatchSink>(
        &self,
        inputs: &[AnalysisInput],
        models: &ModelSet,
        sink: &mut S,
    ) -> Result<Vec<ModelSummary>, S::Error> {
        let mut pacer = Pacer::new(self.config.inter_request_delay);
        let mut summaries = Vec::with_capacity(models.len());
        for model in &models.sentiment {
            let step = SentimentStep(model.as_ref());
            summaries.push(self.run_model(&step, inputs, sink, &mut pacer).await?);
        }
        for model in &models.ner {
            let step = NerStep(model.as_ref());
            summaries.push(self.run_model(&step, inputs, sink, &mut pacer).await?);
        }
        Ok(summaries)
    }

    /// Run one sentiment model over `inputs`.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if it rejects a batch.
    pub async fn run_sentiment<S: BatchSink>(
        &self,
        model: &dyn SentimentModel,
        inputs: &[AnalysisInput],
        sink: &mut S,
    ) -> Result<ModelSummary, S::Error> {
        let mut pacer = Pacer::new(self.config.inter_request_delay);
        self.run_model(&SentimentStep(model), inputs, sink, &mut pacer)
            .await
    }

    /// Run one NER model over `inputs`.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if it rejects a batch.
    pub async fn run_ner<S: BatchSink>(
        &self,
        model: &dyn NerModel,
        inputs: &[AnalysisInput],
        sink: &mut S,
    ) -> Result<ModelSummary, S::Error> {
        let mut pacer = Pacer::new(self.config.inter_request_delay);
        self.run_model(&NerStep(model), inputs, sink, &mut pacer)
            .await
    }

    async fn run_model<M: BatchModel, S: BatchSink>(
        &self,
        model: &M,
        inputs: &[AnalysisInput],
        sink: &mut S,
        pacer: &mut Pacer,
    ) -> Result<ModelSummary, S::Error> {
        let mut summary = ModelSummary {
            model_name: model.model_name().to_string(),
            requested: inputs.len(),
            ..ModelSummary::default()
        };

        for (batch_index, chunk) in inputs.chunks(self.config.batch_size).enumerate() {
            let outcome = self.run_batch(model, batch_index, chunk, pacer).await;
            tracing::debug!(
                model = model.model_name(),
                batch = batch_index,
                scored = outcome.scored_count(),
                unscored = outcome.unscored.len(),
                "batch finished"
            );
            summary.batches += 1;
            summary.scored += outcome.scored_count();
            summary.unscored += outcome.unscored.len();
            sink.on_batch(outcome).await?;
        }

        tracing::info!(
            model = %summary.model_name,
            batches = summary.batches,
            scored = summary.scored,
            unscored = summary.unscored,
            "model finished"
        );
        Ok(summary)
    }

    async fn run_batch<M: BatchModel>(
        &self,
        model: &M,
        batch_index: usize,
        chunk: &[AnalysisInput],
        pacer: &mut Pacer,
    ) -> BatchOutcome {
        let name = model.model_name();
        let mut outcome = BatchOutcome::new(name, batch_index);

        let mut ready: Vec<(i64, &str)> = Vec::with_capacity(chunk.len());
        for input in chunk {
            let text = truncate_chars(&input.text, self.config.max_input_chars);
            if text.trim().is_empty() {
                tracing::warn!(model = name, article_id = input.article_id, "empty article text");
                outcome.unscored.push(Unscored {
                    article_id: input.article_id,
                    model_name: name.to_string(),
                    reason: "empty article text".to_string(),
                });
            } else {
                ready.push((input.article_id, text));
            }
        }
        if ready.is_empty() {
            return outcome;
        }

        let texts: Vec<&str> = ready.iter().map(|(_, text)| *text).collect();
        pacer.wait().await;
        let batch_error = match call_checked(model, &texts).await {
            Ok(outputs) => {
                for ((article_id, text), output) in ready.iter().zip(outputs) {
                    model.record(&mut outcome, *article_id, text, output);
                }
                return outcome;
            }
            Err(e) => e,
        };

        tracing::warn!(
            model = name,
            batch = batch_index,
            size = ready.len(),
            error = %batch_error,
            "batch inference failed"
        );

        if ready.len() == 1 || !batch_error.is_input_specific() {
            let reason = batch_error.to_string();
            for (article_id, _) in ready {
                outcome.unscored.push(Unscored {
                    article_id,
                    model_name: name.to_string(),
                    reason: reason.clone(),
                });
            }
            return outcome;
        }

        tracing::info!(model = name, batch = batch_index, "retrying batch article by article");
        for (article_id, text) in ready {
            pacer.wait().await;
            match call_checked(model, &[text]).await {
                Ok(outputs) => {
                    for output in outputs {
                        model.record(&mut outcome, article_id, text, output);
                    }
                }
                Err(e) => {
                    tracing::warn!(model = name, article_id, error = %e, "article inference failed");
                    outcome.unscored.push(Unscored {
                        article_id,
                        model_name: name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome
    }
}

/// Call `model` and insist on exactly one output per input.
async fn call_checked<M: BatchModel>(
    model: &M,
    texts: &[&str],
) -> Result<Vec<M::Output>, AnalysisError> {
    let outputs = model.call(texts).await?;
    if outputs.len() != texts.len() {
        return Err(AnalysisError::CountMismatch {
            model: model.model_name().to_string(),
            expected: texts.len(),
            got: outputs.len(),
        });
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::types::SentimentLabel;

    /// Labels every text positive; fails any call containing "MALFORMED".
    #[derive(Debug, Default)]
    struct FakeSentiment {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl SentimentModel for FakeSentiment {
        fn name(&self) -> &str {
            "fake-sentiment"
        }

        async fn classify_batch(
            &self,
            texts: &[&str],
        ) -> Result<Vec<RawSentiment>, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push(texts.iter().map(|t| (*t).to_string()).collect());
            if texts.iter().any(|t| t.contains("MALFORMED")) {
                return Err(AnalysisError::Inference {
                    model: "fake-sentiment".into(),
                    status: 400,
                    message: "bad input".into(),
                });
            }
            Ok(texts
                .iter()
                .map(|_| RawSentiment {
                    label: "LABEL_2".into(),
                    score: 0.8,
                })
                .collect())
        }
    }

    /// Returns one output too few.
    #[derive(Debug)]
    struct ShortSentiment;

    #[async_trait]
    impl SentimentModel for ShortSentiment {
        fn name(&self) -> &str {
            "short"
        }

        async fn classify_batch(
            &self,
            texts: &[&str],
        ) -> Result<Vec<RawSentiment>, AnalysisError> {
            Ok(texts
                .iter()
                .skip(1)
                .map(|_| RawSentiment {
                    label: "neutral".into(),
                    score: 0.5,
                })
                .collect())
        }
    }

    /// Tags "Apple" at the start of every text.
    #[derive(Debug)]
    struct FakeNer;

    #[async_trait]
    impl NerModel for FakeNer {
        fn name(&self) -> &str {
            "fake-ner"
        }

        async fn extract_batch(
            &self,
            texts: &[&str],
        ) -> Result<Vec<Vec<RawEntity>>, AnalysisError> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.starts_with("Apple") {
                        vec![RawEntity {
                            entity_group: "ORG".into(),
                            word: "Apple".into(),
                            score: 0.99,
                            start: Some(0),
                            end: Some(5),
                        }]
                    } else {
                        Vec::new()
                    }
                })
                .collect())
        }
    }

    /// Every call fails as if the host were rate limiting.
    #[derive(Debug, Default)]
    struct ThrottledSentiment {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SentimentModel for ThrottledSentiment {
        fn name(&self) -> &str {
            "throttled"
        }

        async fn classify_batch(
            &self,
            _texts: &[&str],
        ) -> Result<Vec<RawSentiment>, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AnalysisError::Inference {
                model: "throttled".into(),
                status: 429,
                message: "rate limited".into(),
            })
        }
    }

    fn inputs(texts: &[&str]) -> Vec<AnalysisInput> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| AnalysisInput {
                article_id: i64::try_from(i).unwrap() + 1,
                text: (*t).to_string(),
            })
            .collect()
    }

    fn runner(batch_size: usize) -> BatchRunner {
        BatchRunner::new(RunnerConfig {
            batch_size,
            max_input_chars: 512,
            inter_request_delay: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn splits_inputs_into_batches() {
        let model = FakeSentiment::default();
        let mut sink = CollectSink::default();
        let summary = runner(2)
            .run_sentiment(&model, &inputs(&["a", "b", "c", "d", "e"]), &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.batches, 3);
        assert_eq!(summary.scored, 5);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.batches.len(), 3);
        assert_eq!(sink.batches[2].sentiments.len(), 1);
        assert_eq!(
            sink.batches[0].sentiments[0].sentiment.label,
            SentimentLabel::Positive
        );
    }

    #[tokio::test]
    async fn malformed_article_does_not_block_its_batch() {
        let model = FakeSentiment::default();
        let mut sink = CollectSink::default();
        let summary = runner(4)
            .run_sentiment(
                &model,
                &inputs(&["good news", "MALFORMED", "more news"]),
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(summary.scored, 2);
        assert_eq!(summary.unscored, 1);
        let batch = &sink.batches[0];
        let scored: Vec<i64> = batch.sentiments.iter().map(|s| s.article_id).collect();
        assert_eq!(scored, vec![1, 3]);
        assert_eq!(batch.unscored[0].article_id, 2);
        assert_eq!(batch.unscored[0].model_name, "fake-sentiment");
        // one batch call plus three single-article retries
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn host_failure_marks_batch_unscored_without_single_retries() {
        let model = ThrottledSentiment::default();
        let mut sink = CollectSink::default();
        let summary = runner(4)
            .run_sentiment(&model, &inputs(&["a", "b", "c", "d", "e"]), &mut sink)
            .await
            .unwrap();

        // one call per batch, no per-article fallback
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.scored, 0);
        assert_eq!(summary.unscored, 5);
        let ids: Vec<i64> = sink.batches[0].unscored.iter().map(|u| u.article_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(sink.batches[0].unscored[0].reason.contains("429"));
    }

    #[tokio::test]
    async fn count_mismatch_falls_back_and_records_failures() {
        let mut sink = CollectSink::default();
        let summary = runner(3)
            .run_sentiment(&ShortSentiment, &inputs(&["a", "b"]), &mut sink)
            .await
            .unwrap();
        assert_eq!(summary.scored, 0);
        assert_eq!(summary.unscored, 2);
        assert!(sink.batches[0].unscored[0].reason.contains("outputs"));
    }

    #[tokio::test]
    async fn empty_text_is_unscored_without_calling_model() {
        let model = FakeSentiment::default();
        let mut sink = CollectSink::default();
        runner(4)
            .run_sentiment(&model, &inputs(&["   "]), &mut sink)
            .await
            .unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.batches[0].unscored.len(), 1);
    }

    #[tokio::test]
    async fn texts_are_truncated_before_inference() {
        let model = FakeSentiment::default();
        let mut sink = CollectSink::default();
        let long = "x".repeat(700);
        BatchRunner::new(RunnerConfig {
            batch_size: 1,
            max_input_chars: 512,
            inter_request_delay: Duration::ZERO,
        })
        .run_sentiment(&model, &inputs(&[&long]), &mut sink)
        .await
        .unwrap();
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0][0].chars().count(), 512);
    }

    #[tokio::test]
    async fn run_covers_every_model() {
        let models = ModelSet {
            sentiment: vec![
                Arc::new(FakeSentiment::default()) as Arc<dyn SentimentModel>,
                Arc::new(ShortSentiment),
            ],
            ner: vec![Arc::new(FakeNer)],
        };
        let mut sink = CollectSink::default();
        let summaries = runner(8)
            .run(&inputs(&["Apple rallies", "Markets flat"]), &models, &mut sink)
            .await
            .unwrap();

        let names: Vec<&str> = summaries.iter().map(|s| s.model_name.as_str()).collect();
        assert_eq!(names, vec!["fake-sentiment", "short", "fake-ner"]);

        let ner_batch = sink
            .batches
            .iter()
            .find(|b| b.model_name == "fake-ner")
            .unwrap();
        assert_eq!(ner_batch.entities.len(), 2);
        assert_eq!(ner_batch.entities[0].entities[0].text, "Apple");
        assert!(ner_batch.entities[1].entities.is_empty());
    }

    #[tokio::test]
    async fn sink_error_stops_the_run() {
        struct FailingSink;

        #[async_trait]
        impl BatchSink for FailingSink {
            type Error = String;

            async fn on_batch(&mut self, _batch: BatchOutcome) -> Result<(), String> {
                Err("disk full".into())
            }
        }

        let model = FakeSentiment::default();
        let err = runner(1)
            .run_sentiment(&model, &inputs(&["a", "b"]), &mut FailingSink)
            .await
            .unwrap_err();
        assert_eq!(err, "disk full");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied_between_calls() {
        let model = FakeSentiment::default();
        let mut sink = CollectSink::default();
        let start = tokio::time::Instant::now();
        BatchRunner::new(RunnerConfig {
            batch_size: 1,
            max_input_chars: 512,
            inter_request_delay: Duration::from_millis(1000),
        })
        .run_sentiment(&model, &inputs(&["a", "b", "c"]), &mut sink)
        .await
        .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }
}
