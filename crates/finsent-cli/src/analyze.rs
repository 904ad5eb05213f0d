//! The `analyze` command: compare models on a single text without storing.

use std::time::Duration;

use finsent_analysis::{
    build_model_set, company_names, AnalysisInput, BatchOutcome, BatchRunner, CollectSink,
    ModelSet, RunnerConfig,
};
use finsent_core::AppConfig;

use crate::pipeline::{hosted_client, ModelSelection};
use crate::ModelArgs;

/// Run every selected model over `text` and print a side-by-side table.
///
/// # Errors
///
/// Returns an error if `text` is blank or a model name is unknown. Model
/// failures are printed per model rather than returned.
pub(crate) async fn run_analyze(
    config: &AppConfig,
    text: &str,
    args: &ModelArgs,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("--text must not be empty");
    }

    let selection = ModelSelection::resolve(config, args)?;
    let models = build_model_set(&selection.sentiment, &selection.ner, &hosted_client(config)?)?;
    if models.is_empty() {
        anyhow::bail!("no models selected");
    }

    let runner = BatchRunner::new(RunnerConfig {
        batch_size: 1,
        max_input_chars: config.max_input_chars,
        inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
    });
    let batches = analyze_text(&runner, &models, text).await;

    print_comparison(&batches);
    Ok(())
}

/// Run each model over one input and collect the batch outcomes.
pub(crate) async fn analyze_text(
    runner: &BatchRunner,
    models: &ModelSet,
    text: &str,
) -> Vec<BatchOutcome> {
    let inputs = [AnalysisInput {
        article_id: 0,
        text: text.to_string(),
    }];

    let mut sink = CollectSink::default();
    if let Err(never) = runner.run(&inputs, models, &mut sink).await {
        match never {}
    }
    sink.batches
}

fn print_comparison(batches: &[BatchOutcome]) {
    println!("{:<22}{:<10}{:<12}SCORE", "MODEL", "LABEL", "CONFIDENCE");
    for batch in batches {
        for result in &batch.sentiments {
            let s = &result.sentiment;
            println!(
                "{:<22}{:<10}{:<12.3}{:+.3}",
                batch.model_name,
                s.label.as_str(),
                s.confidence,
                s.signed_score
            );
        }
        for unscored in &batch.unscored {
            println!("{:<22}error: {}", batch.model_name, unscored.reason);
        }
    }

    for batch in batches.iter().filter(|b| !b.entities.is_empty()) {
        println!();
        println!("entities ({}):", batch.model_name);
        for article in &batch.entities {
            if article.entities.is_empty() {
                println!("  (none)");
            }
            for entity in &article.entities {
                println!(
                    "  {:<6}{:<30}{:.3}  [{}..{}]",
                    entity.entity_type, entity.text, entity.confidence, entity.start, entity.end
                );
            }
            let companies = company_names(&article.entities);
            if !companies.is_empty() {
                println!("  companies: {}", companies.join(", "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsent_analysis::{HostedClient, SentimentLabel};
    use finsent_core::find_model;

    #[tokio::test]
    async fn lexicon_scores_text_offline() {
        let spec = find_model("lexicon").expect("lexicon registered");
        let client = HostedClient::new("http://localhost:9", None, 5).expect("client");
        let models = build_model_set(&[spec], &[], &client).expect("lexicon builds");
        let runner = BatchRunner::new(RunnerConfig::default());

        let batches = analyze_text(&runner, &models, "Profit surges to record growth").await;

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].model_name, "lexicon");
        assert_eq!(batches[0].sentiments.len(), 1);
        assert_eq!(
            batches[0].sentiments[0].sentiment.label,
            SentimentLabel::Positive
        );
    }
}
