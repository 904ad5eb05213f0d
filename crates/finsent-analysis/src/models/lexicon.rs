//! Offline finance lexicon scorer.

use async_trait::async_trait;
use finsent_core::ModelSpec;

use super::SentimentModel;
use crate::error::AnalysisError;
use crate::types::RawSentiment;

/// Finance word weights.
///
/// Keys are lowercase single words. Positive weights push toward bullish,
/// negative toward bearish. The summed score is clamped to `[-1.0, 1.0]`.
const LEXICON: &[(&str, f64)] = &[
    ("beat", 0.4),
    ("beats", 0.4),
    ("surge", 0.5),
    ("surges", 0.5),
    ("soar", 0.5),
    ("soars", 0.5),
    ("rally", 0.4),
    ("rallies", 0.4),
    ("gain", 0.3),
    ("gains", 0.3),
    ("growth", 0.3),
    ("profit", 0.3),
    ("record", 0.3),
    ("upgrade", 0.4),
    ("upgraded", 0.4),
    ("bullish", 0.5),
    ("outperform", 0.4),
    ("strong", 0.3),
    ("rebound", 0.3),
    ("dividend", 0.2),
    ("miss", -0.4),
    ("misses", -0.4),
    ("plunge", -0.6),
    ("plunges", -0.6),
    ("slump", -0.5),
    ("falls", -0.3),
    ("loss", -0.4),
    ("losses", -0.4),
    ("downgrade", -0.5),
    ("downgraded", -0.5),
    ("bearish", -0.5),
    ("recession", -0.6),
    ("layoffs", -0.5),
    ("bankruptcy", -0.8),
    ("default", -0.6),
    ("lawsuit", -0.4),
    ("fraud", -0.7),
    ("probe", -0.4),
    ("weak", -0.3),
    ("warning", -0.4),
];

/// Scores below this magnitude are reported as neutral.
const NEUTRAL_BAND: f64 = 0.1;

/// Score a text with the finance lexicon.
///
/// Splits on whitespace, strips punctuation, sums matching weights, and
/// clamps to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f64 {
    let mut score = 0.0_f64;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex_word, _)| *lex_word == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

fn score_to_sentiment(score: f64) -> RawSentiment {
    let (label, confidence) = if score >= NEUTRAL_BAND {
        ("positive", score)
    } else if score <= -NEUTRAL_BAND {
        ("negative", -score)
    } else {
        ("neutral", 1.0 - score.abs())
    };
    RawSentiment {
        label: label.to_string(),
        score: confidence,
    }
}

#[derive(Debug)]
pub struct LexiconModel {
    spec: &'static ModelSpec,
}

impl LexiconModel {
    #[must_use]
    pub fn new(spec: &'static ModelSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl SentimentModel for LexiconModel {
    fn name(&self) -> &str {
        self.spec.name
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<RawSentiment>, AnalysisError> {
        Ok(texts
            .iter()
            .map(|text| score_to_sentiment(lexicon_score(text)))
            .collect())
    }
}
