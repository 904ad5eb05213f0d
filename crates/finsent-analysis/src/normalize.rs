//! Maps raw model output into bounded, validated records.
//!
//! Sentiment labels are folded onto {positive, negative, neutral} and
//! confidences are checked against `[0, 1]`. Entity spans are validated
//! against the input text, cleaned, and de-overlapped. Invalid spans are
//! dropped with a warning; they never fail the batch.

use crate::error::NormalizeError;
use crate::types::{NormalizedEntity, NormalizedSentiment, RawEntity, RawSentiment, SentimentLabel};

/// Tolerance for confidences that drift just outside `[0, 1]` from float noise.
const CONFIDENCE_EPSILON: f64 = 1e-6;

/// Legal suffixes that NER models often tag as standalone organisations.
const LEGAL_SUFFIXES: &[&str] = &["inc", "ltd", "corp", "company", "co"];

/// News outlets that show up as ORG entities in their own headlines.
const NEWS_SOURCE_BLOCKLIST: &[&str] = &[
    "reuters",
    "bloomberg",
    "cnbc",
    "wsj",
    "financial",
    "times",
    "ap",
    "com",
    "cnn",
    "bbc",
    "nytimes",
    "theguardian",
    "forbes",
    "fortune",
];

/// Map a model label onto the bounded label set.
///
/// `label_count` selects how index labels are read: three-class models use
/// `LABEL_0/1/2` = negative/neutral/positive, two-class models use
/// `LABEL_0/1` = negative/positive.
///
/// # Errors
///
/// Returns [`NormalizeError::UnknownLabel`] for anything else.
pub fn normalize_label(label: &str, label_count: u8) -> Result<SentimentLabel, NormalizeError> {
    let lowered = label.trim().to_ascii_lowercase();
    let mapped = match lowered.as_str() {
        "positive" | "pos" => Some(SentimentLabel::Positive),
        "negative" | "neg" => Some(SentimentLabel::Negative),
        "neutral" | "neu" => Some(SentimentLabel::Neutral),
        other => match (other.strip_prefix("label_"), label_count) {
            (Some("0"), _) => Some(SentimentLabel::Negative),
            (Some("1"), 2) => Some(SentimentLabel::Positive),
            (Some("1"), 3) => Some(SentimentLabel::Neutral),
            (Some("2"), 3) => Some(SentimentLabel::Positive),
            _ => None,
        },
    };
    mapped.ok_or_else(|| NormalizeError::UnknownLabel(label.to_string()))
}

/// Check a model confidence and clamp float noise into `[0, 1]`.
///
/// # Errors
///
/// Returns [`NormalizeError::NonFiniteConfidence`] for NaN or infinities and
/// [`NormalizeError::ConfidenceOutOfRange`] for values further than `1e-6`
/// outside the unit interval.
pub fn normalize_confidence(value: f64) -> Result<f64, NormalizeError> {
    if !value.is_finite() {
        return Err(NormalizeError::NonFiniteConfidence);
    }
    if (-CONFIDENCE_EPSILON..=1.0 + CONFIDENCE_EPSILON).contains(&value) {
        Ok(value.clamp(0.0, 1.0))
    } else {
        Err(NormalizeError::ConfidenceOutOfRange(value))
    }
}

/// Normalize one sentiment output.
///
/// # Errors
///
/// Returns [`NormalizeError`] if the label is unknown or the confidence is
/// not usable.
pub fn normalize_sentiment(
    raw: &RawSentiment,
    label_count: u8,
) -> Result<NormalizedSentiment, NormalizeError> {
    let label = normalize_label(&raw.label, label_count)?;
    let confidence = normalize_confidence(raw.score)?;
    let signed_score = match label {
        SentimentLabel::Positive => confidence,
        SentimentLabel::Negative => -confidence,
        SentimentLabel::Neutral => 0.0,
    };
    Ok(NormalizedSentiment {
        label,
        confidence,
        signed_score,
    })
}

/// Strip word-piece markers from entity text.
fn clean_entity_text(word: &str) -> String {
    word.replace('#', "").trim().to_string()
}

/// Strip the IOB `B-`/`I-` prefix from an entity tag.
fn clean_entity_type(tag: &str) -> String {
    let tag = tag.trim();
    tag.strip_prefix("B-")
        .or_else(|| tag.strip_prefix("I-"))
        .unwrap_or(tag)
        .to_string()
}

/// Validate, clean, and de-overlap the entities a model reported for `text`.
///
/// Every returned span satisfies `0 <= start < end <= text.chars().count()`.
/// Spans are returned sorted by start offset. When two spans overlap the
/// earlier one is kept unless the later one has strictly higher confidence.
#[must_use]
pub fn normalize_entities(text: &str, raw: &[RawEntity]) -> Vec<NormalizedEntity> {
    let char_len = text.chars().count();
    let mut candidates: Vec<NormalizedEntity> = Vec::with_capacity(raw.len());

    for entity in raw {
        let (Some(start), Some(end)) = (entity.start, entity.end) else {
            tracing::warn!(word = %entity.word, "dropping entity without offsets");
            continue;
        };
        if start >= end || end > char_len {
            tracing::warn!(
                word = %entity.word,
                start,
                end,
                text_len = char_len,
                "dropping entity with invalid span"
            );
            continue;
        }
        let confidence = match normalize_confidence(entity.score) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(word = %entity.word, error = %e, "dropping entity");
                continue;
            }
        };
        let cleaned = clean_entity_text(&entity.word);
        let entity_type = clean_entity_type(&entity.entity_group);
        if cleaned.is_empty() || entity_type.is_empty() {
            tracing::warn!(word = %entity.word, "dropping empty entity");
            continue;
        }
        candidates.push(NormalizedEntity {
            text: cleaned,
            entity_type,
            start,
            end,
            confidence,
        });
    }

    candidates.sort_by_key(|e| (e.start, e.end));

    let mut resolved: Vec<NormalizedEntity> = Vec::with_capacity(candidates.len());
    for entity in candidates {
        match resolved.last_mut() {
            Some(previous) if entity.start < previous.end => {
                if entity.confidence > previous.confidence {
                    tracing::warn!(
                        kept = %entity.text,
                        dropped = %previous.text,
                        "overlapping entity replaced by higher-confidence span"
                    );
                    *previous = entity;
                } else {
                    tracing::warn!(
                        kept = %previous.text,
                        dropped = %entity.text,
                        "dropping overlapping entity"
                    );
                }
            }
            _ => resolved.push(entity),
        }
    }
    resolved
}

/// `true` if `name` passes the company-name filters.
///
/// Names must be longer than two characters, must not be a bare legal
/// suffix, and must not contain a news-outlet word.
#[must_use]
pub fn is_company_name(name: &str) -> bool {
    let cleaned = name.replace('#', "");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() <= 2 {
        return false;
    }
    let lowered = cleaned.to_lowercase();
    if LEGAL_SUFFIXES.contains(&lowered.as_str()) {
        return false;
    }
    !lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| NEWS_SOURCE_BLOCKLIST.contains(&word))
}

/// Distinct company names among `entities`, in first-seen order.
#[must_use]
pub fn company_names(entities: &[NormalizedEntity]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for entity in entities.iter().filter(|e| e.entity_type == "ORG") {
        let cleaned = clean_entity_text(&entity.text);
        if is_company_name(&cleaned) && !names.contains(&cleaned) {
            names.push(cleaned);
        }
    }
    names
}
