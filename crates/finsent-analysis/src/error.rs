use thiserror::Error;

/// Failure of a model call or of the client that talks to it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model {model} returned status {status}: {message}")]
    Inference {
        model: String,
        status: u16,
        message: String,
    },

    #[error("model {model} returned {got} outputs for {expected} inputs")]
    CountMismatch {
        model: String,
        expected: usize,
        got: usize,
    },

    #[error("failed to decode response from {model}: {source}")]
    Deserialize {
        model: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model {model} returned no label for an input")]
    EmptyOutput { model: String },

    #[error("model {0} is not a {1} model")]
    WrongKind(String, finsent_core::ModelKind),
}

impl AnalysisError {
    /// `true` when some input in the call may be to blame, so retrying the
    /// articles one at a time can isolate it.
    ///
    /// Auth failures, rate limits, unavailable models and transport errors
    /// would fail every single-article retry the same way.
    #[must_use]
    pub fn is_input_specific(&self) -> bool {
        match self {
            AnalysisError::Inference { status, .. } => matches!(status, 400 | 413 | 422),
            AnalysisError::CountMismatch { .. }
            | AnalysisError::Deserialize { .. }
            | AnalysisError::EmptyOutput { .. } => true,
            AnalysisError::Http(_) | AnalysisError::WrongKind(..) => false,
        }
    }
}


/// Raw model output that cannot be mapped into the stored shape.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("unrecognized sentiment label '{0}'")]
    UnknownLabel(String),

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("confidence is not a finite number")]
    NonFiniteConfidence,
}
