// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the goldcheck library.
///
/// Harness mismatches and consensus ties are data, not errors; they are
/// reported through `HarnessReport` and `Selection` respectively.
#[derive(Debug, Error)]
pub enum GoldcheckError {
    #[error("malformed value for signal `{signal}`: {value:?} ({reason})")]
    MalformedSignal {
        signal: String,
        value: String,
        reason: String,
    },

    #[error("shape mismatch in scenario `{scenario}`: {detail}")]
    ShapeMismatch { scenario: String, detail: String },

    #[error("scenario `{scenario}` references unknown signal `{signal}`")]
    UnknownSignal { scenario: String, signal: String },

    #[error("malformed module header: {0}")]
    MalformedHeader(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("no candidates were produced")]
    NoCandidates,

    #[error("candidate {candidate} failed: {reason}")]
    CandidateFailed { candidate: usize, reason: String },

    #[error("{oracle} oracle did not respond within {after:?}")]
    OracleTimeout { oracle: String, after: Duration },

    #[error("{oracle} oracle unavailable: {reason}")]
    OracleUnavailable { oracle: String, reason: String },

    #[error("simulation error: {0}")]
    Simulation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GoldcheckError {
    pub fn malformed_signal(signal: &str, value: &str, reason: impl Into<String>) -> Self {
        GoldcheckError::MalformedSignal {
            signal: signal.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Oracle failures consume a trial but do not abort a refinement run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GoldcheckError::OracleTimeout { .. } | GoldcheckError::OracleUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GoldcheckError>;
