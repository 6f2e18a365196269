// SPDX-License-Identifier: Apache-2.0

//! Capability interfaces for the external synthesis and adjudication
//! services. The refinement loop only ever sees these traits.

use std::sync::mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::Candidate;
use crate::goldcheck_error::{GoldcheckError, Result};
use crate::testbench::{CircuitKind, TestbenchRecord};

/// Why the previous representative was rejected, fed into regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rejected_body: String,
    pub reason: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub spec: String,
    pub header: String,
    pub kind: CircuitKind,
    pub count: usize,
    /// `None` on the first trial.
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub matches: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub suggestion: String,
}

impl Verdict {
    pub fn accept() -> Self {
        Verdict {
            matches: true,
            reason: String::new(),
            suggestion: String::new(),
        }
    }

    pub fn reject(reason: &str, suggestion: &str) -> Self {
        Verdict {
            matches: false,
            reason: reason.to_string(),
            suggestion: suggestion.to_string(),
        }
    }
}

pub trait SynthesisOracle: Send + Sync {
    /// Produces `request.count` candidates. Indices in the result are
    /// reassigned by the caller.
    fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<Candidate>>;
}

pub trait AdjudicationOracle: Send + Sync {
    /// Judges whether `candidate`'s behavior on `sample` matches the
    /// circuit description.
    fn adjudicate(&self, candidate: &Candidate, sample: &[TestbenchRecord]) -> Result<Verdict>;
}

/// Runs `f` on a helper thread and waits at most `timeout` for it.
///
/// On expiry the helper is left to finish on its own and its result is
/// dropped.
pub fn call_with_deadline<T, F>(oracle: &str, timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            log::warn!("{} oracle timed out after {:?}", oracle, timeout);
            Err(GoldcheckError::OracleTimeout {
                oracle: oracle.to_string(),
                after: timeout,
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(GoldcheckError::OracleUnavailable {
            oracle: oracle.to_string(),
            reason: "oracle thread exited without a result".to_string(),
        }),
    }
}
