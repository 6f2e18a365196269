// SPDX-License-Identifier: Apache-2.0

//! Executes candidate models against the shared stimulus and collects one
//! trace per candidate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::goldcheck_error::{GoldcheckError, Result};
use crate::testbench::{ScenarioSet, Segment, StepMap, Steps, TraceRecord};

/// One synthesized reference model. `index` is stable for a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub index: usize,
    pub body: String,
}

impl Candidate {
    pub fn new(index: usize, body: &str) -> Self {
        Candidate {
            index,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Completed(Steps),
    Failed(String),
}

impl ScenarioOutcome {
    pub fn steps(&self) -> Option<&Steps> {
        match self {
            ScenarioOutcome::Completed(steps) => Some(steps),
            ScenarioOutcome::Failed(_) => None,
        }
    }
}

/// A candidate's outcome on every scenario, in scenario order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTrace {
    pub candidate: usize,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl CandidateTrace {
    /// A trace in which every scenario failed for `reason`.
    pub fn failed(candidate: usize, scenario_count: usize, reason: &str) -> Self {
        CandidateTrace {
            candidate,
            outcomes: vec![ScenarioOutcome::Failed(reason.to_string()); scenario_count],
        }
    }

    pub fn completed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ScenarioOutcome::Completed(_)))
            .count()
    }

    /// Names the outcomes by scenario; fails if any scenario did not
    /// complete.
    pub fn to_trace_records(&self, scenarios: &ScenarioSet) -> Result<Vec<TraceRecord>> {
        if self.outcomes.len() != scenarios.len() {
            return Err(GoldcheckError::CandidateFailed {
                candidate: self.candidate,
                reason: format!(
                    "{} outcomes for {} scenarios",
                    self.outcomes.len(),
                    scenarios.len()
                ),
            });
        }
        scenarios
            .names()
            .zip(self.outcomes.iter())
            .map(|(name, outcome)| match outcome {
                ScenarioOutcome::Completed(steps) => Ok(TraceRecord {
                    scenario: name.to_string(),
                    outputs: steps.clone(),
                }),
                ScenarioOutcome::Failed(reason) => Err(GoldcheckError::CandidateFailed {
                    candidate: self.candidate,
                    reason: format!("scenario `{}`: {}", name, reason),
                }),
            })
            .collect()
    }
}

/// Runs one candidate over a scenario set.
///
/// Implementations report per-scenario failures as
/// `ScenarioOutcome::Failed`; an `Err` means the candidate could not be run
/// at all and marks every scenario failed.
pub trait CandidateExecutor: Send + Sync {
    fn execute(&self, candidate: &Candidate, scenarios: &ScenarioSet)
        -> Result<Vec<ScenarioOutcome>>;
}

/// An in-process model evaluated one step at a time.
pub trait CycleModel {
    /// Applies `inputs` with the clock at level `clk` and returns the
    /// outputs observed after evaluation.
    fn load(&mut self, clk: bool, inputs: &StepMap) -> std::result::Result<StepMap, String>;
}

type ModelFactory =
    dyn Fn(&Candidate) -> std::result::Result<Box<dyn CycleModel>, String> + Send + Sync;

/// Executes candidates as in-process [`CycleModel`]s.
///
/// Sequential scenarios get a fresh model per segment. Each cycle loads the
/// inputs with the clock high and records the outputs, then loads all-zero
/// inputs with the clock low. Combinational scenarios get a fresh model per
/// scenario and one clock-low load per step.
pub struct ModelExecutor {
    factory: Box<ModelFactory>,
}

impl ModelExecutor {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&Candidate) -> std::result::Result<Box<dyn CycleModel>, String>
            + Send
            + Sync
            + 'static,
    {
        ModelExecutor {
            factory: Box::new(factory),
        }
    }

    fn run_segment(&self, candidate: &Candidate, segment: &Segment) -> std::result::Result<Segment, String> {
        let mut model = (self.factory)(candidate)?;
        let mut recorded: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for cycle in 0..segment.cycles {
            let mut inputs = StepMap::new();
            let mut zeros = StepMap::new();
            for (name, values) in &segment.signals {
                let value = values
                    .get(cycle)
                    .ok_or_else(|| format!("input `{}` has no value at cycle {}", name, cycle))?;
                zeros.insert(name.clone(), "0".repeat(value.len()));
                inputs.insert(name.clone(), value.clone());
            }
            let outputs = model.load(true, &inputs)?;
            if cycle > 0 && outputs.len() != recorded.len() {
                return Err(format!("output set changed at cycle {}", cycle));
            }
            for (name, value) in outputs {
                let column = recorded.entry(name.clone()).or_default();
                if column.len() != cycle {
                    return Err(format!("output `{}` missing before cycle {}", name, cycle));
                }
                column.push(value);
            }
            model.load(false, &zeros)?;
        }
        Ok(Segment {
            cycles: segment.cycles,
            signals: recorded,
        })
    }

    fn run_scenario(&self, candidate: &Candidate, inputs: &Steps) -> std::result::Result<Steps, String> {
        match inputs {
            Steps::Sequential(segments) => segments
                .iter()
                .map(|segment| self.run_segment(candidate, segment))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Steps::Sequential),
            Steps::Combinational(steps) => {
                let mut model = (self.factory)(candidate)?;
                steps
                    .iter()
                    .map(|step| model.load(false, step))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Steps::Combinational)
            }
        }
    }
}

impl CandidateExecutor for ModelExecutor {
    fn execute(
        &self,
        candidate: &Candidate,
        scenarios: &ScenarioSet,
    ) -> Result<Vec<ScenarioOutcome>> {
        Ok(scenarios
            .scenarios
            .iter()
            .map(|record| match self.run_scenario(candidate, &record.inputs) {
                Ok(steps) => ScenarioOutcome::Completed(steps),
                Err(reason) => {
                    log::debug!(
                        "candidate {} failed scenario `{}`: {}",
                        candidate.index,
                        record.scenario,
                        reason
                    );
                    ScenarioOutcome::Failed(reason)
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Maximum number of candidates executing at once.
    pub workers: usize,
    /// Wall-clock budget for the whole capture; candidates still running
    /// when it expires are abandoned.
    pub deadline: Option<Duration>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptions {
            workers: num_cpus::get(),
            deadline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// One trace per candidate, in candidate order.
    pub traces: Vec<CandidateTrace>,
    /// Candidates that did not finish before the deadline.
    pub abandoned: Vec<usize>,
}

/// Executes every candidate against `scenarios` on a bounded pool of worker
/// threads and waits for all of them (or the deadline) before returning.
///
/// The stimulus is padded once before dispatch so every executor observes
/// the same cycle-complete scenarios.
pub fn capture_traces(
    executor: Arc<dyn CandidateExecutor>,
    candidates: &[Candidate],
    scenarios: &ScenarioSet,
    options: &CaptureOptions,
) -> Result<CaptureResult> {
    let mut padded = scenarios.clone();
    padded.pad_segments()?;
    let scenario_count = padded.len();
    let n = candidates.len();
    if n == 0 {
        return Ok(CaptureResult {
            traces: vec![],
            abandoned: vec![],
        });
    }

    let candidates = Arc::new(candidates.to_vec());
    let padded = Arc::new(padded);
    let next = Arc::new(AtomicUsize::new(0));
    let cancelled = Arc::new(AtomicBool::new(false));
    let thread_cnt = std::cmp::max(1, std::cmp::min(n, options.workers));
    let (tx, rx) = mpsc::channel::<(usize, Result<Vec<ScenarioOutcome>>)>();
    log::info!(
        "capture_traces; {} candidates x {} scenarios on {} workers",
        n,
        scenario_count,
        thread_cnt
    );

    for _ in 0..thread_cnt {
        let executor = Arc::clone(&executor);
        let candidates = Arc::clone(&candidates);
        let padded = Arc::clone(&padded);
        let next = Arc::clone(&next);
        let cancelled = Arc::clone(&cancelled);
        let tx = tx.clone();
        std::thread::spawn(move || loop {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            let i = next.fetch_add(1, Ordering::SeqCst);
            if i >= candidates.len() {
                break;
            }
            let outcome = executor.execute(&candidates[i], &padded);
            if tx.send((i, outcome)).is_err() {
                break;
            }
        });
    }
    drop(tx);

    let started = Instant::now();
    let mut slots: Vec<Option<Vec<ScenarioOutcome>>> = vec![None; n];
    let mut received = 0;
    while received < n {
        let message = match options.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(started.elapsed());
                match rx.recv_timeout(remaining) {
                    Ok(message) => message,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        log::warn!("capture_traces; deadline {:?} expired", deadline);
                        break;
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };
        let (i, outcome) = message;
        let index = candidates[i].index;
        let outcomes = match outcome {
            Ok(outcomes) if outcomes.len() == scenario_count => outcomes,
            Ok(outcomes) => vec![
                ScenarioOutcome::Failed(format!(
                    "executor returned {} outcomes for {} scenarios",
                    outcomes.len(),
                    scenario_count
                ));
                scenario_count
            ],
            Err(e) => vec![ScenarioOutcome::Failed(e.to_string()); scenario_count],
        };
        log::debug!(
            "capture_traces; candidate {} finished, {}/{} scenarios completed",
            index,
            outcomes
                .iter()
                .filter(|o| matches!(o, ScenarioOutcome::Completed(_)))
                .count(),
            scenario_count
        );
        slots[i] = Some(outcomes);
        received += 1;
    }
    cancelled.store(true, Ordering::SeqCst);

    let mut abandoned = Vec::new();
    let traces = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            let index = candidates[i].index;
            match slot {
                Some(outcomes) => CandidateTrace {
                    candidate: index,
                    outcomes,
                },
                None => {
                    abandoned.push(index);
                    CandidateTrace::failed(index, scenario_count, "abandoned before completion")
                }
            }
        })
        .collect();
    if !abandoned.is_empty() {
        log::warn!("capture_traces; abandoned candidates {:?}", abandoned);
    }
    Ok(CaptureResult { traces, abandoned })
}
