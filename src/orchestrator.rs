// SPDX-License-Identifier: Apache-2.0

//! The refinement loop: generate candidates, capture their traces, select
//! an adjudication target by consensus, adjudicate, and either accept or
//! regenerate with the rejection fed back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::capture::{
    capture_traces, Candidate, CandidateExecutor, CandidateTrace, CaptureOptions, ScenarioOutcome,
};
use crate::consensus::{self, Selection};
use crate::goldcheck_error::{GoldcheckError, Result};
use crate::harness::{render_harness, HarnessOptions, HarnessReport, RtlSimulator};
use crate::oracle::{
    call_with_deadline, AdjudicationOracle, Feedback, SynthesisOracle, SynthesisRequest, Verdict,
};
use crate::signal::ModuleInterface;
use crate::testbench::{
    check_shape, merge_testbench, CircuitKind, ScenarioSet, TestbenchRecord, TraceRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Generate,
    Capture,
    Select,
    Adjudicate,
    Accept,
    Regenerate,
}

#[derive(Debug, Clone)]
pub struct RefinementConfig {
    /// Upper bound on generate/adjudicate rounds.
    pub max_trials: usize,
    pub candidate_count: usize,
    /// Scenarios of the representative's testbench shown to the judge.
    pub sample_scenarios: usize,
    pub sample_seed: u64,
    pub oracle_timeout: Duration,
    pub capture_timeout: Duration,
    pub overall_timeout: Option<Duration>,
    pub workers: usize,
    pub circuit_kind: CircuitKind,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        RefinementConfig {
            max_trials: 5,
            candidate_count: 5,
            sample_scenarios: 1,
            sample_seed: 0,
            oracle_timeout: Duration::from_secs(120),
            capture_timeout: Duration::from_secs(120),
            overall_timeout: None,
            workers: num_cpus::get(),
            circuit_kind: CircuitKind::Sequential,
        }
    }
}

/// What happened in one trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialRecord {
    /// 1-based.
    pub trial: usize,
    pub selection: Option<Selection>,
    pub verdict: Option<Verdict>,
    /// Set when the trial ended without a verdict.
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    /// The final pool, with the canonical candidate at index 0.
    pub candidates: Vec<Candidate>,
    pub canonical: Candidate,
    pub trace: CandidateTrace,
    /// Testbench built from the canonical trace.
    pub testbench: Vec<TestbenchRecord>,
    pub verified: bool,
    pub trials: usize,
    pub history: Vec<TrialRecord>,
    pub simulation: Option<HarnessReport>,
}

/// The pool and representative of the most recent trial that got through
/// selection.
struct Representative {
    candidates: Vec<Candidate>,
    trace: CandidateTrace,
    index: usize,
    testbench: Vec<TestbenchRecord>,
}

pub struct Refinement {
    spec: String,
    header: String,
    stimulus: ScenarioSet,
    synthesizer: Arc<dyn SynthesisOracle>,
    adjudicator: Arc<dyn AdjudicationOracle>,
    executor: Arc<dyn CandidateExecutor>,
    simulator: Option<Arc<dyn RtlSimulator>>,
    interface: Option<ModuleInterface>,
    config: RefinementConfig,
}

impl Refinement {
    pub fn new(
        spec: &str,
        header: &str,
        stimulus: ScenarioSet,
        synthesizer: Arc<dyn SynthesisOracle>,
        adjudicator: Arc<dyn AdjudicationOracle>,
        executor: Arc<dyn CandidateExecutor>,
    ) -> Self {
        let config = RefinementConfig {
            circuit_kind: stimulus.kind,
            ..RefinementConfig::default()
        };
        Refinement {
            spec: spec.to_string(),
            header: header.to_string(),
            stimulus,
            synthesizer,
            adjudicator,
            executor,
            simulator: None,
            interface: None,
            config,
        }
    }

    pub fn with_config(mut self, config: RefinementConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the accepted candidate against RTL after adjudication.
    pub fn with_simulator(mut self, simulator: Arc<dyn RtlSimulator>) -> Self {
        self.simulator = Some(simulator);
        self
    }

    /// Interface used for the harness; parsed from the header otherwise.
    pub fn with_interface(mut self, interface: ModuleInterface) -> Self {
        self.interface = Some(interface);
        self
    }

    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    fn enter(&self, trial: usize, phase: Phase) {
        log::info!("refine; trial {} phase {:?}", trial, phase);
    }

    fn time_left(&self, deadline: Option<Instant>) -> Option<Duration> {
        deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    fn generate(&self, feedback: &Option<Feedback>) -> Result<Vec<Candidate>> {
        let request = SynthesisRequest {
            spec: self.spec.clone(),
            header: self.header.clone(),
            kind: self.config.circuit_kind,
            count: self.config.candidate_count,
            feedback: feedback.clone(),
        };
        let synthesizer = Arc::clone(&self.synthesizer);
        let candidates = call_with_deadline("synthesis", self.config.oracle_timeout, move || {
            synthesizer.synthesize(&request)
        })?;
        Ok(candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| Candidate::new(i, &c.body))
            .collect())
    }

    fn adjudicate(&self, candidate: &Candidate, sample: Vec<TestbenchRecord>) -> Result<Verdict> {
        let adjudicator = Arc::clone(&self.adjudicator);
        let candidate = candidate.clone();
        call_with_deadline("adjudication", self.config.oracle_timeout, move || {
            adjudicator.adjudicate(&candidate, &sample)
        })
    }

    /// Builds a testbench from the scenarios the trace completed with the
    /// stimulus's shape; the rest are left unchecked.
    fn testbench_for(&self, trace: &CandidateTrace) -> Result<Vec<TestbenchRecord>> {
        let records: Vec<TraceRecord> = self
            .stimulus
            .scenarios
            .iter()
            .zip(trace.outcomes.iter())
            .filter_map(|(record, outcome)| match outcome {
                ScenarioOutcome::Completed(steps)
                    if check_shape(&record.scenario, &record.inputs, steps).is_ok() =>
                {
                    Some(TraceRecord {
                        scenario: record.scenario.clone(),
                        outputs: steps.clone(),
                    })
                }
                _ => None,
            })
            .collect();
        merge_testbench(&self.stimulus, &records)
    }

    fn simulate(&self, testbench: &[TestbenchRecord]) -> Result<Option<HarnessReport>> {
        let simulator = match &self.simulator {
            Some(s) => s,
            None => return Ok(None),
        };
        let iface = match &self.interface {
            Some(iface) => iface.clone(),
            None => ModuleInterface::parse_header(&self.header)?,
        };
        let options = HarnessOptions {
            dialect: simulator.dialect(),
            top_module: None,
        };
        let harness = render_harness(&iface, testbench, &options)?;
        let report = simulator.simulate(&iface.name, &harness)?;
        log::info!(
            "refine; simulation reported {:?} unpass over {} scenarios",
            report.total_unpass,
            report.scenarios.len()
        );
        Ok(Some(report))
    }

    fn finish(
        &self,
        rep: Representative,
        adjudicated: bool,
        trials: usize,
        history: Vec<TrialRecord>,
    ) -> Result<RefinementOutcome> {
        let Representative {
            mut candidates,
            mut trace,
            index,
            testbench,
        } = rep;
        if let Some(pos) = candidates.iter().position(|c| c.index == index) {
            let promoted = candidates.remove(pos);
            candidates.insert(0, promoted);
        }
        for (i, c) in candidates.iter_mut().enumerate() {
            c.index = i;
        }
        trace.candidate = 0;
        let simulation = if adjudicated {
            self.simulate(&testbench)?
        } else {
            None
        };
        let verified = adjudicated && simulation.as_ref().map_or(true, |r| r.passed());
        let canonical = candidates
            .first()
            .cloned()
            .ok_or(GoldcheckError::NoCandidates)?;
        log::info!(
            "refine; finished after {} trials, verified: {}",
            trials,
            verified
        );
        Ok(RefinementOutcome {
            candidates,
            canonical,
            trace,
            testbench,
            verified,
            trials,
            history,
            simulation,
        })
    }

    /// Runs the loop to acceptance or until the trial budget is spent.
    ///
    /// Oracle timeouts and unavailability consume a trial. If the budget runs
    /// out, the last representative is returned unverified; if no trial ever
    /// produced candidates, the run fails with `NoCandidates`.
    pub fn run(&self) -> Result<RefinementOutcome> {
        let deadline = self.config.overall_timeout.map(|d| Instant::now() + d);
        let mut rng = StdRng::seed_from_u64(self.config.sample_seed);
        let mut feedback: Option<Feedback> = None;
        let mut last: Option<Representative> = None;
        let mut history = Vec::new();
        let mut trials = 0;

        for trial in 1..=self.config.max_trials {
            if self.time_left(deadline) == Some(Duration::ZERO) {
                log::warn!("refine; overall deadline expired before trial {}", trial);
                break;
            }
            trials = trial;
            let mut record = TrialRecord {
                trial,
                selection: None,
                verdict: None,
                failure: None,
            };

            self.enter(
                trial,
                if feedback.is_some() {
                    Phase::Regenerate
                } else {
                    Phase::Generate
                },
            );
            let candidates = match self.generate(&feedback) {
                Ok(c) if c.is_empty() => {
                    record.failure = Some("synthesis returned no candidates".to_string());
                    history.push(record);
                    continue;
                }
                Ok(c) => c,
                Err(e) if e.is_retryable() => {
                    log::warn!("refine; trial {} synthesis failed: {}", trial, e);
                    record.failure = Some(e.to_string());
                    history.push(record);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.enter(trial, Phase::Capture);
            let capture_deadline = match self.time_left(deadline) {
                Some(left) => std::cmp::min(left, self.config.capture_timeout),
                None => self.config.capture_timeout,
            };
            let captured = capture_traces(
                Arc::clone(&self.executor),
                &candidates,
                &self.stimulus,
                &CaptureOptions {
                    workers: self.config.workers,
                    deadline: Some(capture_deadline),
                },
            )?;

            self.enter(trial, Phase::Select);
            let report = consensus::select(&self.stimulus, &captured.traces)?;
            let index = report.selection.representative();
            record.selection = Some(report.selection.clone());
            let trace = captured
                .traces
                .iter()
                .find(|t| t.candidate == index)
                .cloned()
                .ok_or(GoldcheckError::NoCandidates)?;
            let testbench = self.testbench_for(&trace)?;
            let representative = candidates
                .iter()
                .find(|c| c.index == index)
                .cloned()
                .ok_or(GoldcheckError::NoCandidates)?;
            let sample = sample_testbench(&testbench, self.config.sample_scenarios, &mut rng);
            last = Some(Representative {
                candidates,
                trace,
                index,
                testbench,
            });

            self.enter(trial, Phase::Adjudicate);
            let verdict = match self.adjudicate(&representative, sample) {
                Ok(v) => v,
                Err(e) if e.is_retryable() => {
                    log::warn!("refine; trial {} adjudication failed: {}", trial, e);
                    record.failure = Some(e.to_string());
                    history.push(record);
                    continue;
                }
                Err(e) => return Err(e),
            };
            record.verdict = Some(verdict.clone());
            history.push(record);

            if verdict.matches {
                self.enter(trial, Phase::Accept);
                let rep = last.take().ok_or(GoldcheckError::NoCandidates)?;
                return self.finish(rep, true, trials, history);
            }
            log::info!(
                "refine; trial {} rejected candidate {}: {}",
                trial,
                index,
                verdict.reason
            );
            feedback = Some(Feedback {
                rejected_body: representative.body,
                reason: verdict.reason,
                suggestion: verdict.suggestion,
            });
        }

        match last {
            Some(rep) => {
                log::warn!("refine; no accepted candidate after {} trials", trials);
                self.finish(rep, false, trials, history)
            }
            None => Err(GoldcheckError::NoCandidates),
        }
    }
}

/// Picks up to `count` records, preferring those with expected outputs,
/// keeping their original order.
fn sample_testbench(
    testbench: &[TestbenchRecord],
    count: usize,
    rng: &mut StdRng,
) -> Vec<TestbenchRecord> {
    let with_outputs: Vec<&TestbenchRecord> =
        testbench.iter().filter(|r| !r.outputs.is_empty()).collect();
    let pool: Vec<&TestbenchRecord> = if with_outputs.is_empty() {
        testbench.iter().collect()
    } else {
        with_outputs
    };
    let amount = std::cmp::min(count, pool.len());
    let mut picked = rand::seq::index::sample(rng, pool.len(), amount).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| pool[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::capture::{CycleModel, ModelExecutor};
    use crate::harness::HarnessDialect;
    use crate::testbench::{StepMap, Steps, StimulusRecord};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    struct Gate {
        invert: bool,
    }

    impl CycleModel for Gate {
        fn load(&mut self, _clk: bool, inputs: &StepMap) -> std::result::Result<StepMap, String> {
            let a = inputs.get("a").ok_or("missing a")?;
            let y = a
                .chars()
                .map(|c| match (c, self.invert) {
                    ('1', true) | ('0', false) => '0',
                    _ => '1',
                })
                .collect();
            Ok(btreemap! {"y".to_string() => y})
        }
    }

    fn executor() -> Arc<dyn CandidateExecutor> {
        Arc::new(ModelExecutor::new(|c: &Candidate| match c.body.as_str() {
            "inv" => Ok(Box::new(Gate { invert: true }) as Box<dyn CycleModel>),
            "buf" => Ok(Box::new(Gate { invert: false }) as Box<dyn CycleModel>),
            other => Err(format!("cannot build {}", other)),
        }))
    }

    fn stimulus() -> ScenarioSet {
        ScenarioSet::new(
            CircuitKind::Combinational,
            vec![
                StimulusRecord {
                    scenario: "low".into(),
                    inputs: Steps::Combinational(vec![btreemap! {"a".to_string() => "0".to_string()}]),
                },
                StimulusRecord {
                    scenario: "high".into(),
                    inputs: Steps::Combinational(vec![btreemap! {"a".to_string() => "1".to_string()}]),
                },
            ],
        )
        .unwrap()
    }

    enum Reply {
        Pool(Vec<&'static str>),
        Stall(Duration),
        Fail,
    }

    struct Synth {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<SynthesisRequest>>,
    }

    impl Synth {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Synth {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(vec![]),
            })
        }
    }

    impl SynthesisOracle for Synth {
        fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<Candidate>> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Pool(bodies)) => Ok(bodies
                    .iter()
                    .enumerate()
                    .map(|(i, b)| Candidate::new(i, b))
                    .collect()),
                Some(Reply::Stall(d)) => {
                    std::thread::sleep(d);
                    Ok(vec![])
                }
                Some(Reply::Fail) | None => Err(GoldcheckError::OracleUnavailable {
                    oracle: "synthesis".into(),
                    reason: "no more replies".into(),
                }),
            }
        }
    }

    struct Judge {
        verdicts: Mutex<VecDeque<Verdict>>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl Judge {
        fn new(verdicts: Vec<Verdict>) -> Arc<Self> {
            Arc::new(Judge {
                verdicts: Mutex::new(verdicts.into()),
                seen: Mutex::new(vec![]),
            })
        }
    }

    impl AdjudicationOracle for Judge {
        fn adjudicate(&self, candidate: &Candidate, sample: &[TestbenchRecord]) -> Result<Verdict> {
            self.seen
                .lock()
                .unwrap()
                .push((candidate.body.clone(), sample.len()));
            Ok(self
                .verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Verdict::reject("out of verdicts", "")))
        }
    }

    fn refinement(synth: Arc<Synth>, judge: Arc<Judge>) -> Refinement {
        Refinement::new(
            "invert a",
            "module top_module(input a, output y);",
            stimulus(),
            synth,
            judge,
            executor(),
        )
        .with_config(RefinementConfig {
            max_trials: 3,
            candidate_count: 4,
            oracle_timeout: Duration::from_secs(5),
            circuit_kind: CircuitKind::Combinational,
            ..RefinementConfig::default()
        })
    }

    #[test]
    fn test_unanimous_pool_accepted_first_trial() {
        let _ = env_logger::builder().is_test(true).try_init();
        let synth = Synth::new(vec![Reply::Pool(vec!["inv", "inv", "inv"])]);
        let judge = Judge::new(vec![Verdict::accept()]);
        let outcome = refinement(synth, judge.clone()).run().unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.trials, 1);
        assert_eq!(outcome.canonical, Candidate::new(0, "inv"));
        assert_eq!(outcome.history[0].selection, Some(Selection::Unanimous(0)));
        assert_eq!(outcome.testbench.len(), 2);
        assert_eq!(*judge.seen.lock().unwrap(), vec![("inv".to_string(), 1)]);
        assert!(outcome.simulation.is_none());
    }

    #[test]
    fn test_rejection_feeds_regeneration() {
        let synth = Synth::new(vec![
            Reply::Pool(vec!["inv", "inv", "buf", "inv"]),
            Reply::Pool(vec!["inv", "inv", "inv", "inv"]),
        ]);
        let judge = Judge::new(vec![
            Verdict::reject("y follows a", "invert the input"),
            Verdict::accept(),
        ]);
        let outcome = refinement(synth.clone(), judge.clone()).run().unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.trials, 2);
        assert_eq!(outcome.history[0].selection, Some(Selection::Majority(2)));

        let requests = synth.requests.lock().unwrap();
        assert_eq!(requests[0].feedback, None);
        assert_eq!(
            requests[1].feedback,
            Some(Feedback {
                rejected_body: "buf".into(),
                reason: "y follows a".into(),
                suggestion: "invert the input".into(),
            })
        );
        assert_eq!(requests[1].count, 4);
    }

    #[test]
    fn test_accepted_representative_promoted_to_front() {
        let synth = Synth::new(vec![Reply::Pool(vec!["buf", "buf", "inv", "buf"])]);
        let judge = Judge::new(vec![Verdict::accept()]);
        let outcome = refinement(synth, judge).run().unwrap();
        let bodies: Vec<&str> = outcome.candidates.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["inv", "buf", "buf", "buf"]);
        assert_eq!(outcome.canonical, Candidate::new(0, "inv"));
        assert_eq!(outcome.trace.candidate, 0);
        assert_eq!(
            outcome.testbench[0].outputs,
            Steps::Combinational(vec![btreemap! {"y".to_string() => "1".to_string()}])
        );
    }

    #[test]
    fn test_budget_exhaustion_is_unverified() {
        let synth = Synth::new(vec![
            Reply::Pool(vec!["buf", "buf"]),
            Reply::Pool(vec!["buf", "buf"]),
            Reply::Pool(vec!["buf", "buf"]),
        ]);
        let judge = Judge::new(vec![]);
        let outcome = refinement(synth, judge).run().unwrap();
        assert!(!outcome.verified);
        assert_eq!(outcome.trials, 3);
        assert_eq!(outcome.history.len(), 3);
        assert!(outcome
            .history
            .iter()
            .all(|t| t.verdict.as_ref().map_or(false, |v| !v.matches)));
        assert_eq!(outcome.canonical.body, "buf");
    }

    #[test]
    fn test_oracle_timeout_consumes_trial() {
        let synth = Synth::new(vec![
            Reply::Stall(Duration::from_millis(500)),
            Reply::Pool(vec!["inv", "inv"]),
        ]);
        let judge = Judge::new(vec![Verdict::accept()]);
        let outcome = refinement(synth, judge)
            .with_config(RefinementConfig {
                max_trials: 3,
                oracle_timeout: Duration::from_millis(50),
                circuit_kind: CircuitKind::Combinational,
                ..RefinementConfig::default()
            })
            .run()
            .unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.trials, 2);
        assert!(outcome.history[0].failure.is_some());
        assert_eq!(outcome.history[0].selection, None);
    }

    #[test]
    fn test_no_candidates_ever_is_an_error() {
        let synth = Synth::new(vec![Reply::Fail, Reply::Fail, Reply::Fail]);
        let judge = Judge::new(vec![]);
        assert!(matches!(
            refinement(synth, judge).run(),
            Err(GoldcheckError::NoCandidates)
        ));
    }

    struct FixedSimulator {
        log: &'static str,
        harnesses: Mutex<Vec<String>>,
    }

    impl RtlSimulator for FixedSimulator {
        fn dialect(&self) -> HarnessDialect {
            HarnessDialect::SystemVerilog
        }

        fn simulate(&self, top: &str, harness: &str) -> Result<HarnessReport> {
            assert_eq!(top, "top_module");
            self.harnesses.lock().unwrap().push(harness.to_string());
            Ok(crate::harness::parse_harness_log(self.log))
        }
    }

    #[test]
    fn test_simulation_gates_verification() {
        for (text, expect_verified) in [
            ("Test passed for scenario low\nTest passed for scenario high\nUnpass: 0\n", true),
            ("Test passed for scenario low\nTest failed, unpass = 1 for scenario high\nUnpass: 1\n", false),
        ] {
            let simulator = Arc::new(FixedSimulator {
                log: text,
                harnesses: Mutex::new(vec![]),
            });
            let synth = Synth::new(vec![Reply::Pool(vec!["inv", "inv"])]);
            let judge = Judge::new(vec![Verdict::accept()]);
            let outcome = refinement(synth, judge)
                .with_simulator(simulator.clone())
                .run()
                .unwrap();
            assert_eq!(outcome.verified, expect_verified);
            assert!(outcome.simulation.is_some());
            let harnesses = simulator.harnesses.lock().unwrap();
            assert_eq!(harnesses.len(), 1);
            assert!(harnesses[0].contains("module tb;"));
        }
    }

    #[test]
    fn test_sample_is_seeded() {
        let testbench: Vec<TestbenchRecord> = (0..6)
            .map(|i| TestbenchRecord {
                scenario: format!("s{}", i),
                inputs: Steps::Combinational(vec![]),
                outputs: Steps::Combinational(vec![btreemap! {"y".to_string() => "1".to_string()}]),
            })
            .collect();
        let a = sample_testbench(&testbench, 3, &mut StdRng::seed_from_u64(7));
        let b = sample_testbench(&testbench, 3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(sample_testbench(&testbench, 10, &mut StdRng::seed_from_u64(7)).len(), 6);
    }
}
