// SPDX-License-Identifier: Apache-2.0

//! Deterministic stand-ins for the external oracles and for candidate
//! models.

use std::collections::VecDeque;
use std::sync::Mutex;

use goldcheck::capture::{Candidate, CycleModel};
use goldcheck::goldcheck_error::{GoldcheckError, Result};
use goldcheck::oracle::{AdjudicationOracle, SynthesisOracle, SynthesisRequest, Verdict};
use goldcheck::testbench::{StepMap, TestbenchRecord};

/// Hands out pre-baked candidate pools, one per call, in order. Once the
/// script runs out every call fails as unavailable.
pub struct ScriptedSynthesisOracle {
    pools: Mutex<VecDeque<Vec<String>>>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedSynthesisOracle {
    pub fn new(pools: &[&[&str]]) -> Self {
        ScriptedSynthesisOracle {
            pools: Mutex::new(
                pools
                    .iter()
                    .map(|pool| pool.iter().map(|b| b.to_string()).collect())
                    .collect(),
            ),
            requests: Mutex::new(vec![]),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl SynthesisOracle for ScriptedSynthesisOracle {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<Candidate>> {
        self.requests.lock().unwrap().push(request.clone());
        let pool = self.pools.lock().unwrap().pop_front();
        match pool {
            Some(bodies) => Ok(bodies
                .iter()
                .enumerate()
                .map(|(i, body)| Candidate::new(i, body))
                .collect()),
            None => Err(GoldcheckError::OracleUnavailable {
                oracle: "synthesis".to_string(),
                reason: "script exhausted".to_string(),
            }),
        }
    }
}

/// Returns pre-baked verdicts in order and records what it was shown.
/// Rejects once the script runs out.
pub struct ScriptedAdjudicator {
    verdicts: Mutex<VecDeque<Verdict>>,
    calls: Mutex<Vec<(Candidate, Vec<TestbenchRecord>)>>,
}

impl ScriptedAdjudicator {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        ScriptedAdjudicator {
            verdicts: Mutex::new(verdicts.into()),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<(Candidate, Vec<TestbenchRecord>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl AdjudicationOracle for ScriptedAdjudicator {
    fn adjudicate(&self, candidate: &Candidate, sample: &[TestbenchRecord]) -> Result<Verdict> {
        self.calls
            .lock()
            .unwrap()
            .push((candidate.clone(), sample.to_vec()));
        let verdict = self.verdicts.lock().unwrap().pop_front();
        Ok(verdict.unwrap_or_else(|| Verdict::reject("no scripted verdict", "")))
    }
}

type StepFn = dyn FnMut(bool, &StepMap) -> std::result::Result<StepMap, String> + Send;

/// A [`CycleModel`] whose behavior is a closure over `(clk, inputs)`.
pub struct TableModel {
    step: Box<StepFn>,
}

impl TableModel {
    pub fn new<F>(step: F) -> Self
    where
        F: FnMut(bool, &StepMap) -> std::result::Result<StepMap, String> + Send + 'static,
    {
        TableModel {
            step: Box::new(step),
        }
    }

    /// A combinational model computing `output` from `input` with `f`.
    pub fn combinational<F>(input: &str, output: &str, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        let input = input.to_string();
        let output = output.to_string();
        TableModel::new(move |_clk, inputs| {
            let value = inputs
                .get(&input)
                .ok_or_else(|| format!("missing input `{}`", input))?;
            let mut outputs = StepMap::new();
            outputs.insert(output.clone(), f(value));
            Ok(outputs)
        })
    }
}

impl CycleModel for TableModel {
    fn load(&mut self, clk: bool, inputs: &StepMap) -> std::result::Result<StepMap, String> {
        (self.step)(clk, inputs)
    }
}
