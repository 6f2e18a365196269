// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of the refinement loop with scripted oracles and
//! in-process candidate models.

use std::sync::Arc;

use goldcheck::capture::{CycleModel, ModelExecutor};
use goldcheck::consensus::Selection;
use goldcheck::oracle::Verdict;
use goldcheck::orchestrator::{Refinement, RefinementConfig};
use goldcheck::testbench::{CircuitKind, ScenarioSet};
use goldcheck_test_helpers::{ScriptedAdjudicator, ScriptedSynthesisOracle, TableModel};
use pretty_assertions::assert_eq;

const HEADER: &str = "module inv(input x, output y);";

fn stimulus() -> ScenarioSet {
    ScenarioSet::from_json(
        CircuitKind::Combinational,
        r#"[
          {"scenario": "zero", "input variable": [{"x": "0"}]},
          {"scenario": "one", "input variable": [{"x": "1"}, {"x": "0"}]}
        ]"#,
    )
    .unwrap()
}

/// Candidate bodies name the gate they implement.
fn executor() -> ModelExecutor {
    ModelExecutor::new(|candidate| {
        let model: Box<dyn CycleModel> = match candidate.body.as_str() {
            "not" => Box::new(TableModel::combinational("x", "y", |v| {
                let out = if v == "1" { "0" } else { "1" };
                out.to_string()
            })),
            "buf" => Box::new(TableModel::combinational("x", "y", |v| v.to_string())),
            other => return Err(format!("unknown gate `{}`", other)),
        };
        Ok(model)
    })
}

fn config() -> RefinementConfig {
    RefinementConfig {
        max_trials: 3,
        candidate_count: 3,
        workers: 2,
        circuit_kind: CircuitKind::Combinational,
        ..RefinementConfig::default()
    }
}

#[test]
fn test_rejected_outlier_feeds_back_into_regeneration() {
    let _ = env_logger::builder().is_test(true).try_init();
    let synth = Arc::new(ScriptedSynthesisOracle::new(&[
        &["not", "not", "buf"],
        &["not", "not", "not"],
    ]));
    let judge = Arc::new(ScriptedAdjudicator::new(vec![
        Verdict::reject("y should invert x", "use ~x"),
        Verdict::accept(),
    ]));
    let refinement = Refinement::new(
        "An inverter.",
        HEADER,
        stimulus(),
        synth.clone(),
        judge.clone(),
        Arc::new(executor()),
    )
    .with_config(config());

    let outcome = refinement.run().unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.trials, 2);
    assert_eq!(outcome.canonical.body, "not");
    assert_eq!(outcome.canonical.index, 0);
    assert_eq!(outcome.history[0].selection, Some(Selection::Majority(2)));
    assert_eq!(outcome.history[1].selection, Some(Selection::Unanimous(0)));

    let requests = synth.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].feedback.is_none());
    let feedback = requests[1].feedback.as_ref().unwrap();
    assert_eq!(feedback.rejected_body, "buf");
    assert_eq!(feedback.reason, "y should invert x");
    assert_eq!(feedback.suggestion, "use ~x");

    let calls = judge.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0.body, "buf");
}

#[test]
fn test_testbench_carries_canonical_outputs() {
    let synth = Arc::new(ScriptedSynthesisOracle::new(&[&["not", "not", "not"]]));
    let judge = Arc::new(ScriptedAdjudicator::new(vec![Verdict::accept()]));
    let outcome = Refinement::new(
        "An inverter.",
        HEADER,
        stimulus(),
        synth,
        judge,
        Arc::new(executor()),
    )
    .with_config(config())
    .run()
    .unwrap();

    let json = serde_json::to_value(&outcome.testbench).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {
                "scenario": "zero",
                "input variable": [{"x": "0"}],
                "output variable": [{"y": "1"}]
            },
            {
                "scenario": "one",
                "input variable": [{"x": "1"}, {"x": "0"}],
                "output variable": [{"y": "0"}, {"y": "1"}]
            }
        ])
    );
}

#[test]
fn test_exhausted_budget_returns_unverified_representative() {
    let synth = Arc::new(ScriptedSynthesisOracle::new(&[
        &["buf", "buf", "buf"],
        &["buf", "buf", "buf"],
        &["buf", "buf", "buf"],
    ]));
    let judge = Arc::new(ScriptedAdjudicator::new(vec![]));
    let outcome = Refinement::new(
        "An inverter.",
        HEADER,
        stimulus(),
        synth,
        judge.clone(),
        Arc::new(executor()),
    )
    .with_config(config())
    .run()
    .unwrap();

    assert!(!outcome.verified);
    assert_eq!(outcome.trials, 3);
    assert_eq!(outcome.history.len(), 3);
    assert_eq!(judge.calls().len(), 3);
    assert!(outcome.simulation.is_none());
}

#[test]
fn test_failing_candidate_is_the_one_adjudicated() {
    let synth = Arc::new(ScriptedSynthesisOracle::new(&[&["not", "xor", "not"]]));
    let judge = Arc::new(ScriptedAdjudicator::new(vec![Verdict::accept()]));
    let outcome = Refinement::new(
        "An inverter.",
        HEADER,
        stimulus(),
        synth,
        judge,
        Arc::new(executor()),
    )
    .with_config(config())
    .run()
    .unwrap();

    assert!(outcome.verified);
    assert_eq!(outcome.canonical.body, "xor");
    assert_eq!(outcome.history[0].selection, Some(Selection::Majority(1)));
    assert!(outcome.testbench.iter().all(|r| r.outputs.is_empty()));
}
