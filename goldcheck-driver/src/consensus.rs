// SPDX-License-Identifier: Apache-2.0

use clap::ArgMatches;
use goldcheck::capture::{CandidateTrace, ScenarioOutcome};
use goldcheck::consensus;
use goldcheck::testbench::ScenarioSet;

use crate::common::{get_kind, load_stimulus, read_file_or_exit, read_trace};
use crate::report_cli_error::report_goldcheck_error_and_exit;

const SUBCOMMAND: &str = "consensus";

/// Turns one candidate's output file into a trace; an unreadable file fails
/// every scenario.
fn trace_from_file(index: usize, path: &str, stimulus: &ScenarioSet) -> CandidateTrace {
    let text = read_file_or_exit(path, SUBCOMMAND);
    let records = match read_trace(stimulus, &text) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("candidate {} ({}): {}", index, path, e);
            return CandidateTrace::failed(index, stimulus.len(), &e.to_string());
        }
    };
    let outcomes = stimulus
        .scenarios
        .iter()
        .map(|s| match records.iter().find(|r| r.scenario == s.scenario) {
            Some(r) => ScenarioOutcome::Completed(r.outputs.clone()),
            None => ScenarioOutcome::Failed(format!("no output for scenario `{}`", s.scenario)),
        })
        .collect();
    CandidateTrace {
        candidate: index,
        outcomes,
    }
}

pub fn handle_consensus(matches: &ArgMatches) {
    let stimulus_path = matches.get_one::<String>("STIMULUS_JSON").unwrap();
    let stimulus = load_stimulus(stimulus_path, get_kind(matches), SUBCOMMAND);
    let traces: Vec<CandidateTrace> = matches
        .get_many::<String>("OUTPUT_JSON")
        .unwrap()
        .enumerate()
        .map(|(i, path)| trace_from_file(i, path, &stimulus))
        .collect();
    let report = consensus::select(&stimulus, &traces)
        .and_then(|report| Ok(serde_json::to_string_pretty(&report)?));
    match report {
        Ok(json) => println!("{}", json),
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    }
}
