// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use clap::ArgMatches;
use goldcheck::capture::{capture_traces, Candidate, CaptureOptions, ScenarioOutcome};
use goldcheck::consensus;
use goldcheck::signal::ModuleInterface;
use serde_json::json;

use crate::common::{get_kind, load_stimulus, read_file_or_exit};
use crate::process_executor::ProcessExecutor;
use crate::report_cli_error::{report_cli_error_and_exit, report_goldcheck_error_and_exit};
use crate::toolchain_config::{
    get_candidate_runner, get_candidate_suffix, get_clock_signal, ToolchainConfig,
};

const SUBCOMMAND: &str = "capture";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

fn outcome_json(outcome: &ScenarioOutcome) -> serde_json::Value {
    match outcome {
        ScenarioOutcome::Completed(steps) => json!({ "output variable": steps }),
        ScenarioOutcome::Failed(reason) => json!({ "error": reason }),
    }
}

pub fn handle_capture(matches: &ArgMatches, config: &Option<ToolchainConfig>) {
    let stimulus_path = matches.get_one::<String>("STIMULUS_JSON").unwrap();
    let mut stimulus = load_stimulus(stimulus_path, get_kind(matches), SUBCOMMAND);
    if let Some(header_path) = matches.get_one::<String>("header") {
        let clock = get_clock_signal(matches, config);
        let text = read_file_or_exit(header_path, SUBCOMMAND);
        let checked = ModuleInterface::parse_header(&text).and_then(|iface| {
            stimulus.pad_segments()?;
            stimulus.validate(&iface.with_clock(&clock))
        });
        if let Err(e) = checked {
            report_goldcheck_error_and_exit(&e, SUBCOMMAND);
        }
    }

    let candidates: Vec<Candidate> = matches
        .get_many::<String>("CANDIDATE")
        .unwrap()
        .enumerate()
        .map(|(i, path)| Candidate::new(i, &read_file_or_exit(path, SUBCOMMAND)))
        .collect();
    let timeout_secs = match matches.get_one::<String>("timeout") {
        Some(s) => match s.parse::<u64>() {
            Ok(v) => v,
            Err(_) => report_cli_error_and_exit(
                "invalid value for --timeout",
                Some(SUBCOMMAND),
                vec![("value", s)],
            ),
        },
        None => DEFAULT_TIMEOUT_SECS,
    };
    let executor = ProcessExecutor::new(
        get_candidate_runner(matches, config),
        &get_candidate_suffix(config),
        Duration::from_secs(timeout_secs),
    );
    let options = CaptureOptions {
        workers: config
            .as_ref()
            .and_then(|c| c.workers)
            .unwrap_or_else(num_workers),
        deadline: None,
    };
    log::info!(
        "handle_capture; {} candidates over {} scenarios",
        candidates.len(),
        stimulus.len()
    );

    let result = match capture_traces(Arc::new(executor), &candidates, &stimulus, &options) {
        Ok(result) => result,
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    };
    let report = match consensus::select(&stimulus, &result.traces) {
        Ok(report) => report,
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    };
    let traces: Vec<serde_json::Value> = result
        .traces
        .iter()
        .map(|trace| {
            let outputs: Vec<serde_json::Value> = stimulus
                .names()
                .zip(trace.outcomes.iter())
                .map(|(name, outcome)| {
                    let mut value = outcome_json(outcome);
                    value["scenario"] = json!(name);
                    value
                })
                .collect();
            json!({ "candidate": trace.candidate, "outputs": outputs })
        })
        .collect();
    let summary = json!({
        "traces": traces,
        "abandoned": result.abandoned,
        "consensus": report,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => report_cli_error_and_exit(&e.to_string(), Some(SUBCOMMAND), vec![]),
    }
}

fn num_workers() -> usize {
    CaptureOptions::default().workers
}
