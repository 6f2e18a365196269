// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::process::{Command, Output};

use clap::ArgMatches;
use goldcheck::signal::ModuleInterface;
use goldcheck::testbench::{
    infer_interface, parse_candidate_output, CircuitKind, ScenarioSet, Steps, TestbenchRecord,
    TraceRecord,
};

use crate::report_cli_error::{report_cli_error_and_exit, report_goldcheck_error_and_exit};

/// Resolves an external tool: the configured path if one is given, else a
/// `PATH` lookup.
pub fn find_and_verify_executable(
    name: &str,
    configured: Option<&str>,
    install_hint: &str,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = configured {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "{} not found at configured path {}",
                name,
                path.display()
            ));
        }
        return Ok(path);
    }
    which::which(name)
        .map_err(|e| anyhow::anyhow!("{} not found on PATH ({}). {}", name, e, install_hint))
}

/// Runs `cmd`, attaching `context` to a failure to launch it.
pub fn execute_command_with_context(mut cmd: Command, context: &str) -> anyhow::Result<Output> {
    log::debug!("Running command: {:?}", cmd);
    cmd.output()
        .map_err(|e| anyhow::anyhow!("{}: {}", context, e))
}

/// Reads a file named on the command line, exiting with a CLI error if it
/// cannot be read.
pub fn read_file_or_exit(path: &str, subcommand: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => report_cli_error_and_exit(
            "could not read input file",
            Some(subcommand),
            vec![("path", path), ("error", &e.to_string())],
        ),
    }
}

/// The module interface from `--header` if given, else inferred from the
/// first testbench record.
pub fn load_interface(
    header_path: Option<&String>,
    records: &[TestbenchRecord],
    clock: &str,
    subcommand: &str,
) -> ModuleInterface {
    let result = match header_path {
        Some(path) => {
            let text = read_file_or_exit(path, subcommand);
            ModuleInterface::parse_header(&text).map(|iface| iface.with_clock(clock))
        }
        None => infer_interface("top_module", clock, records),
    };
    match result {
        Ok(iface) => iface,
        Err(e) => report_goldcheck_error_and_exit(&e, subcommand),
    }
}

/// Reads stimulus JSON of the given kind, exiting on malformed input.
pub fn load_stimulus(path: &str, kind: CircuitKind, subcommand: &str) -> ScenarioSet {
    let text = read_file_or_exit(path, subcommand);
    match ScenarioSet::from_json(kind, &text) {
        Ok(set) => set,
        Err(e) => report_goldcheck_error_and_exit(&e, subcommand),
    }
}

/// Reads a candidate's outputs, either as trace records
/// (`[{"scenario": .., "output variable": ..}]`) or as the raw list a
/// candidate prints, whose elements are named by stimulus order.
pub fn read_trace(
    stimulus: &ScenarioSet,
    text: &str,
) -> goldcheck::goldcheck_error::Result<Vec<TraceRecord>> {
    if let Ok(mut records) = serde_json::from_str::<Vec<TraceRecord>>(text) {
        for record in records.iter_mut() {
            let inputs = stimulus
                .scenarios
                .iter()
                .find(|s| s.scenario == record.scenario)
                .map(|s| &s.inputs);
            if let (Some(Steps::Sequential(ins)), Steps::Sequential(outs)) =
                (inputs, &mut record.outputs)
            {
                for (input, output) in ins.iter().zip(outs.iter_mut()) {
                    if output.cycles == 0 {
                        output.cycles = input.cycles;
                    }
                }
            }
        }
        return Ok(records);
    }
    let steps = parse_candidate_output(stimulus, text)?;
    Ok(stimulus
        .scenarios
        .iter()
        .zip(steps)
        .map(|(record, outputs)| TraceRecord {
            scenario: record.scenario.clone(),
            outputs,
        })
        .collect())
}

pub fn get_kind(matches: &ArgMatches) -> CircuitKind {
    matches
        .get_one::<String>("kind")
        .map(|s| s.parse().unwrap_or(CircuitKind::Sequential))
        .unwrap_or(CircuitKind::Sequential)
}
