// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use clap::ArgMatches;
use goldcheck::orchestrator::Refinement;
use goldcheck::signal::ModuleInterface;
use serde_json::json;

use crate::command_oracle::{CommandAdjudicator, CommandSynthesisOracle, OracleCommand};
use crate::common::{get_kind, load_stimulus, read_file_or_exit};
use crate::process_executor::ProcessExecutor;
use crate::report_cli_error::{report_cli_error_and_exit, report_goldcheck_error_and_exit};
use crate::simulate::make_simulator;
use crate::toolchain_config::{
    get_candidate_runner, get_candidate_suffix, get_clock_signal, get_refinement_config,
    ToolchainConfig,
};

const SUBCOMMAND: &str = "refine";

fn oracle_command(
    matches: &ArgMatches,
    id: &str,
    name: &'static str,
    timeout: Duration,
) -> OracleCommand {
    let command_line = matches.get_one::<String>(id).unwrap();
    match OracleCommand::parse(name, command_line) {
        Some(command) => command.with_timeout(timeout),
        None => report_cli_error_and_exit(
            "empty oracle command",
            Some(SUBCOMMAND),
            vec![("oracle", name)],
        ),
    }
}

pub fn handle_refine(matches: &ArgMatches, config: &Option<ToolchainConfig>) {
    let spec = read_file_or_exit(matches.get_one::<String>("spec").unwrap(), SUBCOMMAND);
    let header = read_file_or_exit(matches.get_one::<String>("header").unwrap(), SUBCOMMAND);
    let kind = get_kind(matches);
    let stimulus = load_stimulus(
        matches.get_one::<String>("stimulus").unwrap(),
        kind,
        SUBCOMMAND,
    );
    let clock = get_clock_signal(matches, config);
    let iface = match ModuleInterface::parse_header(&header) {
        Ok(iface) => iface.with_clock(&clock),
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    };
    let refinement_config = match get_refinement_config(matches, config, kind) {
        Ok(c) => c,
        Err(e) => report_cli_error_and_exit(&e, Some(SUBCOMMAND), vec![]),
    };

    let oracle_timeout = refinement_config.oracle_timeout;
    let synthesizer = CommandSynthesisOracle::new(oracle_command(
        matches,
        "synth_cmd",
        "synthesis",
        oracle_timeout,
    ));
    let adjudicator = CommandAdjudicator::new(oracle_command(
        matches,
        "judge_cmd",
        "adjudication",
        oracle_timeout,
    ));
    let executor = ProcessExecutor::new(
        get_candidate_runner(matches, config),
        &get_candidate_suffix(config),
        refinement_config.capture_timeout,
    );
    let mut refinement = Refinement::new(
        &spec,
        &header,
        stimulus,
        Arc::new(synthesizer),
        Arc::new(adjudicator),
        Arc::new(executor),
    )
    .with_config(refinement_config)
    .with_interface(iface);
    if let Some(rtl) = matches.get_one::<String>("rtl") {
        refinement = refinement.with_simulator(make_simulator(matches, config, rtl, SUBCOMMAND));
    }

    let outcome = match refinement.run() {
        Ok(outcome) => outcome,
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    };
    if let Some(path) = matches.get_one::<String>("testbench_out") {
        let written = serde_json::to_string_pretty(&outcome.testbench)
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(path, text).map_err(|e| e.to_string()));
        if let Err(e) = written {
            report_cli_error_and_exit(
                "could not write testbench",
                Some(SUBCOMMAND),
                vec![("path", path), ("error", &e)],
            );
        }
    }
    let summary = json!({
        "verified": outcome.verified,
        "trials": outcome.trials,
        "canonical": outcome.canonical,
        "history": outcome.history,
        "simulation": outcome.simulation,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => report_cli_error_and_exit(&e.to_string(), Some(SUBCOMMAND), vec![]),
    }
    if !outcome.verified {
        log::warn!(
            "refine; no candidate verified after {} trials",
            outcome.trials
        );
        std::process::exit(1);
    }
}
