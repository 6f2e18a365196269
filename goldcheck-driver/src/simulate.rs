// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use clap::ArgMatches;
use goldcheck::harness::{render_harness, HarnessOptions, HarnessReport, RtlSimulator};

use crate::common::load_interface;
use crate::emit_harness::load_testbench;
use crate::report_cli_error::{report_cli_error_and_exit, report_goldcheck_error_and_exit};
use crate::simulators::{IcarusSimulator, VerilatorSimulator};
use crate::toolchain_config::{
    get_clock_signal, get_iverilog_path, get_verilator_path, get_vvp_path, ToolchainConfig,
};

const SUBCOMMAND: &str = "simulate";

/// Builds the simulator named by `--simulator` for `rtl`.
pub fn make_simulator(
    matches: &ArgMatches,
    config: &Option<ToolchainConfig>,
    rtl: &str,
    subcommand: &str,
) -> Arc<dyn RtlSimulator> {
    let keep_temps = matches
        .get_one::<String>("keep_temps")
        .map(|s| s == "true")
        .unwrap_or(false);
    let rtl = PathBuf::from(rtl);
    match matches
        .get_one::<String>("simulator")
        .map(String::as_str)
        .unwrap_or("verilator")
    {
        "verilator" => Arc::new(VerilatorSimulator {
            verilator: get_verilator_path(matches, config),
            rtl,
            keep_temps,
        }),
        "iverilog" => Arc::new(IcarusSimulator {
            iverilog: get_iverilog_path(matches, config),
            vvp: get_vvp_path(config),
            rtl,
            keep_temps,
        }),
        other => report_cli_error_and_exit(
            "unknown simulator",
            Some(subcommand),
            vec![("simulator", other)],
        ),
    }
}

/// Prints the per-scenario result lines and the total, as the harness does.
pub fn print_report(report: &HarnessReport) {
    for mismatch in &report.mismatches {
        println!(
            "Mismatch: scenario={} cycle={} signal={} expected={} actual={}",
            mismatch.scenario, mismatch.cycle, mismatch.signal, mismatch.expected, mismatch.actual
        );
    }
    for scenario in &report.scenarios {
        if scenario.passed() {
            println!("Test passed for scenario {}", scenario.scenario);
        } else {
            println!(
                "Test failed, unpass = {} for scenario {}",
                scenario.unpass, scenario.scenario
            );
        }
    }
    if let Some(total) = report.total_unpass {
        println!("Unpass: {}", total);
    }
}

pub fn handle_simulate(matches: &ArgMatches, config: &Option<ToolchainConfig>) {
    let rtl = matches.get_one::<String>("RTL").unwrap();
    let testbench_path = matches.get_one::<String>("TESTBENCH_JSON").unwrap();
    let records = load_testbench(testbench_path, SUBCOMMAND);
    let clock = get_clock_signal(matches, config);
    let iface = load_interface(matches.get_one::<String>("header"), &records, &clock, SUBCOMMAND);
    let simulator = make_simulator(matches, config, rtl, SUBCOMMAND);
    let options = HarnessOptions {
        dialect: simulator.dialect(),
        top_module: matches.get_one::<String>("top").cloned(),
    };
    let top = options.top_module.clone().unwrap_or_else(|| iface.name.clone());
    let report = render_harness(&iface, &records, &options)
        .and_then(|harness| simulator.simulate(&top, &harness));
    match report {
        Ok(report) => {
            print_report(&report);
            if !report.passed() {
                std::process::exit(1);
            }
        }
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    }
}
