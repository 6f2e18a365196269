// SPDX-License-Identifier: Apache-2.0

//! Command line driver for goldcheck.
//!
//! Commands are given like:
//!
//! ```text
//! goldcheck-driver <global-options> <command> <command-args-and-options>
//! ```
//!
//! Commands are:
//!
//! - capture: Runs candidate programs over a stimulus and reports the
//!   consensus selection.
//! - consensus: Compares already-captured candidate outputs.
//! - merge-testbench: Joins a stimulus file with one candidate's outputs.
//! - emit-harness: Renders a Verilator C++ or SystemVerilog harness for a
//!   testbench.
//! - simulate: Runs a testbench against RTL under Verilator or Icarus.
//! - refine: Runs the generate/select/adjudicate loop with external oracles.
//! - pack-words: Prints a bit string as the 32-bit words a wide port takes.
//!
//! Sample usage:
//!
//! ```shell
//! $ goldcheck-driver consensus stimulus.json out0.json out1.json out2.json
//! $ goldcheck-driver merge-testbench stimulus.json out0.json > tb.json
//! $ goldcheck-driver simulate counter.sv tb.json --header=header.sv \
//!     --simulator=iverilog
//! ```

mod capture;
mod command_oracle;
mod common;
mod consensus;
mod emit_harness;
mod merge_testbench;
mod pack_words;
mod process_executor;
mod refine;
mod report_cli_error;
mod simulate;
mod simulators;
mod toolchain_config;

use crate::toolchain_config::ToolchainConfig;
use clap::{Arg, ArgAction};
use report_cli_error::report_cli_error_and_exit;
use serde::Deserialize;

const TOOLCHAIN_FILE: &str = "goldcheck-toolchain.toml";

#[derive(Deserialize)]
struct GoldcheckToolchain {
    toolchain: ToolchainConfig,
}

trait AppExt {
    fn add_bool_arg(self, long: &'static str, help: &'static str) -> Self;
    fn add_kind_arg(self) -> Self;
    fn add_header_arg(self, required: bool) -> Self;
    fn add_clock_arg(self) -> Self;
    fn add_runner_arg(self) -> Self;
    fn add_simulator_args(self) -> Self;
    fn add_refinement_args(self) -> Self;
}

impl AppExt for clap::Command {
    fn add_bool_arg(self, long: &'static str, help: &'static str) -> Self {
        (self as clap::Command).arg(
            Arg::new(long)
                .long(long)
                .value_name("BOOL")
                .action(ArgAction::Set)
                .value_parser(["true", "false"])
                .num_args(1)
                .help(help),
        )
    }

    fn add_kind_arg(self) -> Self {
        (self as clap::Command).arg(
            Arg::new("kind")
                .long("kind")
                .value_name("KIND")
                .help("Whether the stimulus is sequential (segments) or combinational (steps)")
                .value_parser(["sequential", "combinational"])
                .default_value("sequential")
                .action(ArgAction::Set),
        )
    }

    fn add_header_arg(self, required: bool) -> Self {
        (self as clap::Command).arg(
            Arg::new("header")
                .long("header")
                .value_name("HEADER")
                .help("Verilog file holding the module declaration (ports and widths)")
                .required(required)
                .action(ArgAction::Set),
        )
    }

    fn add_clock_arg(self) -> Self {
        (self as clap::Command).arg(
            Arg::new("clock")
                .long("clock")
                .value_name("PORT")
                .help("Name of the clock port (default: clk)")
                .action(ArgAction::Set),
        )
    }

    fn add_runner_arg(self) -> Self {
        (self as clap::Command).arg(
            Arg::new("runner")
                .long("runner")
                .value_name("COMMAND")
                .help("Command prefix used to run candidate files, e.g. 'python3'")
                .action(ArgAction::Set),
        )
    }

    fn add_simulator_args(self) -> Self {
        (self as clap::Command)
            .arg(
                Arg::new("simulator")
                    .long("simulator")
                    .value_name("SIMULATOR")
                    .help("RTL simulator to run the harness under")
                    .value_parser(["verilator", "iverilog"])
                    .default_value("verilator")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("top")
                    .long("top")
                    .value_name("MODULE")
                    .help("Top module name; defaults to the module in the header")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verilator_path")
                    .long("verilator_path")
                    .value_name("PATH")
                    .help("Path to the verilator executable")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("iverilog_path")
                    .long("iverilog_path")
                    .value_name("PATH")
                    .help("Path to the iverilog executable")
                    .action(ArgAction::Set),
            )
            .add_bool_arg("keep_temps", "Keep the simulation work directory")
    }

    fn add_refinement_args(self) -> Self {
        let number = |id: &'static str, help: &'static str| {
            Arg::new(id)
                .long(id)
                .value_name("N")
                .help(help)
                .action(ArgAction::Set)
        };
        (self as clap::Command)
            .arg(number("max_trials", "Maximum number of generate/adjudicate trials"))
            .arg(number("candidates", "Candidates requested per trial"))
            .arg(number("oracle_timeout_secs", "Per-call oracle deadline in seconds"))
            .arg(number(
                "capture_timeout_secs",
                "Per-candidate execution deadline in seconds",
            ))
            .arg(number("workers", "Candidates executed concurrently"))
            .arg(number(
                "sample_scenarios",
                "Testbench scenarios shown to the adjudicator",
            ))
            .arg(number("seed", "Seed for the adjudication sample"))
    }
}

fn main() {
    let _ = env_logger::try_init();

    log::info!(
        "goldcheck-driver starting; version: {}",
        env!("CARGO_PKG_VERSION")
    );

    let matches = clap::Command::new("goldcheck-driver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Consensus checking and co-simulation for hardware reference models")
        .arg(
            Arg::new("toolchain")
                .long("toolchain")
                .value_name("TOOLCHAIN")
                .help("Path to a goldcheck-toolchain.toml file")
                .action(ArgAction::Set),
        )
        .subcommand(clap::Command::new("version").about("Prints the version of the driver"))
        .subcommand(
            clap::Command::new("pack-words")
                .about("Packs a bit string into 32-bit words, least significant first")
                .arg(
                    Arg::new("BITSTRING")
                        .help("Bit string, most significant bit first")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            clap::Command::new("merge-testbench")
                .about("Joins stimulus records with one candidate's outputs")
                .arg(
                    Arg::new("STIMULUS_JSON")
                        .help("The stimulus file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("OUTPUT_JSON")
                        .help("The candidate's outputs for the stimulus")
                        .required(true)
                        .index(2),
                )
                .add_kind_arg(),
        )
        .subcommand(
            clap::Command::new("consensus")
                .about("Compares candidate outputs and selects the adjudication target")
                .arg(
                    Arg::new("STIMULUS_JSON")
                        .help("The stimulus file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("OUTPUT_JSON")
                        .help("One output file per candidate, in candidate order")
                        .required(true)
                        .num_args(1..)
                        .index(2),
                )
                .add_kind_arg(),
        )
        .subcommand(
            clap::Command::new("capture")
                .about("Runs candidate programs over a stimulus and compares their outputs")
                .arg(
                    Arg::new("STIMULUS_JSON")
                        .help("The stimulus file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("CANDIDATE")
                        .help("Candidate program files, in candidate order")
                        .required(true)
                        .num_args(1..)
                        .index(2),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECONDS")
                        .help("Per-candidate execution deadline")
                        .action(ArgAction::Set),
                )
                .add_kind_arg()
                .add_header_arg(false)
                .add_clock_arg()
                .add_runner_arg(),
        )
        .subcommand(
            clap::Command::new("emit-harness")
                .about("Renders a self-checking harness for a testbench")
                .arg(
                    Arg::new("TESTBENCH_JSON")
                        .help("Merged testbench records")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("dialect")
                        .long("dialect")
                        .value_name("DIALECT")
                        .help("Harness language")
                        .value_parser(["verilator", "sv"])
                        .default_value("verilator")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("top")
                        .long("top")
                        .value_name("MODULE")
                        .help("Top module name; defaults to the module in the header")
                        .action(ArgAction::Set),
                )
                .add_header_arg(false)
                .add_clock_arg(),
        )
        .subcommand(
            clap::Command::new("simulate")
                .about("Runs a testbench against RTL and reports mismatches")
                .arg(
                    Arg::new("RTL")
                        .help("The design under test")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("TESTBENCH_JSON")
                        .help("Merged testbench records")
                        .required(true)
                        .index(2),
                )
                .add_header_arg(false)
                .add_clock_arg()
                .add_simulator_args(),
        )
        .subcommand(
            clap::Command::new("refine")
                .about("Generates, cross-checks and adjudicates reference models")
                .arg(
                    Arg::new("spec")
                        .long("spec")
                        .value_name("FILE")
                        .help("Natural-language description of the circuit")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("stimulus")
                        .long("stimulus")
                        .value_name("FILE")
                        .help("The stimulus file")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("synth_cmd")
                        .long("synth_cmd")
                        .value_name("COMMAND")
                        .help("Synthesis oracle command; reads a request on stdin")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("judge_cmd")
                        .long("judge_cmd")
                        .value_name("COMMAND")
                        .help("Adjudication oracle command; reads a request on stdin")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("rtl")
                        .long("rtl")
                        .value_name("FILE")
                        .help("RTL to validate the accepted candidate against")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("testbench_out")
                        .long("testbench_out")
                        .value_name("FILE")
                        .help("Where to write the canonical testbench")
                        .action(ArgAction::Set),
                )
                .add_kind_arg()
                .add_header_arg(true)
                .add_clock_arg()
                .add_runner_arg()
                .add_simulator_args()
                .add_refinement_args(),
        )
        .get_matches();

    let mut toml_path: Option<String> = matches
        .get_one::<String>("toolchain")
        .map(|s| s.to_string());

    // With no --toolchain flag, fall back to a toolchain file in the current
    // directory.
    if toml_path.is_none() {
        if let Ok(cwd) = std::env::current_dir() {
            let cwd_toml_path = cwd.join(TOOLCHAIN_FILE);
            if cwd_toml_path.exists() {
                log::info!(
                    "Using {} in current directory: {}",
                    TOOLCHAIN_FILE,
                    cwd_toml_path.display()
                );
                toml_path = Some(cwd_toml_path.display().to_string());
            }
        }
    }

    let config: Option<ToolchainConfig> = toml_path.map(|path| {
        let toml_str = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => report_cli_error_and_exit(
                "could not read toolchain toml file",
                None,
                vec![("path", &path), ("error", &e.to_string())],
            ),
        };
        let value: toml::Value = match toml::from_str(&toml_str) {
            Ok(v) => v,
            Err(e) => report_cli_error_and_exit(
                "could not parse toolchain toml file",
                None,
                vec![("path", &path), ("error", &e.to_string())],
            ),
        };
        match value.try_into::<GoldcheckToolchain>() {
            Ok(toolchain) => toolchain.toolchain,
            Err(e) => report_cli_error_and_exit(
                "toolchain toml file has no valid [toolchain] table",
                None,
                vec![("path", &path), ("error", &e.to_string())],
            ),
        }
    });

    if let Some(matches) = matches.subcommand_matches("pack-words") {
        pack_words::handle_pack_words(matches);
    } else if let Some(matches) = matches.subcommand_matches("merge-testbench") {
        merge_testbench::handle_merge_testbench(matches);
    } else if let Some(matches) = matches.subcommand_matches("consensus") {
        consensus::handle_consensus(matches);
    } else if let Some(matches) = matches.subcommand_matches("capture") {
        capture::handle_capture(matches, &config);
    } else if let Some(matches) = matches.subcommand_matches("emit-harness") {
        emit_harness::handle_emit_harness(matches, &config);
    } else if let Some(matches) = matches.subcommand_matches("simulate") {
        simulate::handle_simulate(matches, &config);
    } else if let Some(matches) = matches.subcommand_matches("refine") {
        refine::handle_refine(matches, &config);
    } else if let Some(_matches) = matches.subcommand_matches("version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
    } else {
        report_cli_error_and_exit("No valid subcommand provided.", None, vec![]);
    }
}
