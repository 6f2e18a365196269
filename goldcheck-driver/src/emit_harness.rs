// SPDX-License-Identifier: Apache-2.0

use clap::ArgMatches;
use goldcheck::harness::{render_harness, HarnessDialect, HarnessOptions};
use goldcheck::testbench::TestbenchRecord;

use crate::common::{load_interface, read_file_or_exit};
use crate::report_cli_error::{report_cli_error_and_exit, report_goldcheck_error_and_exit};
use crate::toolchain_config::{get_clock_signal, ToolchainConfig};

const SUBCOMMAND: &str = "emit-harness";

/// Reads a merged testbench file.
pub fn load_testbench(path: &str, subcommand: &str) -> Vec<TestbenchRecord> {
    let text = read_file_or_exit(path, subcommand);
    match serde_json::from_str(&text) {
        Ok(records) => records,
        Err(e) => report_cli_error_and_exit(
            "malformed testbench JSON",
            Some(subcommand),
            vec![("path", path), ("error", &e.to_string())],
        ),
    }
}

pub fn handle_emit_harness(matches: &ArgMatches, config: &Option<ToolchainConfig>) {
    let testbench_path = matches.get_one::<String>("TESTBENCH_JSON").unwrap();
    let records = load_testbench(testbench_path, SUBCOMMAND);
    let clock = get_clock_signal(matches, config);
    let iface = load_interface(matches.get_one::<String>("header"), &records, &clock, SUBCOMMAND);
    let dialect = match matches
        .get_one::<String>("dialect")
        .map(|s| s.parse::<HarnessDialect>())
    {
        Some(Ok(dialect)) => dialect,
        Some(Err(e)) => report_cli_error_and_exit(&e, Some(SUBCOMMAND), vec![]),
        None => HarnessDialect::Verilator,
    };
    let options = HarnessOptions {
        dialect,
        top_module: matches.get_one::<String>("top").cloned(),
    };
    log::info!(
        "handle_emit_harness; {} records, dialect {:?}",
        records.len(),
        dialect
    );
    match render_harness(&iface, &records, &options) {
        Ok(source) => print!("{}", source),
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    }
}
