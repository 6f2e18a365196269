// SPDX-License-Identifier: Apache-2.0

use clap::ArgMatches;
use goldcheck::testbench::merge_testbench;

use crate::common::{get_kind, load_stimulus, read_file_or_exit, read_trace};
use crate::report_cli_error::report_goldcheck_error_and_exit;

const SUBCOMMAND: &str = "merge-testbench";

pub fn handle_merge_testbench(matches: &ArgMatches) {
    let stimulus_path = matches.get_one::<String>("STIMULUS_JSON").unwrap();
    let output_path = matches.get_one::<String>("OUTPUT_JSON").unwrap();
    let stimulus = load_stimulus(stimulus_path, get_kind(matches), SUBCOMMAND);
    let output_text = read_file_or_exit(output_path, SUBCOMMAND);
    let merged = read_trace(&stimulus, &output_text)
        .and_then(|trace| merge_testbench(&stimulus, &trace))
        .and_then(|merged| Ok(serde_json::to_string_pretty(&merged)?));
    match merged {
        Ok(json) => println!("{}", json),
        Err(e) => report_goldcheck_error_and_exit(&e, SUBCOMMAND),
    }
}
