// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use clap::ArgMatches;
use goldcheck::orchestrator::RefinementConfig;
use goldcheck::testbench::CircuitKind;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ToolchainConfig {
    /// Path to the `verilator` executable; looked up on `PATH` otherwise.
    pub verilator_path: Option<String>,

    /// Path to the `iverilog` executable; looked up on `PATH` otherwise.
    pub iverilog_path: Option<String>,

    /// Path to the `vvp` executable; looked up on `PATH` otherwise.
    pub vvp_path: Option<String>,

    /// Command prefix used to run a candidate program, e.g. `["python3"]`.
    /// The candidate file and the stimulus file are appended.
    pub candidate_runner: Option<Vec<String>>,

    /// File suffix given to candidate programs before they are run.
    pub candidate_suffix: Option<String>,

    /// Name of the clock port.
    pub clock_signal: Option<String>,

    pub max_trials: Option<usize>,
    pub candidate_count: Option<usize>,
    pub oracle_timeout_secs: Option<u64>,
    pub capture_timeout_secs: Option<u64>,

    /// Number of candidates executed concurrently.
    pub workers: Option<usize>,
}

/// Helper for retrieving a string setting from the command line flag, if
/// specified, or the toolchain config if it's present and the cmdline flag
/// isn't specified.
fn get_string(
    matches: &ArgMatches,
    flag: &str,
    config: &Option<ToolchainConfig>,
    from_config: impl Fn(&ToolchainConfig) -> Option<String>,
) -> Option<String> {
    if let Some(value) = matches.try_get_one::<String>(flag).ok().flatten() {
        Some(value.to_string())
    } else if let Some(config) = config {
        from_config(config)
    } else {
        None
    }
}

fn get_number<T: std::str::FromStr>(
    matches: &ArgMatches,
    flag: &str,
    config: &Option<ToolchainConfig>,
    from_config: impl Fn(&ToolchainConfig) -> Option<T>,
) -> Result<Option<T>, String> {
    match matches.try_get_one::<String>(flag).ok().flatten() {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("invalid value for --{}: {}", flag, value)),
        None => Ok(config.as_ref().and_then(from_config)),
    }
}

/// The clock port name: `--clock`, then the config, then `clk`.
pub fn get_clock_signal(matches: &ArgMatches, config: &Option<ToolchainConfig>) -> String {
    get_string(matches, "clock", config, |c| c.clock_signal.clone())
        .unwrap_or_else(|| goldcheck::signal::DEFAULT_CLOCK.to_string())
}

pub fn get_verilator_path(matches: &ArgMatches, config: &Option<ToolchainConfig>) -> Option<String> {
    get_string(matches, "verilator_path", config, |c| c.verilator_path.clone())
}

pub fn get_iverilog_path(matches: &ArgMatches, config: &Option<ToolchainConfig>) -> Option<String> {
    get_string(matches, "iverilog_path", config, |c| c.iverilog_path.clone())
}

pub fn get_vvp_path(config: &Option<ToolchainConfig>) -> Option<String> {
    config.as_ref().and_then(|c| c.vvp_path.clone())
}

/// The candidate runner argv prefix: `--runner` (whitespace separated),
/// then the config. Empty means candidates are executed directly.
pub fn get_candidate_runner(matches: &ArgMatches, config: &Option<ToolchainConfig>) -> Vec<String> {
    if let Some(runner) = matches.try_get_one::<String>("runner").ok().flatten() {
        runner.split_whitespace().map(|s| s.to_string()).collect()
    } else if let Some(config) = config {
        config.candidate_runner.clone().unwrap_or_default()
    } else {
        vec![]
    }
}

pub fn get_candidate_suffix(config: &Option<ToolchainConfig>) -> String {
    config
        .as_ref()
        .and_then(|c| c.candidate_suffix.clone())
        .unwrap_or_default()
}

/// Assembles the refinement settings: flags override the config, which
/// overrides the defaults.
pub fn get_refinement_config(
    matches: &ArgMatches,
    config: &Option<ToolchainConfig>,
    kind: CircuitKind,
) -> Result<RefinementConfig, String> {
    let mut result = RefinementConfig {
        circuit_kind: kind,
        ..RefinementConfig::default()
    };
    if let Some(v) = get_number(matches, "max_trials", config, |c| c.max_trials)? {
        result.max_trials = v;
    }
    if let Some(v) = get_number(matches, "candidates", config, |c| c.candidate_count)? {
        result.candidate_count = v;
    }
    if let Some(v) = get_number(matches, "oracle_timeout_secs", config, |c| {
        c.oracle_timeout_secs
    })? {
        result.oracle_timeout = Duration::from_secs(v);
    }
    if let Some(v) = get_number(matches, "capture_timeout_secs", config, |c| {
        c.capture_timeout_secs
    })? {
        result.capture_timeout = Duration::from_secs(v);
    }
    if let Some(v) = get_number(matches, "workers", config, |c| c.workers)? {
        result.workers = v;
    }
    if let Some(v) = get_number::<usize>(matches, "sample_scenarios", &None, |_| None)? {
        result.sample_scenarios = v;
    }
    if let Some(v) = get_number::<u64>(matches, "seed", &None, |_| None)? {
        result.sample_seed = v;
    }
    Ok(result)
}
