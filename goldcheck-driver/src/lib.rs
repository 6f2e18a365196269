// SPDX-License-Identifier: Apache-2.0

// Expose the pieces reusable outside the CLI: the process-backed executor,
// oracles and simulators, plus the config and error reporting they use.
pub mod command_oracle;
pub mod common;
pub mod process_executor;
pub mod report_cli_error;
pub mod simulators;
pub mod toolchain_config;
