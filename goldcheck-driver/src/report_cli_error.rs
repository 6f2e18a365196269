// SPDX-License-Identifier: Apache-2.0

use colored::Colorize;
use goldcheck::goldcheck_error::GoldcheckError;

/// Prints `message` (and any key/value details) prefixed with the driver
/// and subcommand names, then exits with status 1.
pub fn report_cli_error_and_exit(
    message: &str,
    subcommand: Option<&str>,
    details: Vec<(&str, &str)>,
) -> ! {
    let prefix = match subcommand {
        Some(subcommand) => format!("goldcheck-driver: {}: ", subcommand),
        None => "goldcheck-driver: ".to_string(),
    };
    eprintln!("{}{}", prefix, message.red().bold());
    for (key, value) in details {
        eprintln!("  {}: {}", key, value);
    }
    std::process::exit(1);
}

/// Reports a library error, breaking out the fields that locate the
/// problem in the input files.
pub fn report_goldcheck_error_and_exit(error: &GoldcheckError, subcommand: &str) -> ! {
    match error {
        GoldcheckError::MalformedSignal {
            signal,
            value,
            reason,
        } => report_cli_error_and_exit(
            "malformed signal value",
            Some(subcommand),
            vec![("signal", signal), ("value", value), ("reason", reason)],
        ),
        GoldcheckError::ShapeMismatch { scenario, detail } => report_cli_error_and_exit(
            "trace does not match the stimulus shape",
            Some(subcommand),
            vec![("scenario", scenario), ("detail", detail)],
        ),
        GoldcheckError::UnknownSignal { scenario, signal } => report_cli_error_and_exit(
            "signal is not a port of the module",
            Some(subcommand),
            vec![("scenario", scenario), ("signal", signal)],
        ),
        other => report_cli_error_and_exit(&other.to_string(), Some(subcommand), vec![]),
    }
}
