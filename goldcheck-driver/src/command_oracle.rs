// SPDX-License-Identifier: Apache-2.0

//! Oracles implemented by external commands.
//!
//! The command receives one JSON request on stdin and answers with JSON on
//! stdout:
//!
//! - synthesis: a `SynthesisRequest` in, a list of candidate bodies out;
//! - adjudication: `{"candidate": .., "sample": [..]}` in, a `Verdict` out.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use goldcheck::capture::Candidate;
use goldcheck::goldcheck_error::{GoldcheckError, Result};
use goldcheck::oracle::{AdjudicationOracle, SynthesisOracle, SynthesisRequest, Verdict};
use goldcheck::testbench::TestbenchRecord;
use serde::Serialize;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// An argv, split on whitespace from a command line flag.
#[derive(Debug, Clone)]
pub struct OracleCommand {
    name: &'static str,
    argv: Vec<String>,
    /// The child is killed once a call runs this long.
    timeout: Duration,
}

impl OracleCommand {
    pub fn parse(name: &'static str, command_line: &str) -> Option<Self> {
        let argv: Vec<String> = command_line
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        if argv.is_empty() {
            None
        } else {
            Some(OracleCommand {
                name,
                argv,
                timeout: DEFAULT_TIMEOUT,
            })
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn unavailable(&self, reason: String) -> GoldcheckError {
        GoldcheckError::OracleUnavailable {
            oracle: self.name.to_string(),
            reason,
        }
    }

    /// Runs the command with `request` on stdin and returns its stdout.
    ///
    /// A command still running after the timeout is killed and reported as
    /// `OracleTimeout`.
    fn call(&self, request: &str) -> Result<String> {
        log::debug!("{} oracle: running {:?}", self.name, self.argv);
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(format!("could not start {}: {}", self.argv[0], e)))?;
        // The command may fill its stdout pipe before draining stdin.
        if let Some(mut stdin) = child.stdin.take() {
            let request = request.to_string();
            let name = self.name;
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(request.as_bytes()) {
                    log::debug!("{} oracle: stdin closed early: {}", name, e);
                }
            });
        }
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| self.unavailable(e.to_string()))?
            {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("{} oracle: killed after {:?}", self.name, self.timeout);
                return Err(GoldcheckError::OracleTimeout {
                    oracle: self.name.to_string(),
                    after: self.timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        let stdout = collect(stdout);
        if !status.success() {
            return Err(self.unavailable(format!(
                "exited with {}: {}",
                status,
                collect(stderr).trim()
            )));
        }
        Ok(stdout)
    }
}

/// Reads `pipe` to the end on a helper thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    })
}

fn collect(reader: Option<std::thread::JoinHandle<Vec<u8>>>) -> String {
    let bytes = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).to_string()
}

pub struct CommandSynthesisOracle {
    command: OracleCommand,
}

impl CommandSynthesisOracle {
    pub fn new(command: OracleCommand) -> Self {
        CommandSynthesisOracle { command }
    }
}

impl SynthesisOracle for CommandSynthesisOracle {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<Candidate>> {
        let stdout = self.command.call(&serde_json::to_string(request)?)?;
        let bodies: Vec<String> = serde_json::from_str(&stdout)
            .map_err(|e| self.command.unavailable(format!("unreadable candidate list: {}", e)))?;
        Ok(bodies
            .iter()
            .enumerate()
            .map(|(i, body)| Candidate::new(i, body))
            .collect())
    }
}

#[derive(Serialize)]
struct AdjudicationRequest<'a> {
    candidate: &'a Candidate,
    sample: &'a [TestbenchRecord],
}

pub struct CommandAdjudicator {
    command: OracleCommand,
}

impl CommandAdjudicator {
    pub fn new(command: OracleCommand) -> Self {
        CommandAdjudicator { command }
    }
}

impl AdjudicationOracle for CommandAdjudicator {
    fn adjudicate(&self, candidate: &Candidate, sample: &[TestbenchRecord]) -> Result<Verdict> {
        let request = serde_json::to_string(&AdjudicationRequest { candidate, sample })?;
        let stdout = self.command.call(&request)?;
        serde_json::from_str(&stdout)
            .map_err(|e| self.command.unavailable(format!("unreadable verdict: {}", e)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use goldcheck::testbench::CircuitKind;

    #[test]
    fn test_command_synthesis_reads_candidate_list() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("synth.sh");
        std::fs::write(&script, "cat >/dev/null\necho '[\"a\", \"b\"]'\n").unwrap();
        let oracle = CommandSynthesisOracle::new(
            OracleCommand::parse("synthesis", &format!("sh {}", script.display())).unwrap(),
        );
        let candidates = oracle
            .synthesize(&SynthesisRequest {
                spec: "s".into(),
                header: "module m(input a);".into(),
                kind: CircuitKind::Combinational,
                count: 2,
                feedback: None,
            })
            .unwrap();
        assert_eq!(candidates, vec![Candidate::new(0, "a"), Candidate::new(1, "b")]);
    }

    #[test]
    fn test_command_adjudicator_parses_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("judge.sh");
        std::fs::write(
            &script,
            "cat >/dev/null\necho '{\"matches\": false, \"reason\": \"off by one\"}'\n",
        )
        .unwrap();
        let judge = CommandAdjudicator::new(
            OracleCommand::parse("adjudication", &format!("sh {}", script.display())).unwrap(),
        );
        let verdict = judge.adjudicate(&Candidate::new(0, "x"), &[]).unwrap();
        assert_eq!(verdict, Verdict::reject("off by one", ""));
    }

    #[test]
    fn test_failing_command_is_retryable() {
        let judge = CommandAdjudicator::new(OracleCommand::parse("adjudication", "false").unwrap());
        let err = judge.adjudicate(&Candidate::new(0, "x"), &[]).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_hanging_command_is_killed_at_timeout() {
        let judge = CommandAdjudicator::new(
            OracleCommand::parse("adjudication", "sleep 5")
                .unwrap()
                .with_timeout(Duration::from_millis(100)),
        );
        let started = Instant::now();
        let err = judge.adjudicate(&Candidate::new(0, "x"), &[]).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(matches!(err, GoldcheckError::OracleTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(OracleCommand::parse("synthesis", "   ").is_none());
    }
}
