// SPDX-License-Identifier: Apache-2.0

//! Runs candidate programs as child processes.
//!
//! Each candidate body is written to a file and run as
//! `<runner...> <candidate-file> <stimulus.json>`. The program prints a JSON
//! list on stdout with one element per scenario.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use goldcheck::capture::{Candidate, CandidateExecutor, ScenarioOutcome};
use goldcheck::goldcheck_error::{GoldcheckError, Result};
use goldcheck::testbench::{parse_candidate_output, ScenarioSet};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct ProcessExecutor {
    /// Argv prefix; empty to run the candidate file directly.
    pub runner: Vec<String>,
    /// Appended to the candidate file name, e.g. `.py`.
    pub suffix: String,
    /// Per-candidate wall-clock limit.
    pub timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(runner: Vec<String>, suffix: &str, timeout: Duration) -> Self {
        ProcessExecutor {
            runner,
            suffix: suffix.to_string(),
            timeout,
        }
    }

    fn command(&self, program: &Path, stimulus: &Path) -> Command {
        let mut cmd = match self.runner.split_first() {
            Some((head, rest)) => {
                let mut cmd = Command::new(head);
                cmd.args(rest).arg(program);
                cmd
            }
            None => Command::new(program),
        };
        cmd.arg(stimulus);
        cmd
    }

    /// Runs one candidate to completion or timeout and returns its stdout.
    fn run(&self, candidate: &Candidate, scenarios: &ScenarioSet) -> Result<String> {
        let failed = |reason: String| GoldcheckError::CandidateFailed {
            candidate: candidate.index,
            reason,
        };
        let dir = tempfile::Builder::new()
            .prefix(&format!("goldcheck_candidate_{}", candidate.index))
            .tempdir()?;
        let program = dir
            .path()
            .join(format!("candidate_{}{}", candidate.index, self.suffix));
        std::fs::write(&program, &candidate.body)?;
        if self.runner.is_empty() {
            make_executable(&program)?;
        }
        let stimulus = dir.path().join("stimulus.json");
        std::fs::write(&stimulus, scenarios.to_json()?)?;
        let stdout_path = dir.path().join("stdout.json");
        let stderr_path = dir.path().join("stderr.txt");

        let mut cmd = self.command(&program, &stimulus);
        cmd.current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(File::create(&stdout_path)?))
            .stderr(Stdio::from(File::create(&stderr_path)?));
        log::debug!("candidate {}: running {:?}", candidate.index, cmd);
        let mut child = cmd
            .spawn()
            .map_err(|e| failed(format!("could not start: {}", e)))?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(failed(format!("timed out after {:?}", self.timeout)));
            }
            std::thread::sleep(POLL_INTERVAL);
        };
        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(failed(format!("exited with {}: {}", status, stderr.trim())));
        }
        Ok(std::fs::read_to_string(&stdout_path)?)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CandidateExecutor for ProcessExecutor {
    fn execute(
        &self,
        candidate: &Candidate,
        scenarios: &ScenarioSet,
    ) -> Result<Vec<ScenarioOutcome>> {
        let stdout = self.run(candidate, scenarios)?;
        let parsed = parse_candidate_output(scenarios, &stdout).map_err(|e| {
            GoldcheckError::CandidateFailed {
                candidate: candidate.index,
                reason: format!("unreadable output: {}", e),
            }
        })?;
        if parsed.len() != scenarios.len() {
            log::warn!(
                "candidate {} printed {} scenarios for {}",
                candidate.index,
                parsed.len(),
                scenarios.len()
            );
        }
        let mut outcomes: Vec<ScenarioOutcome> = parsed
            .into_iter()
            .take(scenarios.len())
            .map(ScenarioOutcome::Completed)
            .collect();
        while outcomes.len() < scenarios.len() {
            outcomes.push(ScenarioOutcome::Failed("no output for scenario".to_string()));
        }
        Ok(outcomes)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use goldcheck::testbench::{CircuitKind, Steps, StimulusRecord};

    fn stimulus() -> ScenarioSet {
        ScenarioSet::new(
            CircuitKind::Combinational,
            vec![
                StimulusRecord {
                    scenario: "a".into(),
                    inputs: Steps::Combinational(vec![[("x".to_string(), "1".to_string())].into()]),
                },
                StimulusRecord {
                    scenario: "b".into(),
                    inputs: Steps::Combinational(vec![[("x".to_string(), "0".to_string())].into()]),
                },
            ],
        )
        .unwrap()
    }

    fn sh() -> ProcessExecutor {
        ProcessExecutor::new(vec!["sh".to_string()], ".sh", Duration::from_secs(10))
    }

    #[test]
    fn test_short_output_fails_missing_scenarios() {
        let candidate = Candidate::new(0, "echo '[[{\"y\": \"0\"}]]'\n");
        let outcomes = sh().execute(&candidate, &stimulus()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], ScenarioOutcome::Completed(_)));
        assert!(matches!(outcomes[1], ScenarioOutcome::Failed(_)));
    }

    #[test]
    fn test_nonzero_exit_is_candidate_failure() {
        let candidate = Candidate::new(3, "echo boom >&2\nexit 2\n");
        match sh().execute(&candidate, &stimulus()) {
            Err(GoldcheckError::CandidateFailed { candidate, reason }) => {
                assert_eq!(candidate, 3);
                assert!(reason.contains("boom"), "{}", reason);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_kills_candidate() {
        let executor =
            ProcessExecutor::new(vec!["sh".to_string()], ".sh", Duration::from_millis(100));
        let candidate = Candidate::new(1, "sleep 5\n");
        let started = Instant::now();
        assert!(executor.execute(&candidate, &stimulus()).is_err());
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
