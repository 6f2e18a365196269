// SPDX-License-Identifier: Apache-2.0

//! `RtlSimulator`s backed by external simulators: Verilator builds the C++
//! harness against the RTL, Icarus Verilog compiles the SystemVerilog `tb`.

use std::path::{Path, PathBuf};
use std::process::Command;

use goldcheck::goldcheck_error::{GoldcheckError, Result};
use goldcheck::harness::{parse_harness_log, HarnessDialect, HarnessReport, RtlSimulator};
use tempfile::TempDir;

use crate::common::{execute_command_with_context, find_and_verify_executable};

/// Parses a harness run's stdout. A nonzero exit status is expected when
/// there are mismatches; only a missing `Unpass:` line makes it an error.
fn report_from_run(tool: &str, output: &std::process::Output) -> anyhow::Result<HarnessReport> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let report = parse_harness_log(&stdout);
    if report.total_unpass.is_none() {
        return Err(anyhow::anyhow!(
            "{} run did not report a total (status {}): {}",
            tool,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(report)
}

fn simulation_error(e: anyhow::Error) -> GoldcheckError {
    GoldcheckError::Simulation(format!("{:#}", e))
}

fn make_work_dir(keep_temps: bool) -> anyhow::Result<(TempDir, PathBuf)> {
    let dir = tempfile::Builder::new().prefix("goldcheck_sim").tempdir()?;
    let path = dir.path().to_path_buf();
    if keep_temps {
        log::info!("keeping simulation directory {}", path.display());
    }
    Ok((dir, path))
}

pub struct VerilatorSimulator {
    pub verilator: Option<String>,
    pub rtl: PathBuf,
    pub keep_temps: bool,
}

impl VerilatorSimulator {
    fn run(&self, top: &str, harness: &str) -> anyhow::Result<HarnessReport> {
        let verilator = find_and_verify_executable(
            "verilator",
            self.verilator.as_deref(),
            "Please install Verilator (https://verilator.org).",
        )?;
        let (dir, work_dir) = make_work_dir(self.keep_temps)?;
        let harness_path = work_dir.join("harness.cpp");
        std::fs::write(&harness_path, harness)?;
        let rtl = std::fs::canonicalize(&self.rtl)?;

        let mut build = Command::new(&verilator);
        build
            .current_dir(&work_dir)
            .arg("--cc")
            .arg("--exe")
            .arg("--build")
            .arg("-j")
            .arg("0")
            .arg("-Wno-fatal")
            .arg("--top-module")
            .arg(top)
            .arg("-Mdir")
            .arg("obj_dir")
            .arg("-o")
            .arg("Vharness")
            .arg(&rtl)
            .arg(&harness_path);
        let out_build = execute_command_with_context(build, "Failed to execute verilator")?;
        if !out_build.status.success() {
            return Err(anyhow::anyhow!(
                "verilator build failed: {}",
                String::from_utf8_lossy(&out_build.stderr)
            ));
        }

        let mut run = Command::new(work_dir.join("obj_dir").join("Vharness"));
        run.current_dir(&work_dir);
        let out_run = execute_command_with_context(run, "Failed to execute Verilator harness")?;
        let report = report_from_run("verilator harness", &out_run);
        if self.keep_temps {
            let _ = dir.keep();
        }
        report
    }
}

impl RtlSimulator for VerilatorSimulator {
    fn dialect(&self) -> HarnessDialect {
        HarnessDialect::Verilator
    }

    fn simulate(&self, top: &str, harness: &str) -> Result<HarnessReport> {
        self.run(top, harness).map_err(simulation_error)
    }
}

pub struct IcarusSimulator {
    pub iverilog: Option<String>,
    pub vvp: Option<String>,
    pub rtl: PathBuf,
    pub keep_temps: bool,
}

impl IcarusSimulator {
    fn compile_and_run(&self, work_dir: &Path, sources: &[PathBuf]) -> anyhow::Result<HarnessReport> {
        let install_hint = "Please install iverilog. On Ubuntu/Debian: 'sudo apt-get install iverilog', on macOS: 'brew install icarus-verilog'";
        let iverilog_path =
            find_and_verify_executable("iverilog", self.iverilog.as_deref(), install_hint)?;
        let vvp_path = find_and_verify_executable("vvp", self.vvp.as_deref(), install_hint)?;
        let vvp_out = work_dir.join("sim.vvp");

        let mut cmd_compile = Command::new(&iverilog_path);
        cmd_compile
            .current_dir(work_dir)
            .arg("-g2012")
            .arg("-o")
            .arg(&vvp_out)
            .arg("-s")
            .arg("tb");
        for src in sources {
            cmd_compile.arg(src);
        }
        let out_compile = execute_command_with_context(cmd_compile, "Failed to execute iverilog")?;
        if !out_compile.status.success() {
            return Err(anyhow::anyhow!(
                "iverilog failed: {}",
                String::from_utf8_lossy(&out_compile.stderr)
            ));
        }

        let mut vvp_cmd = Command::new(&vvp_path);
        vvp_cmd.current_dir(work_dir).arg(&vvp_out);
        let out_sim =
            execute_command_with_context(vvp_cmd, "Failed to execute vvp (Verilog simulator)")?;
        report_from_run("vvp", &out_sim)
    }

    fn run(&self, harness: &str) -> anyhow::Result<HarnessReport> {
        let (dir, work_dir) = make_work_dir(self.keep_temps)?;
        let tb_path = work_dir.join("tb.sv");
        std::fs::write(&tb_path, harness)?;
        let rtl = std::fs::canonicalize(&self.rtl)?;
        let report = self.compile_and_run(&work_dir, &[rtl, tb_path]);
        if self.keep_temps {
            let _ = dir.keep();
        }
        report
    }
}

impl RtlSimulator for IcarusSimulator {
    fn dialect(&self) -> HarnessDialect {
        HarnessDialect::SystemVerilog
    }

    fn simulate(&self, _top: &str, harness: &str) -> Result<HarnessReport> {
        self.run(harness).map_err(simulation_error)
    }
}
