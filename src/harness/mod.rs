// SPDX-License-Identifier: Apache-2.0

//! Co-simulation harness synthesis.
//!
//! A harness is rendered from the module's ports and a merged testbench as a
//! pure function of its inputs. Every dialect honors one contract:
//!
//! - one fresh RTL instance per sequential segment or combinational
//!   scenario;
//! - sequential cycles drive the clock low, apply inputs, raise the clock,
//!   check every constrained output, then lower the clock again;
//! - signals wider than 32 bits are assigned and compared word by word;
//! - every mismatch increments the scenario's count and prints a
//!   `Mismatch: ...` diagnostic, and evaluation always continues;
//! - each scenario ends with `Test passed for scenario <name>` or
//!   `Test failed, unpass = <n> for scenario <name>`, and the run ends with
//!   `Unpass: <total>`.

pub mod sv;
pub mod verilator;

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::bits::BitValue;
use crate::goldcheck_error::{GoldcheckError, Result};
use crate::signal::{ModuleInterface, Signal};
use crate::testbench::{self, pad_values, Segment, StepMap, Steps, TestbenchRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarnessDialect {
    /// C++ driving a Verilator-generated model.
    Verilator,
    /// A self-checking SystemVerilog `tb` module, e.g. for Icarus Verilog.
    SystemVerilog,
}

impl FromStr for HarnessDialect {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "verilator" => Ok(HarnessDialect::Verilator),
            "sv" | "systemverilog" => Ok(HarnessDialect::SystemVerilog),
            _ => Err(format!("invalid harness dialect: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub dialect: HarnessDialect,
    /// Overrides the module name taken from the interface.
    pub top_module: Option<String>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        HarnessOptions {
            dialect: HarnessDialect::Verilator,
            top_module: None,
        }
    }
}

/// One input assignment.
pub(crate) struct Drive<'a> {
    pub signal: &'a Signal,
    pub value: BitValue,
}

/// One expected output value.
pub(crate) struct Check<'a> {
    pub signal: &'a Signal,
    pub expected: BitValue,
}

pub(crate) struct StepPlan<'a> {
    pub cycle: usize,
    pub drives: Vec<Drive<'a>>,
    pub checks: Vec<Check<'a>>,
}

/// Work for one fresh RTL instance.
pub(crate) struct InstancePlan<'a> {
    pub steps: Vec<StepPlan<'a>>,
}

pub(crate) struct ScenarioPlan<'a> {
    pub name: String,
    pub instances: Vec<InstancePlan<'a>>,
}

pub(crate) struct Plan<'a> {
    pub top: String,
    pub iface: &'a ModuleInterface,
    pub sequential: bool,
    pub scenarios: Vec<ScenarioPlan<'a>>,
}

impl<'a> Plan<'a> {
    /// Ports wider than one word, in port order.
    pub fn wide_signals(&self) -> impl Iterator<Item = &'a Signal> + '_ {
        self.iface
            .signals
            .iter()
            .filter(move |s| s.is_wide() && !self.iface.is_clock(&s.name))
    }
}

fn plan_drives<'a, 'v>(
    iface: &'a ModuleInterface,
    scenario: &str,
    value_of: impl Fn(&str) -> Option<&'v str>,
) -> Result<Vec<Drive<'a>>> {
    let mut drives = Vec::new();
    for signal in iface.data_inputs() {
        let value = match value_of(&signal.name) {
            Some(v) => v,
            None => continue,
        };
        if !crate::bits::is_binary(value) {
            log::warn!(
                "harness; scenario `{}` input `{}` value {:?} is not driven",
                scenario,
                signal.name,
                value
            );
            continue;
        }
        drives.push(Drive {
            signal,
            value: signal.decode(value)?,
        });
    }
    Ok(drives)
}

fn plan_checks<'a, 'v>(
    iface: &'a ModuleInterface,
    value_of: impl Fn(&str) -> Option<&'v str>,
) -> Result<Vec<Check<'a>>> {
    let mut checks = Vec::new();
    for signal in iface.outputs() {
        let value = match value_of(&signal.name) {
            Some(v) => v,
            None => continue,
        };
        testbench::check_output_value(signal, value)?;
        if !testbench::is_checkable(value) {
            continue;
        }
        checks.push(Check {
            signal,
            expected: signal.decode(value)?,
        });
    }
    Ok(checks)
}

fn check_known_signals(iface: &ModuleInterface, record: &TestbenchRecord) -> Result<()> {
    for name in record.inputs.signal_names() {
        if iface.is_clock(name) {
            continue;
        }
        if !iface.signal(name).map_or(false, |s| s.is_input()) {
            return Err(GoldcheckError::UnknownSignal {
                scenario: record.scenario.clone(),
                signal: name.to_string(),
            });
        }
    }
    for name in record.outputs.signal_names() {
        if !iface.signal(name).map_or(false, |s| !s.is_input()) {
            return Err(GoldcheckError::UnknownSignal {
                scenario: record.scenario.clone(),
                signal: name.to_string(),
            });
        }
    }
    Ok(())
}

pub(crate) fn plan<'a>(
    iface: &'a ModuleInterface,
    records: &[TestbenchRecord],
    options: &HarnessOptions,
) -> Result<Plan<'a>> {
    let sequential = records
        .iter()
        .find(|r| !r.inputs.is_empty())
        .map_or(false, |r| matches!(r.inputs, Steps::Sequential(_)));
    if sequential && !iface.has_clock() {
        return Err(GoldcheckError::MalformedHeader(format!(
            "sequential harness needs clock port `{}` on module `{}`",
            iface.clock, iface.name
        )));
    }
    let mut scenarios = Vec::with_capacity(records.len());
    for record in records {
        check_known_signals(iface, record)?;
        if !record.outputs.is_empty() {
            testbench::check_shape(&record.scenario, &record.inputs, &record.outputs)?;
        }
        let scenario = record.scenario.as_str();
        let instances = match &record.inputs {
            Steps::Sequential(segments) => {
                let expected: &[Segment] = match &record.outputs {
                    Steps::Sequential(outs) => outs.as_slice(),
                    _ => &[],
                };
                let mut instances = Vec::with_capacity(segments.len());
                for (i, segment) in segments.iter().enumerate() {
                    let mut padded = segment.clone();
                    for (name, values) in padded.signals.iter_mut() {
                        pad_values(name, values, segment.cycles)?;
                    }
                    let mut steps = Vec::with_capacity(segment.cycles);
                    for cycle in 0..segment.cycles {
                        let drives =
                            plan_drives(iface, scenario, |name| padded.value_at(name, cycle))?;
                        let checks = match expected.get(i) {
                            Some(out) => plan_checks(iface, |name| out.value_at(name, cycle))?,
                            None => vec![],
                        };
                        steps.push(StepPlan {
                            cycle,
                            drives,
                            checks,
                        });
                    }
                    instances.push(InstancePlan { steps });
                }
                instances
            }
            Steps::Combinational(combos) => {
                let expected: &[StepMap] = match &record.outputs {
                    Steps::Combinational(outs) => outs.as_slice(),
                    _ => &[],
                };
                let mut steps = Vec::with_capacity(combos.len());
                for (cycle, combo) in combos.iter().enumerate() {
                    let drives =
                        plan_drives(iface, scenario, |name| combo.get(name).map(String::as_str))?;
                    let checks = match expected.get(cycle) {
                        Some(out) => plan_checks(iface, |name| out.get(name).map(String::as_str))?,
                        None => vec![],
                    };
                    steps.push(StepPlan {
                        cycle,
                        drives,
                        checks,
                    });
                }
                vec![InstancePlan { steps }]
            }
        };
        scenarios.push(ScenarioPlan {
            name: record.scenario.clone(),
            instances,
        });
    }
    Ok(Plan {
        top: options
            .top_module
            .clone()
            .unwrap_or_else(|| iface.name.clone()),
        iface,
        sequential,
        scenarios,
    })
}

/// Renders a harness for `records` in the requested dialect.
pub fn render_harness(
    iface: &ModuleInterface,
    records: &[TestbenchRecord],
    options: &HarnessOptions,
) -> Result<String> {
    let plan = plan(iface, records, options)?;
    log::info!(
        "render_harness; {:?} harness for `{}` with {} scenarios",
        options.dialect,
        plan.top,
        plan.scenarios.len()
    );
    Ok(match options.dialect {
        HarnessDialect::Verilator => verilator::render(&plan),
        HarnessDialect::SystemVerilog => sv::render(&plan),
    })
}

/// Escapes `s` for use inside a C or SystemVerilog string literal.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    pub scenario: String,
    pub unpass: usize,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.unpass == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub scenario: String,
    pub cycle: usize,
    pub signal: String,
    pub expected: String,
    pub actual: String,
}

/// What a harness run reported on its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarnessReport {
    pub scenarios: Vec<ScenarioResult>,
    pub mismatches: Vec<Mismatch>,
    /// The `Unpass:` total, if the harness got far enough to print it.
    pub total_unpass: Option<usize>,
}

impl HarnessReport {
    /// A run succeeds only when it reported `Unpass: 0`.
    pub fn passed(&self) -> bool {
        self.total_unpass == Some(0)
    }

    pub fn failed_scenarios(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.scenarios.iter().filter(|s| !s.passed())
    }
}

static PASSED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Test passed for scenario (.*)$").expect("passed regex"));
static FAILED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Test failed,\s*unpass = (\d+) for scenario (.*)$").expect("failed regex")
});
static TOTAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Unpass: (\d+)").expect("total regex"));
static MISMATCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^Mismatch: scenario=(.*) cycle=(\d+) signal=(\S+) expected=(\S+) \(0x[0-9A-Fa-f]+\) actual=(\S+)$",
    )
    .expect("mismatch regex")
});

/// Parses the output of a harness run. Unrecognized lines are ignored.
pub fn parse_harness_log(text: &str) -> HarnessReport {
    let mut report = HarnessReport::default();
    for line in text.lines() {
        let line = line.trim_end();
        if let Some(caps) = PASSED_RE.captures(line) {
            report.scenarios.push(ScenarioResult {
                scenario: caps[1].to_string(),
                unpass: 0,
            });
        } else if let Some(caps) = FAILED_RE.captures(line) {
            report.scenarios.push(ScenarioResult {
                scenario: caps[2].to_string(),
                unpass: caps[1].parse().unwrap_or(usize::MAX),
            });
        } else if let Some(caps) = MISMATCH_RE.captures(line) {
            report.mismatches.push(Mismatch {
                scenario: caps[1].to_string(),
                cycle: caps[2].parse().unwrap_or(usize::MAX),
                signal: caps[3].to_string(),
                expected: caps[4].to_string(),
                actual: caps[5].to_string(),
            });
        } else if let Some(caps) = TOTAL_RE.captures(line) {
            report.total_unpass = caps[1].parse().ok();
        }
    }
    report
}

/// Runs a rendered harness against an RTL design.
pub trait RtlSimulator: Send + Sync {
    fn dialect(&self) -> HarnessDialect;

    /// Builds and runs `harness` for top module `top`, returning its report.
    fn simulate(&self, top: &str, harness: &str) -> Result<HarnessReport>;
}
