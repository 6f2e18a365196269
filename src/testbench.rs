// SPDX-License-Identifier: Apache-2.0

//! Scenario, stimulus, and trace records in their JSON exchange form.
//!
//! A sequential record's steps are segments:
//!
//! ```text
//! { "scenario": "reset", "input variable": [ { "clock cycles": 2, "d": ["0", "1"] } ] }
//! ```
//!
//! and a combinational record's steps are flat per-combination maps:
//!
//! ```text
//! { "scenario": "sum", "input variable": [ { "a": "01", "b": "10" } ] }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bits;
use crate::goldcheck_error::{GoldcheckError, Result};
use crate::signal::{Direction, ModuleInterface, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitKind {
    Combinational,
    Sequential,
}

impl FromStr for CircuitKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "combinational" | "cmb" => Ok(CircuitKind::Combinational),
            "sequential" | "seq" => Ok(CircuitKind::Sequential),
            _ => Err(format!("invalid circuit kind: {}", s)),
        }
    }
}

impl std::fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitKind::Combinational => write!(f, "combinational"),
            CircuitKind::Sequential => write!(f, "sequential"),
        }
    }
}

/// One run of consecutive clock cycles for a sequential scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Absent in candidate output; filled from the stimulus on merge.
    #[serde(rename = "clock cycles", default)]
    pub cycles: usize,
    #[serde(flatten)]
    pub signals: BTreeMap<String, Vec<String>>,
}

impl Segment {
    pub fn new(cycles: usize) -> Self {
        Segment {
            cycles,
            signals: BTreeMap::new(),
        }
    }

    pub fn with_signal(mut self, name: &str, values: &[&str]) -> Self {
        self.signals.insert(
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Value of `name` at `cycle`, after padding has been applied.
    pub fn value_at(&self, name: &str, cycle: usize) -> Option<&str> {
        self.signals
            .get(name)
            .and_then(|values| values.get(cycle))
            .map(String::as_str)
    }
}

/// Single-cycle signal assignments for one combinational step.
pub type StepMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Steps {
    Sequential(Vec<Segment>),
    Combinational(Vec<StepMap>),
}

/// The comparable shape of a scenario's steps: cycles per segment, or the
/// number of combinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Sequential(Vec<usize>),
    Combinational(usize),
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Sequential(cycles) => write!(f, "segments with cycles {:?}", cycles),
            Shape::Combinational(n) => write!(f, "{} combinations", n),
        }
    }
}

impl Steps {
    pub fn empty(kind: CircuitKind) -> Self {
        match kind {
            CircuitKind::Sequential => Steps::Sequential(vec![]),
            CircuitKind::Combinational => Steps::Combinational(vec![]),
        }
    }

    pub fn kind(&self) -> CircuitKind {
        match self {
            Steps::Sequential(_) => CircuitKind::Sequential,
            Steps::Combinational(_) => CircuitKind::Combinational,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Steps::Sequential(segments) => segments.is_empty(),
            Steps::Combinational(steps) => steps.is_empty(),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Steps::Sequential(segments) => {
                Shape::Sequential(segments.iter().map(|s| s.cycles).collect())
            }
            Steps::Combinational(steps) => Shape::Combinational(steps.len()),
        }
    }

    /// The shape as observed in the data itself: for segments, the number of
    /// values actually recorded per signal must agree with the cycle count.
    fn check_recorded_lengths(&self, scenario: &str) -> Result<()> {
        if let Steps::Sequential(segments) = self {
            for (i, segment) in segments.iter().enumerate() {
                for (name, values) in &segment.signals {
                    if values.len() != segment.cycles {
                        return Err(GoldcheckError::ShapeMismatch {
                            scenario: scenario.to_string(),
                            detail: format!(
                                "segment {} signal `{}` has {} values for {} cycles",
                                i,
                                name,
                                values.len(),
                                segment.cycles
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Names of all signals mentioned anywhere in these steps.
    pub fn signal_names(&self) -> BTreeSet<&str> {
        match self {
            Steps::Sequential(segments) => segments
                .iter()
                .flat_map(|s| s.signals.keys().map(String::as_str))
                .collect(),
            Steps::Combinational(steps) => steps
                .iter()
                .flat_map(|s| s.keys().map(String::as_str))
                .collect(),
        }
    }
}

/// Stimulus for one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusRecord {
    pub scenario: String,
    #[serde(rename = "input variable")]
    pub inputs: Steps,
}

/// A candidate's recorded outputs for one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub scenario: String,
    #[serde(rename = "output variable")]
    pub outputs: Steps,
}

/// Stimulus merged with expected outputs; the unit the harness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestbenchRecord {
    pub scenario: String,
    #[serde(rename = "input variable")]
    pub inputs: Steps,
    #[serde(rename = "output variable")]
    pub outputs: Steps,
}

impl TestbenchRecord {
    pub fn kind(&self) -> CircuitKind {
        self.inputs.kind()
    }
}

/// The fixed stimulus every candidate is executed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSet {
    pub kind: CircuitKind,
    pub scenarios: Vec<StimulusRecord>,
}

impl ScenarioSet {
    pub fn new(kind: CircuitKind, mut scenarios: Vec<StimulusRecord>) -> Result<Self> {
        // An empty step list parses as sequential; give it the set's kind.
        for record in scenarios.iter_mut() {
            if record.inputs.is_empty() {
                record.inputs = Steps::empty(kind);
            }
        }
        let mut seen = BTreeSet::new();
        for record in &scenarios {
            if !seen.insert(record.scenario.as_str()) {
                return Err(GoldcheckError::MalformedRecord(format!(
                    "duplicate scenario name `{}`",
                    record.scenario
                )));
            }
            if !record.inputs.is_empty() && record.inputs.kind() != kind {
                return Err(GoldcheckError::MalformedRecord(format!(
                    "scenario `{}` is {} but the set is {}",
                    record.scenario,
                    record.inputs.kind(),
                    kind
                )));
            }
        }
        Ok(ScenarioSet { kind, scenarios })
    }

    /// Parses a JSON list of stimulus records.
    pub fn from_json(kind: CircuitKind, text: &str) -> Result<Self> {
        let scenarios: Vec<StimulusRecord> = serde_json::from_str(text)?;
        ScenarioSet::new(kind, scenarios)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.scenarios)?)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(|s| s.scenario.as_str())
    }

    /// Extends every segment signal to the segment's cycle count by
    /// repeating its last value.
    ///
    /// Values supplied beyond the cycle count are kept but never driven.
    pub fn pad_segments(&mut self) -> Result<()> {
        for record in &mut self.scenarios {
            if let Steps::Sequential(segments) = &mut record.inputs {
                for segment in segments.iter_mut() {
                    let cycles = segment.cycles;
                    for (name, values) in segment.signals.iter_mut() {
                        pad_values(name, values, cycles)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks the stimulus against the module's ports.
    ///
    /// Every data input must be present in every step, with a value of the
    /// declared width made only of `0`/`1`. Clock entries are tolerated and
    /// never driven. Call after [`ScenarioSet::pad_segments`].
    pub fn validate(&self, iface: &ModuleInterface) -> Result<()> {
        for record in &self.scenarios {
            let scenario = record.scenario.as_str();
            for name in record.inputs.signal_names() {
                if iface.is_clock(name) {
                    continue;
                }
                match iface.signal(name) {
                    Some(s) if s.is_input() => {}
                    _ => {
                        return Err(GoldcheckError::UnknownSignal {
                            scenario: scenario.to_string(),
                            signal: name.to_string(),
                        })
                    }
                }
            }
            match &record.inputs {
                Steps::Sequential(segments) => {
                    for (i, segment) in segments.iter().enumerate() {
                        for signal in iface.data_inputs() {
                            let values = segment.signals.get(&signal.name).ok_or_else(|| {
                                missing_signal(scenario, i, &signal.name)
                            })?;
                            if values.len() < segment.cycles {
                                return Err(GoldcheckError::ShapeMismatch {
                                    scenario: scenario.to_string(),
                                    detail: format!(
                                        "segment {} signal `{}` has {} values for {} cycles",
                                        i,
                                        signal.name,
                                        values.len(),
                                        segment.cycles
                                    ),
                                });
                            }
                            for value in values.iter().take(segment.cycles) {
                                signal.decode(value)?;
                            }
                        }
                    }
                }
                Steps::Combinational(steps) => {
                    for (i, step) in steps.iter().enumerate() {
                        for signal in iface.data_inputs() {
                            let value = step
                                .get(&signal.name)
                                .ok_or_else(|| missing_signal(scenario, i, &signal.name))?;
                            signal.decode(value)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn missing_signal(scenario: &str, step: usize, signal: &str) -> GoldcheckError {
    GoldcheckError::ShapeMismatch {
        scenario: scenario.to_string(),
        detail: format!("step {} does not drive input `{}`", step, signal),
    }
}

/// Applies the repeat-last padding rule to one signal's value list.
pub fn pad_values(signal: &str, values: &mut Vec<String>, cycles: usize) -> Result<()> {
    if values.len() >= cycles {
        return Ok(());
    }
    let last = values.last().cloned().ok_or_else(|| {
        GoldcheckError::malformed_signal(
            signal,
            "",
            format!("no values supplied for {} cycles", cycles),
        )
    })?;
    values.resize(cycles, last);
    Ok(())
}

/// Checks an output bit-string: declared width, `0`/`1`, or `x` for a
/// don't-care bit.
pub fn check_output_value(signal: &Signal, value: &str) -> Result<()> {
    if value.len() != signal.width() {
        return Err(GoldcheckError::malformed_signal(
            &signal.name,
            value,
            format!("expected {} bits, got {}", signal.width(), value.len()),
        ));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !matches!(c, '0' | '1' | 'x' | 'X'))
    {
        return Err(GoldcheckError::malformed_signal(
            &signal.name,
            value,
            format!("invalid character {:?}", c),
        ));
    }
    Ok(())
}

/// True if an expected output value constrains the RTL, i.e. holds no
/// don't-care bits.
pub fn is_checkable(value: &str) -> bool {
    bits::is_binary(value)
}

/// Checks that `outputs` has the same shape as `inputs` for `scenario`.
pub fn check_shape(scenario: &str, inputs: &Steps, outputs: &Steps) -> Result<()> {
    if inputs.is_empty() && outputs.is_empty() {
        return Ok(());
    }
    if inputs.shape() != outputs.shape() {
        return Err(GoldcheckError::ShapeMismatch {
            scenario: scenario.to_string(),
            detail: format!(
                "stimulus has {} but trace has {}",
                inputs.shape(),
                outputs.shape()
            ),
        });
    }
    outputs.check_recorded_lengths(scenario)
}

/// Pairs each stimulus scenario with the trace record of the same name.
///
/// A scenario missing from `trace` keeps an empty output list and is not
/// checked. Sequential output segments take the stimulus segment's cycle
/// count.
pub fn merge_testbench(
    stimulus: &ScenarioSet,
    trace: &[TraceRecord],
) -> Result<Vec<TestbenchRecord>> {
    let mut merged = Vec::with_capacity(stimulus.len());
    for record in &stimulus.scenarios {
        let outputs = match trace.iter().find(|t| t.scenario == record.scenario) {
            Some(t) => {
                let mut outputs = t.outputs.clone();
                if let (Steps::Sequential(ins), Steps::Sequential(outs)) =
                    (&record.inputs, &mut outputs)
                {
                    for (input, output) in ins.iter().zip(outs.iter_mut()) {
                        if output.cycles == 0 {
                            output.cycles = input.cycles;
                        }
                    }
                }
                check_shape(&record.scenario, &record.inputs, &outputs)?;
                outputs
            }
            None => {
                log::warn!(
                    "merge_testbench; no trace for scenario `{}`",
                    record.scenario
                );
                Steps::empty(stimulus.kind)
            }
        };
        merged.push(TestbenchRecord {
            scenario: record.scenario.clone(),
            inputs: record.inputs.clone(),
            outputs,
        });
    }
    Ok(merged)
}

/// Parses what a candidate program printed: a JSON list with one element
/// per scenario, in stimulus order.
///
/// Sequential elements are lists of segment maps, combinational elements
/// lists of per-step maps. An element may also be a full trace record
/// (`{"scenario": .., "output variable": ..}`). Segments without a cycle
/// count take the stimulus segment's. A list of the wrong length is
/// returned as-is; the comparison decides what to make of it.
pub fn parse_candidate_output(stimulus: &ScenarioSet, text: &str) -> Result<Vec<Steps>> {
    let elements: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut parsed = Vec::with_capacity(elements.len());
    for (i, mut element) in elements.into_iter().enumerate() {
        if let Some(outputs) = element.get_mut("output variable") {
            element = outputs.take();
        }
        let steps = match stimulus.kind {
            CircuitKind::Sequential => {
                let mut segments: Vec<Segment> = serde_json::from_value(element).map_err(|e| {
                    GoldcheckError::MalformedRecord(format!("scenario element {}: {}", i, e))
                })?;
                if let Some(Steps::Sequential(ins)) =
                    stimulus.scenarios.get(i).map(|r| &r.inputs)
                {
                    for (input, output) in ins.iter().zip(segments.iter_mut()) {
                        if output.cycles == 0 {
                            output.cycles = input.cycles;
                        }
                    }
                }
                Steps::Sequential(segments)
            }
            CircuitKind::Combinational => {
                let steps: Vec<StepMap> = serde_json::from_value(element).map_err(|e| {
                    GoldcheckError::MalformedRecord(format!("scenario element {}: {}", i, e))
                })?;
                Steps::Combinational(steps)
            }
        };
        parsed.push(steps);
    }
    Ok(parsed)
}

/// Derives port widths from the first testbench record, for use when no
/// module header is available. All ranges are `[w-1:0]`.
pub fn infer_interface(
    module_name: &str,
    clock: &str,
    records: &[TestbenchRecord],
) -> Result<ModuleInterface> {
    let first = records
        .first()
        .ok_or_else(|| GoldcheckError::MalformedRecord("empty testbench".into()))?;
    let mut signals = Vec::new();
    let mut push = |name: &str, direction: Direction, width: usize| -> Result<()> {
        if width == 0 {
            return Err(GoldcheckError::malformed_signal(name, "", "zero-width value"));
        }
        signals.push(Signal::new(name, direction, width));
        Ok(())
    };
    // An empty output list reads back from JSON as sequential whatever the
    // record's kind, so only a non-empty one has to agree with the inputs.
    if !first.outputs.is_empty() && first.outputs.kind() != first.inputs.kind() {
        return Err(GoldcheckError::MalformedRecord(format!(
            "scenario `{}` mixes step kinds",
            first.scenario
        )));
    }
    match &first.inputs {
        Steps::Sequential(ins) => {
            if let Some(segment) = ins.first() {
                for (name, values) in &segment.signals {
                    if name == clock {
                        continue;
                    }
                    push(name, Direction::Input, values.first().map_or(0, |v| v.len()))?;
                }
            }
        }
        Steps::Combinational(ins) => {
            if let Some(step) = ins.first() {
                for (name, value) in step {
                    push(name, Direction::Input, value.len())?;
                }
            }
        }
    }
    match &first.outputs {
        Steps::Sequential(outs) => {
            if let Some(segment) = outs.first() {
                for (name, values) in &segment.signals {
                    push(name, Direction::Output, values.first().map_or(0, |v| v.len()))?;
                }
            }
        }
        Steps::Combinational(outs) => {
            if let Some(step) = outs.first() {
                for (name, value) in step {
                    push(name, Direction::Output, value.len())?;
                }
            }
        }
    }
    let mut iface = ModuleInterface::new(module_name, signals).with_clock(clock);
    if first.kind() == CircuitKind::Sequential && !iface.has_clock() {
        iface
            .signals
            .insert(0, Signal::new(clock, Direction::Input, 1));
    }
    Ok(iface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn counter_iface() -> ModuleInterface {
        ModuleInterface::parse_header(
            "module top_module(input clk, input reset, input [3:0] d, output [3:0] q);",
        )
        .unwrap()
    }

    #[test]
    fn test_segment_json_shape() {
        let text = r#"[{"scenario": "s0", "input variable": [{"clock cycles": 2, "reset": ["1", "0"], "d": ["0011", "0100"]}]}]"#;
        let set = ScenarioSet::from_json(CircuitKind::Sequential, text).unwrap();
        assert_eq!(
            set.scenarios[0].inputs,
            Steps::Sequential(vec![Segment::new(2)
                .with_signal("reset", &["1", "0"])
                .with_signal("d", &["0011", "0100"])])
        );
        let back: serde_json::Value = serde_json::from_str(&set.to_json().unwrap()).unwrap();
        assert_eq!(back[0]["input variable"][0]["clock cycles"], 2);
        assert_eq!(back[0]["input variable"][0]["d"][1], "0100");
    }

    #[test]
    fn test_combinational_json_shape() {
        let text = r#"[{"scenario": "add", "input variable": [{"a": "01", "b": "10"}, {"a": "11", "b": "11"}]}]"#;
        let set = ScenarioSet::from_json(CircuitKind::Combinational, text).unwrap();
        assert_eq!(
            set.scenarios[0].inputs,
            Steps::Combinational(vec![
                btreemap! {"a".to_string() => "01".to_string(), "b".to_string() => "10".to_string()},
                btreemap! {"a".to_string() => "11".to_string(), "b".to_string() => "11".to_string()},
            ])
        );
    }

    #[test]
    fn test_kind_mismatch_and_duplicates_rejected() {
        let text = r#"[{"scenario": "add", "input variable": [{"a": "01"}]}]"#;
        assert!(ScenarioSet::from_json(CircuitKind::Sequential, text).is_err());
        let text = r#"[{"scenario": "a", "input variable": []}, {"scenario": "a", "input variable": []}]"#;
        assert!(matches!(
            ScenarioSet::from_json(CircuitKind::Sequential, text),
            Err(GoldcheckError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_padding_repeats_last_value() {
        let mut set = ScenarioSet::new(
            CircuitKind::Sequential,
            vec![StimulusRecord {
                scenario: "pad".into(),
                inputs: Steps::Sequential(vec![Segment::new(5)
                    .with_signal("reset", &["1"])
                    .with_signal("d", &["0001", "0010", "0011"])]),
            }],
        )
        .unwrap();
        set.pad_segments().unwrap();
        let Steps::Sequential(segments) = &set.scenarios[0].inputs else {
            panic!("expected sequential steps");
        };
        assert_eq!(
            segments[0].signals["d"],
            vec!["0001", "0010", "0011", "0011", "0011"]
        );
        assert_eq!(segments[0].signals["reset"], vec!["1"; 5]);
        set.validate(&counter_iface()).unwrap();
    }

    #[test]
    fn test_padding_empty_list_is_malformed() {
        let mut values: Vec<String> = vec![];
        assert!(matches!(
            pad_values("d", &mut values, 3),
            Err(GoldcheckError::MalformedSignal { .. })
        ));
        // Zero cycles needs nothing.
        pad_values("d", &mut values, 0).unwrap();
    }

    #[test]
    fn test_validate_rejects_dont_care_in_stimulus() {
        let set = ScenarioSet::new(
            CircuitKind::Sequential,
            vec![StimulusRecord {
                scenario: "x".into(),
                inputs: Steps::Sequential(vec![Segment::new(1)
                    .with_signal("reset", &["0"])
                    .with_signal("d", &["00x0"])]),
            }],
        )
        .unwrap();
        assert!(matches!(
            set.validate(&counter_iface()),
            Err(GoldcheckError::MalformedSignal { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_and_missing_signals() {
        let unknown = ScenarioSet::new(
            CircuitKind::Sequential,
            vec![StimulusRecord {
                scenario: "u".into(),
                inputs: Steps::Sequential(vec![Segment::new(1)
                    .with_signal("reset", &["0"])
                    .with_signal("d", &["0000"])
                    .with_signal("q", &["0000"])]),
            }],
        )
        .unwrap();
        assert!(matches!(
            unknown.validate(&counter_iface()),
            Err(GoldcheckError::UnknownSignal { .. })
        ));

        let missing = ScenarioSet::new(
            CircuitKind::Sequential,
            vec![StimulusRecord {
                scenario: "m".into(),
                inputs: Steps::Sequential(vec![Segment::new(1).with_signal("d", &["0000"])]),
            }],
        )
        .unwrap();
        assert!(matches!(
            missing.validate(&counter_iface()),
            Err(GoldcheckError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_check_output_value_allows_dont_care() {
        let q = Signal::new("q", Direction::Output, 4);
        check_output_value(&q, "1x0X").unwrap();
        assert!(check_output_value(&q, "1z00").is_err());
        assert!(check_output_value(&q, "100").is_err());
        assert!(!is_checkable("1x00"));
        assert!(is_checkable("1000"));
    }

    #[test]
    fn test_merge_testbench_by_name() {
        let set = ScenarioSet::new(
            CircuitKind::Sequential,
            vec![
                StimulusRecord {
                    scenario: "a".into(),
                    inputs: Steps::Sequential(vec![Segment::new(2).with_signal("d", &["0", "1"])]),
                },
                StimulusRecord {
                    scenario: "b".into(),
                    inputs: Steps::Sequential(vec![Segment::new(1).with_signal("d", &["1"])]),
                },
            ],
        )
        .unwrap();
        let trace = vec![TraceRecord {
            scenario: "a".into(),
            outputs: Steps::Sequential(vec![Segment::new(2).with_signal("q", &["0", "0"])]),
        }];
        let merged = merge_testbench(&set, &trace).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].outputs, trace[0].outputs);
        assert!(merged[1].outputs.is_empty());

        let short = vec![TraceRecord {
            scenario: "a".into(),
            outputs: Steps::Sequential(vec![Segment::new(2).with_signal("q", &["0"])]),
        }];
        assert!(matches!(
            merge_testbench(&set, &short),
            Err(GoldcheckError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_infer_interface_from_first_record() {
        let records = vec![TestbenchRecord {
            scenario: "a".into(),
            inputs: Steps::Sequential(vec![Segment::new(1)
                .with_signal("clk", &["0"])
                .with_signal("d", &["0101"])]),
            outputs: Steps::Sequential(vec![Segment::new(1).with_signal("q", &["01010101"])]),
        }];
        let iface = infer_interface("top_module", "clk", &records).unwrap();
        assert!(iface.has_clock());
        assert_eq!(iface.signal("d").unwrap().width(), 4);
        assert_eq!(iface.signal("q").unwrap().width(), 8);
        assert_eq!(iface.signal("q").unwrap().direction, Direction::Output);
    }

    #[test]
    fn test_parse_candidate_output_inherits_cycles() {
        let set = ScenarioSet::new(
            CircuitKind::Sequential,
            vec![StimulusRecord {
                scenario: "a".into(),
                inputs: Steps::Sequential(vec![Segment::new(2).with_signal("d", &["0", "1"])]),
            }],
        )
        .unwrap();
        let text = r#"[[{"q": ["0", "1"]}], {"scenario": "extra", "output variable": [{"clock cycles": 1, "q": ["1"]}]}]"#;
        let parsed = parse_candidate_output(&set, text).unwrap();
        assert_eq!(
            parsed,
            vec![
                Steps::Sequential(vec![Segment::new(2).with_signal("q", &["0", "1"])]),
                Steps::Sequential(vec![Segment::new(1).with_signal("q", &["1"])]),
            ]
        );
        assert!(matches!(
            parse_candidate_output(&set, r#"[[{"q": "0"}]]"#),
            Err(GoldcheckError::MalformedRecord(_))
        ));
    }
}
