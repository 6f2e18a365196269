// SPDX-License-Identifier: Apache-2.0

//! Rendered harnesses for a small combinational design, checked against
//! golden files.

use goldcheck::harness::{render_harness, HarnessDialect, HarnessOptions};
use goldcheck::signal::ModuleInterface;
use goldcheck::testbench::TestbenchRecord;
use goldcheck_test_helpers::compare_golden_text;
use test_case::test_case;

const HEADER: &str = "module and_gate(input a, input b, output y);";

const TESTBENCH: &str = r#"[
  {
    "scenario": "t",
    "input variable": [{"a": "1", "b": "1"}, {"a": "0", "b": "1"}],
    "output variable": [{"y": "1"}, {"y": "0"}]
  }
]"#;

#[test_case(HarnessDialect::Verilator, "tests/goldens/and_gate_harness.cpp"; "verilator")]
#[test_case(HarnessDialect::SystemVerilog, "tests/goldens/and_gate_tb.sv"; "systemverilog")]
fn test_and_gate_harness_matches_golden(dialect: HarnessDialect, golden: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let iface = ModuleInterface::parse_header(HEADER).unwrap();
    let records: Vec<TestbenchRecord> = serde_json::from_str(TESTBENCH).unwrap();
    let options = HarnessOptions {
        dialect,
        top_module: None,
    };
    let got = render_harness(&iface, &records, &options).unwrap();
    compare_golden_text(&got, golden);
}

#[test]
fn test_unknown_output_is_rejected_before_rendering() {
    let iface = ModuleInterface::parse_header(HEADER).unwrap();
    let records: Vec<TestbenchRecord> = serde_json::from_str(
        r#"[{"scenario": "t", "input variable": [{"a": "1", "b": "1"}], "output variable": [{"z": "1"}]}]"#,
    )
    .unwrap();
    let err = render_harness(&iface, &records, &HarnessOptions::default()).unwrap_err();
    assert!(err.to_string().contains("z"), "{}", err);
}
