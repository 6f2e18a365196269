// SPDX-License-Identifier: Apache-2.0

//! Self-checking SystemVerilog testbench (`module tb`).
//!
//! Each sequential segment, or each combinational scenario, gets its own DUT
//! instance with private stimulus registers so no state carries over. Wide
//! values are assigned and compared through part-selects of the port's own
//! declared range, one 32-bit word at a time.

use crate::bits::{BitValue, WORD_BITS};
use crate::harness::{quote, Check, Drive, Plan};
use crate::signal::Signal;

fn literal(width: usize, hex: &str) -> String {
    format!("{}'h{}", width, hex)
}

/// `(part-select, literal)` pairs covering `value`, word 0 first.
fn word_slices(prefix: &str, signal: &Signal, value: &BitValue) -> Vec<(String, String)> {
    value
        .to_words()
        .iter()
        .enumerate()
        .filter_map(|(k, w)| {
            let (left, right) = signal.word_select(k)?;
            let width = std::cmp::min(WORD_BITS, signal.width() - k * WORD_BITS);
            let digits = (width + 3) / 4;
            Some((
                format!("{}{}[{}:{}]", prefix, signal.name, left, right),
                literal(width, &format!("{:0digits$X}", w, digits = digits)),
            ))
        })
        .collect()
}

fn render_drive(indent: &str, prefix: &str, drive: &Drive) -> String {
    let signal = drive.signal;
    if !signal.is_wide() {
        return format!(
            "{}{}{} = {};\n",
            indent,
            prefix,
            signal.name,
            literal(signal.width(), &drive.value.to_hex())
        );
    }
    word_slices(prefix, signal, &drive.value)
        .into_iter()
        .map(|(select, lit)| format!("{}{} = {};\n", indent, select, lit))
        .collect()
}

fn render_check(indent: &str, prefix: &str, scenario: &str, cycle: usize, check: &Check) -> String {
    let signal = check.signal;
    let expected = &check.expected;
    let condition = if signal.is_wide() {
        word_slices(prefix, signal, expected)
            .into_iter()
            .map(|(select, lit)| format!("{} !== {}", select, lit))
            .collect::<Vec<_>>()
            .join(" || ")
    } else {
        format!(
            "{}{} !== {}",
            prefix,
            signal.name,
            literal(signal.width(), &expected.to_hex())
        )
    };
    let mut src = String::new();
    src.push_str(&format!("{}if ({}) begin\n", indent, condition));
    src.push_str(&format!("{}  unpass = unpass + 1;\n", indent));
    src.push_str(&format!(
        "{}  $display(\"Mismatch: scenario=%s cycle=%0d signal=%s expected=%s (0x%s) actual=0x%h\", {}, {}, {}, {}, {}, {}{});\n",
        indent,
        quote(scenario),
        cycle,
        quote(&signal.name),
        quote(&expected.to_bitstring()),
        quote(&expected.to_hex()),
        prefix,
        signal.name
    ));
    src.push_str(&format!("{}end\n", indent));
    src
}

fn declare_instance(plan: &Plan, prefix: &str, instance: &str, src: &mut String) {
    let iface = plan.iface;
    let mut connections = Vec::new();
    for signal in &iface.signals {
        let kind = if signal.is_input() { "reg" } else { "wire" };
        let range = signal.range_decl();
        let range = if range.is_empty() {
            String::new()
        } else {
            format!("{} ", range)
        };
        if signal.is_input() {
            src.push_str(&format!(
                "  {} {}{}{} = '0;\n",
                kind, range, prefix, signal.name
            ));
        } else {
            src.push_str(&format!("  {} {}{}{};\n", kind, range, prefix, signal.name));
        }
        connections.push(format!(".{}({}{})", signal.name, prefix, signal.name));
    }
    src.push_str(&format!(
        "  {} {} ({});\n",
        plan.top,
        instance,
        connections.join(", ")
    ));
}

pub(crate) fn render(plan: &Plan) -> String {
    let clock = &plan.iface.clock;
    let mut decls = String::new();
    let mut body = String::new();
    let ind = "    ";
    for (s, scenario) in plan.scenarios.iter().enumerate() {
        body.push_str(&format!("    // Scenario: {}\n", scenario.name.replace('\n', " ")));
        body.push_str("    unpass = 0;\n");
        for (g, instance) in scenario.instances.iter().enumerate() {
            let prefix = format!("s{}_{}_", s, g);
            declare_instance(plan, &prefix, &format!("dut_s{}_{}", s, g), &mut decls);
            for step in &instance.steps {
                body.push_str(&format!("    // cycle {}\n", step.cycle));
                if plan.sequential {
                    body.push_str(&format!("    {}{} = 1'b0;\n", prefix, clock));
                }
                for drive in &step.drives {
                    body.push_str(&render_drive(ind, &prefix, drive));
                }
                body.push_str("    #1;\n");
                if plan.sequential {
                    body.push_str(&format!("    {}{} = 1'b1;\n", prefix, clock));
                    body.push_str("    #1;\n");
                }
                for check in &step.checks {
                    body.push_str(&render_check(ind, &prefix, &scenario.name, step.cycle, check));
                }
                if plan.sequential {
                    body.push_str(&format!("    {}{} = 1'b0;\n", prefix, clock));
                    body.push_str("    #1;\n");
                }
            }
        }
        body.push_str("    if (unpass == 0) begin\n");
        body.push_str(&format!(
            "      $display(\"Test passed for scenario %s\", {});\n",
            quote(&scenario.name)
        ));
        body.push_str("    end else begin\n");
        body.push_str(&format!(
            "      $display(\"Test failed, unpass = %0d for scenario %s\", unpass, {});\n",
            quote(&scenario.name)
        ));
        body.push_str("      unpass_total = unpass_total + unpass;\n");
        body.push_str("    end\n");
    }

    let mut src = String::new();
    src.push_str("// Generated by goldcheck; do not edit.\n");
    src.push_str("`timescale 1ns/1ps\n");
    src.push_str("module tb;\n");
    src.push_str("  integer unpass_total = 0;\n");
    src.push_str("  integer unpass = 0;\n");
    src.push_str(&decls);
    src.push_str("  initial begin\n");
    src.push_str(&body);
    src.push_str("    $display(\"Unpass: %0d\", unpass_total);\n");
    src.push_str("    $finish;\n");
    src.push_str("  end\n");
    src.push_str("endmodule\n");
    src
}
