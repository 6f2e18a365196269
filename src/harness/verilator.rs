// SPDX-License-Identifier: Apache-2.0

//! C++ harness against a Verilator-generated model class `V<top>`.
//!
//! Verilator exposes ports of up to 64 bits as scalar members and wider
//! ports as `VlWide` word arrays. Any value wider than 32 bits is first
//! staged in a `<name>_wide` word array and moved to or compared against the
//! model one word at a time.

use crate::bits::WORD_BITS;
use crate::harness::{quote, Check, Drive, InstancePlan, Plan};
use crate::signal::Signal;

const QDATA_BITS: usize = 64;

fn is_vlwide(signal: &Signal) -> bool {
    signal.width() > QDATA_BITS
}

/// Expression reading word `k` of `signal` from the model.
fn word_expr(signal: &Signal, k: usize) -> String {
    if is_vlwide(signal) {
        format!("top->{}[{}]", signal.name, k)
    } else if k == 0 {
        format!("(IData)(top->{})", signal.name)
    } else {
        format!("(IData)(top->{} >> {})", signal.name, k * WORD_BITS)
    }
}

fn wide_decl(signal: &Signal) -> String {
    if is_vlwide(signal) {
        format!("    VlWide<{}> {}_wide;\n", signal.word_count(), signal.name)
    } else {
        format!("    uint32_t {}_wide[{}];\n", signal.name, signal.word_count())
    }
}

fn stage_words(indent: &str, name: &str, words: &[u32]) -> String {
    let mut src = String::new();
    for (k, w) in words.iter().enumerate() {
        src.push_str(&format!("{}{}_wide[{}] = 0x{:08X}u;\n", indent, name, k, w));
    }
    src
}

fn render_drive(indent: &str, drive: &Drive) -> String {
    let signal = drive.signal;
    if !signal.is_wide() {
        return format!(
            "{}top->{} = 0x{}U;\n",
            indent,
            signal.name,
            drive.value.to_hex()
        );
    }
    let words = drive.value.to_words();
    let mut src = stage_words(indent, &signal.name, &words);
    if is_vlwide(signal) {
        for k in 0..words.len() {
            src.push_str(&format!(
                "{}top->{}[{}] = {}_wide[{}];\n",
                indent, signal.name, k, signal.name, k
            ));
        }
    } else {
        src.push_str(&format!(
            "{}top->{} = ((QData){}_wide[1] << 32) | (QData){}_wide[0];\n",
            indent, signal.name, signal.name, signal.name
        ));
    }
    src
}

fn render_check(indent: &str, scenario: &str, cycle: usize, check: &Check) -> String {
    let signal = check.signal;
    let expected = &check.expected;
    let mut src = String::new();
    let (condition, actual_fmt, actual_args) = if signal.is_wide() {
        let words = expected.to_words();
        src.push_str(&stage_words(indent, &signal.name, &words));
        let condition = (0..words.len())
            .map(|k| format!("{} != {}_wide[{}]", word_expr(signal, k), signal.name, k))
            .collect::<Vec<_>>()
            .join(" || ");
        let actual_fmt = "%08X".repeat(words.len());
        let actual_args = (0..words.len())
            .rev()
            .map(|k| format!("(unsigned){}", word_expr(signal, k)))
            .collect::<Vec<_>>()
            .join(", ");
        (condition, actual_fmt, actual_args)
    } else {
        (
            format!("top->{} != 0x{}U", signal.name, expected.to_hex()),
            "%llX".to_string(),
            format!("(unsigned long long)top->{}", signal.name),
        )
    };
    src.push_str(&format!("{}if ({}) {{\n", indent, condition));
    src.push_str(&format!("{}    unpass++;\n", indent));
    src.push_str(&format!(
        "{}    std::printf(\"Mismatch: scenario=%s cycle=%d signal=%s expected=%s (0x%s) actual=0x{}\\n\", {}, {}, {}, {}, {}, {});\n",
        indent,
        actual_fmt,
        quote(scenario),
        cycle,
        quote(&signal.name),
        quote(&expected.to_bitstring()),
        quote(&expected.to_hex()),
        actual_args
    ));
    src.push_str(&format!("{}}}\n", indent));
    src
}

fn render_instance(plan: &Plan, scenario: &str, instance: &InstancePlan, src: &mut String) {
    let clock = &plan.iface.clock;
    let ind = "        ";
    src.push_str("    {\n");
    src.push_str("        const std::unique_ptr<VerilatedContext> contextp{new VerilatedContext};\n");
    src.push_str("        contextp->randReset(0);\n");
    src.push_str(&format!(
        "        const std::unique_ptr<V{top}> top{{new V{top}{{contextp.get()}}}};\n",
        top = plan.top
    ));
    if plan.sequential {
        src.push_str(&format!("        top->{} = 0;\n", clock));
    }
    src.push_str("        top->eval();\n");
    for step in &instance.steps {
        src.push_str(&format!("        // cycle {}\n", step.cycle));
        for drive in &step.drives {
            src.push_str(&render_drive(ind, drive));
        }
        src.push_str("        top->eval();\n");
        if plan.sequential {
            src.push_str("        contextp->timeInc(1);\n");
            src.push_str(&format!("        top->{} = 1;\n", clock));
            src.push_str("        top->eval();\n");
        }
        for check in &step.checks {
            src.push_str(&render_check(ind, scenario, step.cycle, check));
        }
        if plan.sequential {
            src.push_str("        contextp->timeInc(1);\n");
            src.push_str(&format!("        top->{} = 0;\n", clock));
            src.push_str("        top->eval();\n");
        }
    }
    src.push_str("        top->final();\n");
    src.push_str("    }\n");
}

pub(crate) fn render(plan: &Plan) -> String {
    let mut src = String::new();
    src.push_str("// Generated by goldcheck; do not edit.\n");
    src.push_str("#include <cstdint>\n");
    src.push_str("#include <cstdio>\n");
    src.push_str("#include <memory>\n");
    src.push_str("#include <verilated.h>\n");
    src.push_str(&format!("#include \"V{}.h\"\n", plan.top));
    src.push_str("\n");
    src.push_str("int main(int argc, char** argv) {\n");
    src.push_str("    (void)argc;\n");
    src.push_str("    (void)argv;\n");
    src.push_str("    int unpass_total = 0;\n");
    src.push_str("    int unpass = 0;\n");
    for signal in plan.wide_signals() {
        src.push_str(&wide_decl(signal));
    }
    for scenario in &plan.scenarios {
        src.push_str("\n");
        src.push_str(&format!("    // Scenario: {}\n", scenario.name.replace('\n', " ")));
        src.push_str("    unpass = 0;\n");
        for instance in &scenario.instances {
            render_instance(plan, &scenario.name, instance, &mut src);
        }
        src.push_str("    if (unpass == 0) {\n");
        src.push_str(&format!(
            "        std::printf(\"Test passed for scenario %s\\n\", {});\n",
            quote(&scenario.name)
        ));
        src.push_str("    } else {\n");
        src.push_str(&format!(
            "        std::printf(\"Test failed, unpass = %d for scenario %s\\n\", unpass, {});\n",
            quote(&scenario.name)
        ));
        src.push_str("        unpass_total += unpass;\n");
        src.push_str("    }\n");
    }
    src.push_str("\n");
    src.push_str("    std::printf(\"Unpass: %d\\n\", unpass_total);\n");
    src.push_str("    return unpass_total > 255 ? 255 : unpass_total;\n");
    src.push_str("}\n");
    src
}

#[cfg(test)]
mod tests {
    use crate::harness::{render_harness, HarnessDialect, HarnessOptions};
    use crate::signal::{Direction, ModuleInterface, Signal};
    use crate::testbench::{Segment, Steps, TestbenchRecord};

    fn options() -> HarnessOptions {
        HarnessOptions {
            dialect: HarnessDialect::Verilator,
            top_module: None,
        }
    }

    #[test]
    fn test_wide_signals_are_assigned_per_word() {
        let iface = ModuleInterface::new(
            "top_module",
            vec![
                Signal::new("clk", Direction::Input, 1),
                Signal::new("d", Direction::Input, 40),
                Signal::new("w", Direction::Input, 96),
                Signal::new("q", Direction::Output, 40),
            ],
        );
        let ones = "1".repeat(40);
        let top_bit = format!("1{}", "0".repeat(95));
        let records = vec![TestbenchRecord {
            scenario: "wide".into(),
            inputs: Steps::Sequential(vec![Segment::new(1)
                .with_signal("d", &[ones.as_str()])
                .with_signal("w", &[top_bit.as_str()])]),
            outputs: Steps::Sequential(vec![Segment::new(1).with_signal("q", &[ones.as_str()])]),
        }];
        let src = render_harness(&iface, &records, &options()).unwrap();
        assert!(src.contains("    uint32_t d_wide[2];\n"), "{}", src);
        assert!(src.contains("    VlWide<3> w_wide;\n"), "{}", src);
        assert!(src.contains("d_wide[0] = 0xFFFFFFFFu;\n"), "{}", src);
        assert!(src.contains("d_wide[1] = 0x000000FFu;\n"), "{}", src);
        assert!(src.contains("top->d = ((QData)d_wide[1] << 32) | (QData)d_wide[0];"));
        assert!(src.contains("w_wide[2] = 0x80000000u;\n"));
        assert!(src.contains("top->w[2] = w_wide[2];\n"));
        assert!(src.contains("if ((IData)(top->q) != q_wide[0] || (IData)(top->q >> 32) != q_wide[1]) {"));
    }

    #[test]
    fn test_combinational_has_no_clock() {
        let iface = ModuleInterface::new(
            "top_module",
            vec![
                Signal::new("a", Direction::Input, 2),
                Signal::new("y", Direction::Output, 2),
            ],
        );
        let records = vec![TestbenchRecord {
            scenario: "inv".into(),
            inputs: Steps::Combinational(vec![[("a".to_string(), "01".to_string())].into()]),
            outputs: Steps::Combinational(vec![[("y".to_string(), "10".to_string())].into()]),
        }];
        let src = render_harness(&iface, &records, &options()).unwrap();
        assert!(!src.contains("top->clk"));
        assert!(src.contains("top->a = 0x1U;\n"));
        assert!(src.contains("if (top->y != 0x2U) {\n"));
    }
}
