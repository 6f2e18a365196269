// SPDX-License-Identifier: Apache-2.0

//! Module port descriptions and module-header parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bits::{self, BitRange, BitValue, WORD_BITS};
use crate::goldcheck_error::{GoldcheckError, Result};

pub const DEFAULT_CLOCK: &str = "clk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    pub direction: Direction,
    pub range: BitRange,
}

impl Signal {
    /// A signal with the conventional `[width-1:0]` range.
    pub fn new(name: &str, direction: Direction, width: usize) -> Self {
        Signal {
            name: name.to_string(),
            direction,
            range: BitRange::with_width(width),
        }
    }

    pub fn with_range(name: &str, direction: Direction, msb: i64, lsb: i64) -> Self {
        Signal {
            name: name.to_string(),
            direction,
            range: BitRange::new(msb, lsb),
        }
    }

    pub fn width(&self) -> usize {
        self.range.width()
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    /// Wider than one 32-bit word; such values are handled as word arrays.
    pub fn is_wide(&self) -> bool {
        self.width() > WORD_BITS
    }

    pub fn word_count(&self) -> usize {
        bits::word_count(self.width())
    }

    pub fn decode(&self, bitstring: &str) -> Result<BitValue> {
        BitValue::decode_for(&self.name, bitstring, self.width())
    }

    /// Declared part-select `(left, right)` covering word `word`.
    pub fn word_select(&self, word: usize) -> Option<(i64, i64)> {
        bits::word_select(&self.range, word)
    }

    /// The declaration range suffix, e.g. `[7:0]`, or empty for one bit at
    /// index zero.
    pub fn range_decl(&self) -> String {
        if self.range.msb == 0 && self.range.lsb == 0 {
            String::new()
        } else {
            self.range.to_string()
        }
    }
}

/// The ports of the module under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInterface {
    pub name: String,
    pub signals: Vec<Signal>,
    pub clock: String,
}

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)//[^\n]*|/\*.*?\*/").expect("comment regex"));
static MODULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\bmodule\s+(\w+)\s*(?:#\s*\((?:[^()]|\([^()]*\))*\)\s*)?\((.*?)\)\s*;")
        .expect("module regex")
});
static PORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(input|output|inout)\s+)?(?:(?:wire|reg|logic|var)\s+)?(?:(?:signed|unsigned)\s+)?(?:\[\s*(-?\d+)\s*:\s*(-?\d+)\s*\]\s*)?(\w+)$",
    )
    .expect("port regex")
});

impl ModuleInterface {
    pub fn new(name: &str, signals: Vec<Signal>) -> Self {
        ModuleInterface {
            name: name.to_string(),
            signals,
            clock: DEFAULT_CLOCK.to_string(),
        }
    }

    pub fn with_clock(mut self, clock: &str) -> Self {
        self.clock = clock.to_string();
        self
    }

    /// Parses an ANSI-style Verilog/SystemVerilog module header, e.g.
    ///
    /// ```
    /// use goldcheck::signal::ModuleInterface;
    ///
    /// let m = ModuleInterface::parse_header(
    ///     "module top_module(input clk, input [7:0] d, output reg [7:0] q);",
    /// )
    /// .unwrap();
    /// assert_eq!(m.name, "top_module");
    /// assert_eq!(m.signal("q").unwrap().width(), 8);
    /// ```
    ///
    /// Ports without a direction keyword inherit the direction and range of
    /// the preceding declaration, so `input [7:0] a, b` declares two 8-bit
    /// inputs.
    pub fn parse_header(text: &str) -> Result<Self> {
        let text = COMMENT_RE.replace_all(text, " ");
        let caps = MODULE_RE
            .captures(&text)
            .ok_or_else(|| GoldcheckError::MalformedHeader("no module declaration found".into()))?;
        let name = caps[1].to_string();
        let port_list = caps[2].trim();
        let mut signals: Vec<Signal> = Vec::new();
        let mut current: Option<(Direction, BitRange)> = None;
        if port_list.is_empty() {
            return Ok(ModuleInterface::new(&name, signals));
        }
        for raw in port_list.split(',') {
            let decl = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            let port = PORT_RE.captures(&decl).ok_or_else(|| {
                GoldcheckError::MalformedHeader(format!("unrecognized port declaration: {:?}", decl))
            })?;
            let range = match (port.get(2), port.get(3)) {
                (Some(msb), Some(lsb)) => Some(BitRange::new(
                    parse_index(msb.as_str())?,
                    parse_index(lsb.as_str())?,
                )),
                _ => None,
            };
            let port_name = &port[4];
            let (direction, range) = match port.get(1).map(|m| m.as_str()) {
                Some("input") => (Direction::Input, range.unwrap_or(BitRange::with_width(1))),
                Some("output") => (Direction::Output, range.unwrap_or(BitRange::with_width(1))),
                Some(other) => {
                    return Err(GoldcheckError::MalformedHeader(format!(
                        "unsupported port direction `{}` for `{}`",
                        other, port_name
                    )))
                }
                None => match (current, range) {
                    (Some((direction, _)), Some(range)) => (direction, range),
                    (Some(previous), None) => previous,
                    (None, _) => {
                        return Err(GoldcheckError::MalformedHeader(format!(
                            "port `{}` has no direction; non-ANSI headers are not supported",
                            port_name
                        )))
                    }
                },
            };
            if signals.iter().any(|s| s.name == port_name) {
                return Err(GoldcheckError::MalformedHeader(format!(
                    "duplicate port `{}`",
                    port_name
                )));
            }
            current = Some((direction, range));
            signals.push(Signal {
                name: port_name.to_string(),
                direction,
                range,
            });
        }
        log::debug!(
            "parse_header; module {} has {} ports",
            name,
            signals.len()
        );
        Ok(ModuleInterface::new(&name, signals))
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn is_clock(&self, name: &str) -> bool {
        name == self.clock
    }

    /// True if the module has a port named after the clock.
    pub fn has_clock(&self) -> bool {
        self.signal(&self.clock).is_some()
    }

    /// Data inputs, i.e. every input except the clock, in port order.
    pub fn data_inputs(&self) -> impl Iterator<Item = &Signal> {
        self.signals
            .iter()
            .filter(move |s| s.is_input() && !self.is_clock(&s.name))
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| !s.is_input())
    }
}

fn parse_index(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|e| GoldcheckError::MalformedHeader(format!("bad range bound {:?}: {}", s, e)))
}
