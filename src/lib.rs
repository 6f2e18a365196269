// SPDX-License-Identifier: Apache-2.0

//! Consensus checking and co-simulation for synthesized hardware reference
//! models.
//!
//! Several independently generated candidates are run against a shared
//! stimulus, their traces compared pairwise, and the candidate picked by
//! the disagreement tally is adjudicated and, optionally, validated against
//! RTL through a generated harness.

pub mod bits;
pub mod capture;
pub mod consensus;
pub mod goldcheck_error;
pub mod harness;
pub mod oracle;
pub mod orchestrator;
pub mod signal;
pub mod testbench;

pub use bits::{BitRange, BitValue};
pub use capture::{capture_traces, Candidate, CandidateExecutor, CandidateTrace, CycleModel};
pub use consensus::{select, ConsensusReport, Selection};
pub use goldcheck_error::GoldcheckError;
pub use harness::{parse_harness_log, render_harness, HarnessDialect, HarnessReport};
pub use oracle::{AdjudicationOracle, SynthesisOracle, Verdict};
pub use orchestrator::{Refinement, RefinementConfig, RefinementOutcome};
pub use signal::{Direction, ModuleInterface, Signal};
pub use testbench::{CircuitKind, ScenarioSet, TestbenchRecord};
