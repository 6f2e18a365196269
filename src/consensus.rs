// SPDX-License-Identifier: Apache-2.0

//! Pairwise trace comparison across candidates and reduction of the
//! disagreements to the candidate indices that need adjudication.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::capture::{CandidateTrace, ScenarioOutcome};
use crate::goldcheck_error::{GoldcheckError, Result};
use crate::testbench::{check_shape, ScenarioSet, Steps};

/// What one candidate produced for one scenario, as seen by the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    Trace(Steps),
    /// The candidate raised a runtime error on this scenario.
    Failed(String),
    /// The candidate completed but its trace does not fit the stimulus.
    Malformed(String),
}

impl Observation {
    fn is_comparable(&self) -> bool {
        matches!(self, Observation::Trace(_))
    }
}

/// Evidence that candidates `pair.0` and `pair.1` differ on `scenario`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisagreementRecord {
    pub scenario: String,
    pub pair: (usize, usize),
    pub left: Observation,
    pub right: Observation,
}

/// The adjudication target derived from the disagreement tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// No disagreements; the lowest-indexed candidate is canonical.
    Unanimous(usize),
    /// The tally has the single-outlier shape; one representative.
    Majority(usize),
    /// No clean majority; every implicated index, sorted.
    Implicated(Vec<usize>),
}

impl Selection {
    /// The selected indices; never empty.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            Selection::Unanimous(i) | Selection::Majority(i) => vec![*i],
            Selection::Implicated(v) => v.clone(),
        }
    }

    /// The candidate forwarded to adjudication: the first selected index.
    pub fn representative(&self) -> usize {
        match self {
            Selection::Unanimous(i) | Selection::Majority(i) => *i,
            Selection::Implicated(v) => v[0],
        }
    }

    pub fn is_unanimous(&self) -> bool {
        matches!(self, Selection::Unanimous(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusReport {
    pub disagreements: Vec<DisagreementRecord>,
    /// Number of distinct disagreeing pairs each index takes part in.
    pub occurs_in: BTreeMap<usize, usize>,
    pub selection: Selection,
}

fn observe(stimulus: &ScenarioSet, trace: &CandidateTrace, scenario: usize) -> Observation {
    let record = &stimulus.scenarios[scenario];
    match trace.outcomes.get(scenario) {
        None => Observation::Malformed(format!(
            "trace has {} scenarios, stimulus has {}",
            trace.outcomes.len(),
            stimulus.len()
        )),
        Some(ScenarioOutcome::Failed(reason)) => Observation::Failed(reason.clone()),
        Some(ScenarioOutcome::Completed(steps)) => {
            if trace.outcomes.len() != stimulus.len() {
                return Observation::Malformed(format!(
                    "trace has {} scenarios, stimulus has {}",
                    trace.outcomes.len(),
                    stimulus.len()
                ));
            }
            match check_shape(&record.scenario, &record.inputs, steps) {
                Ok(()) => Observation::Trace(steps.clone()),
                Err(e) => Observation::Malformed(e.to_string()),
            }
        }
    }
}

/// Compares every pair of candidates on every scenario.
///
/// Failed or malformed observations never compare equal, not even to each
/// other, so a broken candidate disagrees with every other candidate on the
/// scenarios it breaks without aborting the comparison of the rest.
pub fn find_disagreements(
    stimulus: &ScenarioSet,
    traces: &[CandidateTrace],
) -> Vec<DisagreementRecord> {
    let mut ordered: Vec<&CandidateTrace> = traces.iter().collect();
    ordered.sort_by_key(|t| t.candidate);
    let mut records = Vec::new();
    for (s, record) in stimulus.scenarios.iter().enumerate() {
        let observations: Vec<Observation> =
            ordered.iter().map(|t| observe(stimulus, t, s)).collect();
        for a in 0..ordered.len() {
            for b in (a + 1)..ordered.len() {
                let (left, right) = (&observations[a], &observations[b]);
                let agree = left.is_comparable() && left == right;
                if !agree {
                    records.push(DisagreementRecord {
                        scenario: record.scenario.clone(),
                        pair: (ordered[a].candidate, ordered[b].candidate),
                        left: left.clone(),
                        right: right.clone(),
                    });
                }
            }
        }
    }
    records
}

/// Reduces disagreement records to the adjudication target.
///
/// Each distinct pair counts once per index however many scenarios it
/// disagrees on. With no disagreements the lowest index is returned. The
/// single-index branch fires when the most-implicated indices number one
/// fewer than all implicated indices, or when a single index disagrees with
/// every other implicated index and those agree among themselves; it returns
/// the lowest most-implicated index. Every other tally returns all
/// implicated indices.
pub fn select_from(
    disagreements: &[DisagreementRecord],
    all_indices: &[usize],
) -> Result<(BTreeMap<usize, usize>, Selection)> {
    let first = *all_indices.iter().min().ok_or(GoldcheckError::NoCandidates)?;
    let pairs: BTreeSet<(usize, usize)> = disagreements.iter().map(|d| d.pair).collect();
    if pairs.is_empty() {
        return Ok((BTreeMap::new(), Selection::Unanimous(first)));
    }
    let mut occurs_in: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, j) in &pairs {
        *occurs_in.entry(*i).or_default() += 1;
        *occurs_in.entry(*j).or_default() += 1;
    }
    let max_count = occurs_in.values().copied().max().unwrap_or(0);
    let majority: Vec<usize> = occurs_in
        .iter()
        .filter(|(_, count)| **count == max_count)
        .map(|(idx, _)| *idx)
        .collect();
    let implicated = occurs_in.len();
    let one_less_implicated = majority.len() + 1 == implicated;
    let lone_outlier = majority.len() == 1
        && max_count + 1 == implicated
        && occurs_in
            .values()
            .filter(|count| **count != max_count)
            .all(|count| *count == 1);
    let selection = if one_less_implicated || lone_outlier {
        Selection::Majority(majority[0])
    } else {
        Selection::Implicated(occurs_in.keys().copied().collect())
    };
    log::info!(
        "consensus; {} distinct disagreeing pairs, occurs_in {:?}, selection {:?}",
        pairs.len(),
        occurs_in,
        selection
    );
    Ok((occurs_in, selection))
}

/// Compares all candidate traces and selects the adjudication target.
///
/// Requires every candidate's trace; this is the barrier between capture and
/// adjudication.
pub fn select(stimulus: &ScenarioSet, traces: &[CandidateTrace]) -> Result<ConsensusReport> {
    if traces.is_empty() {
        return Err(GoldcheckError::NoCandidates);
    }
    let disagreements = find_disagreements(stimulus, traces);
    let indices: Vec<usize> = traces.iter().map(|t| t.candidate).collect();
    let (occurs_in, selection) = select_from(&disagreements, &indices)?;
    Ok(ConsensusReport {
        disagreements,
        occurs_in,
        selection,
    })
}
