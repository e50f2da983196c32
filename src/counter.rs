//! # Counter Adjustment Engine
//!
//! Turns operator decisions on proposed assignments into assignment records.
//! Rejections bump a per-request counter (unless a phase tag forces a value);
//! acceptances carry the current counter through. Identical submissions are
//! suppressed against the full assignment history.
//!
//! The engine is a sequential fold: a rejection updates the group's running
//! maximum, so later rows of the same run observe it. Row order matters.

use crate::config::{ColumnConfig, PhaseConfig};
use crate::model::{AssignmentRecord, Decision, RemoteId, SkipReason, SourceRow};
use crate::pushid::{Clock, PushIdGenerator};
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Decision labels whose history entries take part in duplicate suppression.
const TRACKED_LABELS: [&str; 4] = ["NO", "SI", "SÌ", "PROPOSTA DA ELABORARE"];

/// Duplicate-suppression key `group_decision_subject_timeslot`.
pub fn duplicate_key(group_id: &str, decision: &str, subject: &str, timeslot: &str) -> String {
    format!("{group_id}_{decision}_{subject}_{timeslot}")
}

/// Result of the history scan.
#[derive(Debug, Clone, Default)]
pub struct CounterHistory {
    seen: HashSet<String>,
    max_counters: HashMap<String, u32>,
}

impl CounterHistory {
    /// Highest counter recorded for a group; 0 when the group is unknown.
    pub fn max_for(&self, group_id: &str) -> u32 {
        self.max_counters.get(group_id).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn groups(&self) -> usize {
        self.max_counters.len()
    }

    fn mark(&mut self, key: String) {
        self.seen.insert(key);
    }

    fn set_max(&mut self, group_id: &str, counter: u32) {
        self.max_counters.insert(group_id.to_string(), counter);
    }
}

/// Scan existing assignments: collect duplicate keys and the per-group maximum
/// counter. The maximum considers every record of the group, whatever its
/// decision label.
pub fn compute_max_counters<'a, I>(history: I) -> CounterHistory
where
    I: IntoIterator<Item = &'a AssignmentRecord>,
{
    let mut scan = CounterHistory::default();
    for record in history {
        let label = record.decision.to_uppercase();
        if TRACKED_LABELS.contains(&label.as_str()) {
            scan.mark(duplicate_key(
                &record.group_id,
                &label,
                &record.subject_name,
                &record.timeslot,
            ));
        }
        let current = scan.max_counters.entry(record.group_id.clone()).or_insert(0);
        *current = (*current).max(record.rejection_counter);
    }
    debug!(
        groups = scan.groups(),
        keys = scan.seen.len(),
        "assignment history scanned"
    );
    scan
}

/// Counter for a rejection given its phase tag and the group's current max.
pub fn rejection_counter(phase_tag: &str, current_max: u32, phases: &PhaseConfig) -> u32 {
    let tag = phase_tag.trim().to_uppercase();
    if phases
        .standard
        .iter()
        .any(|label| label.trim().to_uppercase() == tag)
    {
        1
    } else if contains_marker(&tag, &phases.first_marker) {
        2
    } else if contains_marker(&tag, &phases.second_marker) {
        3
    } else {
        current_max.saturating_add(1)
    }
}

fn contains_marker(tag: &str, marker: &str) -> bool {
    let marker = marker.trim().to_uppercase();
    !marker.is_empty() && tag.contains(&marker)
}

/// Assignments computed from one source, and the run's tally.
#[derive(Debug, Clone, Default)]
pub struct AdjustOutcome {
    pub new_assignments: BTreeMap<RemoteId, AssignmentRecord>,
    pub success_count: usize,
    pub error_count: usize,
    pub skipped: Vec<(usize, SkipReason)>,
}

impl AdjustOutcome {
    /// The batch write failed: every counted success becomes an error.
    pub fn fail_batch(&mut self) {
        self.error_count += self.success_count;
        self.success_count = 0;
    }

    pub fn duplicates(&self) -> usize {
        self.skipped
            .iter()
            .filter(|(_, reason)| *reason == SkipReason::Duplicate)
            .count()
    }
}

/// Apply decisions from `rows`, in order, on top of the scanned history.
pub fn apply_decisions<C: Clock>(
    rows: &[SourceRow],
    mut history: CounterHistory,
    columns: &ColumnConfig,
    phases: &PhaseConfig,
    ids: &mut PushIdGenerator<C>,
) -> AdjustOutcome {
    let mut outcome = AdjustOutcome::default();

    for row in rows {
        let raw_decision = row.text(&columns.decision).unwrap_or("");
        let (Some(group_id), Some(decision)) = (
            row.text(&columns.remote_id),
            Decision::classify(raw_decision),
        ) else {
            outcome.skipped.push((row.position, SkipReason::NoDecision));
            continue;
        };
        let subject = row.text(&columns.subject).unwrap_or("");
        let timeslot = row.text(&columns.timeslot).unwrap_or("");
        let current_max = history.max_for(group_id);

        let (label, stored_decision, counter) = match decision {
            Decision::AcceptedOrPending => (
                raw_decision.to_uppercase(),
                raw_decision.to_string(),
                current_max,
            ),
            Decision::Rejected => {
                let phase_tag = row.text(&columns.phase_tag).unwrap_or("");
                let counter = rejection_counter(phase_tag, current_max, phases);
                ("NO".to_string(), "NO".to_string(), counter)
            }
        };

        let key = duplicate_key(group_id, &label, subject, timeslot);
        if history.contains(&key) {
            debug!(row = row.position + 2, group = group_id, "duplicate decision skipped");
            outcome.skipped.push((row.position, SkipReason::Duplicate));
            continue;
        }

        if decision == Decision::Rejected {
            history.set_max(group_id, counter);
        }
        history.mark(key);

        outcome.new_assignments.insert(
            ids.generate(),
            AssignmentRecord {
                group_id: group_id.to_string(),
                decision: stored_decision,
                subject_name: subject.to_string(),
                timeslot: timeslot.to_string(),
                rejection_counter: counter,
            },
        );
        outcome.success_count += 1;
    }

    if outcome.new_assignments.is_empty() {
        info!("no new assignments to write");
    } else {
        info!(
            assignments = outcome.new_assignments.len(),
            duplicates = outcome.duplicates(),
            "assignments computed"
        );
    }
    outcome
}

/// History scan followed by the decision fold.
pub fn adjust<'a, C, I>(
    existing: I,
    rows: &[SourceRow],
    columns: &ColumnConfig,
    phases: &PhaseConfig,
    ids: &mut PushIdGenerator<C>,
) -> AdjustOutcome
where
    C: Clock,
    I: IntoIterator<Item = &'a AssignmentRecord>,
{
    let history = compute_max_counters(existing);
    let outcome = apply_decisions(rows, history, columns, phases, ids);
    if outcome.error_count > 0 {
        warn!(errors = outcome.error_count, "assignment errors");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pushid::SystemClock;

    fn record(group: &str, decision: &str, subject: &str, slot: &str, counter: u32) -> AssignmentRecord {
        AssignmentRecord {
            group_id: group.to_string(),
            decision: decision.to_string(),
            subject_name: subject.to_string(),
            timeslot: slot.to_string(),
            rejection_counter: counter,
        }
    }

    fn row(position: usize, group: &str, decision: &str, subject: &str, slot: &str, tag: &str) -> SourceRow {
        SourceRow::from_pairs(
            position,
            [
                ("firebase_id", group),
                ("Proposta accettata", decision),
                ("Nome laboratorio proposto/accettato", subject),
                ("Data e ora proposta/accettata", slot),
                ("consiglio AI", tag),
            ],
        )
    }

    fn run(history: &[AssignmentRecord], rows: &[SourceRow]) -> AdjustOutcome {
        let mut ids = PushIdGenerator::with_seed(SystemClock, 7);
        adjust(
            history,
            rows,
            &ColumnConfig::default(),
            &PhaseConfig::default(),
            &mut ids,
        )
    }

    fn counters(outcome: &AdjustOutcome) -> Vec<u32> {
        outcome
            .new_assignments
            .values()
            .map(|a| a.rejection_counter)
            .collect()
    }

    #[test]
    fn test_max_counter_across_all_labels() {
        let history = vec![
            record("G", "NO", "Robotica", "1", 2),
            record("G", "SI", "Chimica", "2", 3),
            record("H", "boh", "Chimica", "2", 9),
        ];
        let scan = compute_max_counters(&history);
        assert_eq!(scan.max_for("G"), 3);
        assert_eq!(scan.max_for("H"), 9);
        assert_eq!(scan.max_for("unknown"), 0);
        assert!(scan.contains("G_NO_Robotica_1"));
        assert!(!scan.contains("H_BOH_Chimica_2"));
    }

    #[test]
    fn test_rejection_increments_max() {
        let history = vec![record("G", "NO", "Robotica", "a", 3)];
        let outcome = run(&history, &[row(0, "G", "no", "Chimica", "b", "")]);
        assert_eq!(counters(&outcome), vec![4]);
        assert_eq!(outcome.success_count, 1);
    }

    #[test]
    fn test_phase_overrides() {
        let history = vec![record("G", "NO", "Robotica", "a", 3)];
        let outcome = run(
            &history,
            &[
                row(0, "G", "NO", "A", "1", "Riassegnato FASE 1"),
                row(1, "G", "NO", "B", "2", "fase 2 - extra"),
                row(2, "G", "NO", "C", "3", "alta domanda"),
            ],
        );
        assert_eq!(counters(&outcome), vec![2, 3, 1]);
    }

    #[test]
    fn test_later_rows_see_updated_max() {
        let outcome = run(
            &[],
            &[
                row(0, "G", "NO", "A", "1", ""),
                row(1, "G", "NO", "B", "2", ""),
                row(2, "G", "Sì", "C", "3", ""),
            ],
        );
        assert_eq!(counters(&outcome), vec![1, 2, 2]);
        assert_eq!(outcome.new_assignments.values().nth(2).map(|a| a.decision.as_str()), Some("Sì"));
    }

    #[test]
    fn test_duplicate_submission_is_suppressed() {
        let history = vec![record("G", "NO", "Robotica", "30/10/2025 09:00:00", 1)];
        let outcome = run(
            &history,
            &[
                row(0, "G", "no", "Robotica", "30/10/2025 09:00:00", ""),
                row(1, "G", "SI", "Chimica", "x", ""),
                row(2, "G", "si", "Chimica", "x", ""),
            ],
        );
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.duplicates(), 2);
    }

    #[test]
    fn test_rows_without_decision_or_group_are_skipped() {
        let outcome = run(
            &[],
            &[row(0, "G", "forse", "A", "1", ""), row(1, "", "NO", "A", "1", "")],
        );
        assert!(outcome.new_assignments.is_empty());
        assert_eq!(outcome.skipped.len(), 2);
    }

    #[test]
    fn test_failed_batch_converts_successes() {
        let mut outcome = run(&[], &[row(0, "G", "NO", "A", "1", "")]);
        outcome.fail_batch();
        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.error_count, 1);
    }
}
