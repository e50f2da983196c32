//! # Reconciliation Engine
//!
//! Scans source rows, links rows whose request already exists remotely, and
//! assigns fresh push ids to the rest. The engine computes writes; it never
//! performs them.

use crate::config::ColumnConfig;
use crate::index::{DedupIndex, DedupKey};
use crate::model::{RemoteId, RequestPayload, RowUpdate, SkipReason, SourceRow};
use crate::payload::derive_payload;
use crate::pushid::{Clock, PushIdGenerator};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Writes computed by one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Records to create, keyed by their new id (so iteration is chronological).
    pub new_records: BTreeMap<RemoteId, RequestPayload>,
    /// Ids to persist into source rows, in source order.
    pub row_updates: Vec<RowUpdate>,
    /// Rows pointed at an already existing remote record.
    pub relinked: usize,
    /// Rows that produced nothing, with the reason.
    pub skipped: Vec<(usize, SkipReason)>,
}

impl ReconcileOutcome {
    pub fn created(&self) -> usize {
        self.new_records.len()
    }

    /// Rows skipped for a reason other than already carrying an id.
    pub fn incomplete(&self) -> usize {
        self.skipped
            .iter()
            .filter(|(_, reason)| *reason != SkipReason::AlreadyLinked)
            .count()
    }
}

/// Reconcile source rows against the dedup index.
///
/// Rows that already carry a remote id are left alone, so re-running over an
/// unchanged source produces no writes. Rows without timestamp, email or class
/// level are drafts and are skipped silently. Keys created earlier in the same
/// pass count as existing, so a repeated submission is linked to the first.
pub fn reconcile<C: Clock>(
    rows: &[SourceRow],
    index: &DedupIndex,
    columns: &ColumnConfig,
    ids: &mut PushIdGenerator<C>,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let mut fresh: HashMap<DedupKey, RemoteId> = HashMap::new();

    for row in rows {
        if row.text(&columns.remote_id).is_some() {
            outcome.skipped.push((row.position, SkipReason::AlreadyLinked));
            continue;
        }

        let payload = derive_payload(row, columns);
        let (Some(timestamp), Some(email), Some(_)) =
            (&payload.timestamp, &payload.email, &payload.class_level)
        else {
            debug!(row = row.position + 2, "incomplete row skipped");
            outcome.skipped.push((row.position, SkipReason::Incomplete));
            continue;
        };

        let key = index.key_for(timestamp, email);
        if let Some(first) = fresh.get(&key) {
            debug!(row = row.position + 2, id = %first, "repeated submission in this run");
            outcome.row_updates.push(RowUpdate {
                position: row.position,
                remote_id: first.clone(),
            });
            outcome.relinked += 1;
            continue;
        }
        if let Some(existing) = index.get(&key) {
            info!(
                row = row.position + 2,
                id = %existing,
                "row found remotely without local id; relinking"
            );
            outcome.row_updates.push(RowUpdate {
                position: row.position,
                remote_id: existing.clone(),
            });
            outcome.relinked += 1;
            continue;
        }

        let id = ids.generate();
        outcome.row_updates.push(RowUpdate {
            position: row.position,
            remote_id: id.clone(),
        });
        fresh.insert(key, id.clone());
        outcome.new_records.insert(id, payload);
    }

    info!(
        created = outcome.created(),
        relinked = outcome.relinked,
        skipped = outcome.skipped.len(),
        "reconciliation computed"
    );
    outcome
}

/// Repair-only pass: point rows lacking an id at the remote record sharing
/// their raw timestamp and email. Never creates records.
pub fn link_existing(
    rows: &[SourceRow],
    index: &DedupIndex,
    columns: &ColumnConfig,
) -> (Vec<RowUpdate>, Vec<(usize, SkipReason)>) {
    let mut updates = Vec::new();
    let mut skipped = Vec::new();

    for row in rows {
        if row.text(&columns.remote_id).is_some() {
            skipped.push((row.position, SkipReason::AlreadyLinked));
            continue;
        }
        let (Some(timestamp), Some(email)) =
            (row.text(&columns.timestamp), row.text(&columns.email))
        else {
            skipped.push((row.position, SkipReason::Incomplete));
            continue;
        };
        match index.lookup(timestamp, email) {
            Some(id) => updates.push(RowUpdate {
                position: row.position,
                remote_id: id.clone(),
            }),
            None => skipped.push((row.position, SkipReason::NoMatch)),
        }
    }

    (updates, skipped)
}
