//! # Timeslot Sync
//!
//! Pushes the timeslots researchers offer for each subject into the remote
//! subjects collection. The source is authoritative: a subject's slot list
//! and meeting point are replaced wholesale by what the source holds.

use crate::config::ColumnConfig;
use crate::error::{Result, SyncError};
use crate::model::{value_text, RemoteId, SourceRow};
use crate::normalize::{normalize_timeslot, normalize_title};
use crate::store::RemoteStore;
use crate::tabular::TabularSource;
use chrono_tz::Tz;
use hashbrown::HashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Status written for every freshly published slot.
pub const SLOT_AVAILABLE: &str = "disponibile";

/// One published timeslot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    pub datetime: String,
    pub status: String,
    #[serde(rename = "assignedClassId")]
    pub assigned_class_id: String,
}

impl SlotEntry {
    pub fn available(datetime: impl Into<String>) -> Self {
        Self {
            datetime: datetime.into(),
            status: SLOT_AVAILABLE.to_string(),
            assigned_class_id: String::new(),
        }
    }
}

/// Patch body for `subjects/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotUpdate {
    #[serde(rename = "punto_incontro")]
    pub meeting_point: String,
    #[serde(rename = "date_disponibili")]
    pub slots: Vec<SlotEntry>,
    #[serde(rename = "timestamp_aggiornamento_date")]
    pub updated_at: String,
}

/// Slots gathered for one subject across source rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectSlots {
    pub title: String,
    pub meeting_point: String,
    pub timeslots: Vec<String>,
}

/// Outcome of a full timeslot sync.
#[derive(Debug, Clone, Default)]
pub struct SlotSyncOutcome {
    pub updated: usize,
    /// Normalized titles present in the source but not remotely.
    pub unknown: Vec<String>,
}

/// Map normalized subject title → remote subject id.
pub fn index_subjects(subjects: &[(String, Value)]) -> HashMap<String, RemoteId> {
    let mut index = HashMap::new();
    for (id, subject) in subjects {
        if let Some(title) = subject.get("titolo").and_then(value_text) {
            index.insert(normalize_title(&title), RemoteId::new(id.clone()));
        }
    }
    index
}

fn slot_columns(headers: &[String], columns: &ColumnConfig) -> Vec<usize> {
    columns
        .slot_column_names()
        .iter()
        .filter_map(|name| headers.iter().position(|h| h == name))
        .collect()
}

fn slot_text(raw: &str, tz: Tz) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(normalize_timeslot(trimmed, tz).unwrap_or_else(|| trimmed.to_string()))
}

/// Group rows by normalized subject title, in first-seen order. The last
/// non-empty meeting point wins; timeslots are appended in row then column
/// order and duplicates are kept.
pub fn aggregate(rows: &[SourceRow], columns: &ColumnConfig, tz: Tz) -> Vec<SubjectSlots> {
    let mut groups: Vec<SubjectSlots> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(title) = row.text(&columns.slot_subject) else {
            continue;
        };
        let title = normalize_title(title);
        let idx = *positions.entry(title.clone()).or_insert_with(|| {
            groups.push(SubjectSlots {
                title,
                ..SubjectSlots::default()
            });
            groups.len() - 1
        });
        let group = &mut groups[idx];

        if let Some(point) = row.text(&columns.meeting_point) {
            group.meeting_point = point.to_string();
        }
        for column in slot_columns(row.headers(), columns) {
            if let Some(slot) = row.values().get(column).and_then(|raw| slot_text(raw, tz)) {
                group.timeslots.push(slot);
            }
        }
    }
    groups
}

/// Replace the slot list and meeting point of every subject in `source`.
/// Subjects unknown remotely are logged and skipped.
pub fn sync_timeslots<S>(
    store: &mut S,
    subjects_node: &str,
    source: &dyn TabularSource,
    columns: &ColumnConfig,
    tz: Tz,
    updated_at: &str,
) -> Result<SlotSyncOutcome>
where
    S: RemoteStore + ?Sized,
{
    source.require_columns(&[columns.slot_subject.as_str()])?;
    let remote = store.get_children(subjects_node)?;
    let index = index_subjects(&remote);
    let groups = aggregate(&source.rows(), columns, tz);
    info!(subjects = groups.len(), remote = index.len(), "timeslots aggregated");

    let mut outcome = SlotSyncOutcome::default();
    for group in groups {
        let Some(id) = index.get(&group.title) else {
            warn!(subject = %group.title, "subject not found remotely; skipped");
            outcome.unknown.push(group.title);
            continue;
        };
        let update = SlotUpdate {
            meeting_point: group.meeting_point,
            slots: group.timeslots.into_iter().map(SlotEntry::available).collect(),
            updated_at: updated_at.to_string(),
        };
        info!(subject = %group.title, id = %id, slots = update.slots.len(), "updating subject");
        store.patch(&format!("{subjects_node}/{id}"), &serde_json::to_value(&update)?)?;
        outcome.updated += 1;
    }
    Ok(outcome)
}

/// Publish the timeslots of one submitted row.
pub fn submit_timeslots<S>(
    store: &mut S,
    subjects_node: &str,
    row: &SourceRow,
    columns: &ColumnConfig,
    tz: Tz,
    updated_at: &str,
) -> Result<RemoteId>
where
    S: RemoteStore + ?Sized,
{
    let title = row.text(&columns.slot_subject).unwrap_or("");
    let index = index_subjects(&store.get_children(subjects_node)?);
    let id = index
        .get(&normalize_title(title))
        .cloned()
        .ok_or_else(|| SyncError::UnknownSubject(title.to_string()))?;

    let slots: Vec<SlotEntry> = slot_columns(row.headers(), columns)
        .into_iter()
        .filter_map(|column| row.values().get(column).and_then(|raw| slot_text(raw, tz)))
        .map(SlotEntry::available)
        .collect();
    if slots.is_empty() {
        return Err(SyncError::EmptySubmission(title.to_string()));
    }

    let update = SlotUpdate {
        meeting_point: row.text(&columns.meeting_point).unwrap_or("").to_string(),
        slots,
        updated_at: updated_at.to_string(),
    };
    store.patch(&format!("{subjects_node}/{id}"), &serde_json::to_value(&update)?)?;
    info!(subject = title, id = %id, slots = update.slots.len(), "submission published");
    Ok(id)
}
