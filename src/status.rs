//! # Status Merge Engine
//!
//! Two-stage pipeline. [`merge`] folds the confirmed-decision feed and the
//! latest proposal batch into one [`StatusMap`] keyed by normalized
//! `(subject, timeslot)`; [`apply`] matches display rows against that map and
//! yields a grid of cell colors.
//!
//! Matching is asymmetric: a display subject matches when it *contains* the
//! canonical subject, so two canonical names that are substrings of one
//! another can both match the same cell. The first entry in insertion order
//! wins.

use crate::config::{slot_column_name, ColumnConfig};
use crate::error::{Result, SyncError};
use crate::model::value_text;
use crate::normalize::{clean_subject, normalize_timeslot};
use crate::tabular::{Sheet, TabularSource};
use chrono_tz::Tz;
use hashbrown::HashMap;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

/// Merged status of a `(subject, timeslot)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Confirmed,
    Pending,
}

impl Status {
    /// Map a decision label to a status (`SI`/`SÌ` confirmed,
    /// `PROPOSTA DA ELABORARE` pending); other labels map to nothing.
    pub fn from_label(label: &str) -> Option<Status> {
        match label.trim().to_uppercase().as_str() {
            "SI" | "SÌ" => Some(Status::Confirmed),
            "PROPOSTA DA ELABORARE" => Some(Status::Pending),
            _ => None,
        }
    }
}

/// Normalized `(subject, timeslot)` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusKey {
    pub subject: String,
    pub timeslot: String,
}

impl StatusKey {
    /// Normalize raw values; `None` when the timeslot is not a recognizable date.
    pub fn new(subject: &str, timeslot: &str, tz: Tz) -> Option<Self> {
        Some(Self {
            subject: clean_subject(subject),
            timeslot: normalize_timeslot(timeslot, tz)?,
        })
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.subject, self.timeslot)
    }
}

/// Insertion-ordered status map in which `Confirmed` is never downgraded.
#[derive(Debug, Clone, Default)]
pub struct StatusMap {
    entries: Vec<(StatusKey, Status)>,
    positions: HashMap<StatusKey, usize>,
}

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status. `Confirmed` overrides `Pending`; nothing overrides
    /// `Confirmed`. A key keeps its original position when upgraded.
    pub fn record(&mut self, key: StatusKey, status: Status) {
        match self.positions.get(&key) {
            Some(&idx) => {
                if status == Status::Confirmed {
                    self.entries[idx].1 = Status::Confirmed;
                }
            }
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, status));
            }
        }
    }

    /// Record `Pending` only when the key is not present yet.
    pub fn record_if_absent(&mut self, key: StatusKey, status: Status) -> bool {
        if self.positions.contains_key(&key) {
            return false;
        }
        self.record(key, status);
        true
    }

    pub fn get(&self, key: &StatusKey) -> Option<Status> {
        self.positions.get(key).map(|&idx| self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatusKey, Status)> {
        self.entries.iter().map(|(key, status)| (key, *status))
    }

    /// First entry at `timeslot` whose subject is contained in `display_subject`.
    pub fn find_match(&self, display_subject: &str, timeslot: &str) -> Option<(&StatusKey, Status)> {
        self.iter()
            .find(|(key, _)| key.timeslot == timeslot && display_subject.contains(&key.subject))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge confirmed records with the most recent proposal batch.
///
/// `confirmed` holds assignment-shaped records (`proposta_accettata`,
/// `nome_lab`, `data_lab`). `proposals` is the proposals node: one child per
/// batch timestamp; only the lexicographically greatest batch is read, and
/// its entries (`labAssegnato`, `dataAssegnata`) add `Pending` only for keys
/// not already present.
pub fn merge(confirmed: &[(String, Value)], proposals: Option<&Value>, tz: Tz) -> StatusMap {
    let mut map = StatusMap::new();

    let mut processed = 0usize;
    for (id, record) in confirmed {
        let field = |name: &str| record.get(name).and_then(value_text);
        let (Some(label), Some(subject), Some(timeslot)) =
            (field("proposta_accettata"), field("nome_lab"), field("data_lab"))
        else {
            continue;
        };
        let Some(key) = StatusKey::new(&subject, &timeslot, tz) else {
            warn!(id = %id, timeslot = %timeslot, "unparseable timeslot in confirmed record");
            continue;
        };
        if let Some(status) = Status::from_label(&label) {
            map.record(key, status);
        }
        processed += 1;
    }
    debug!(processed, "confirmed records merged");

    let latest = proposals
        .and_then(Value::as_object)
        .and_then(|batches| batches.iter().max_by(|a, b| a.0.cmp(b.0)));
    match latest {
        Some((batch, entries)) => {
            let mut added = 0usize;
            for entry in children(entries) {
                let field = |name: &str| entry.get(name).and_then(value_text);
                let (Some(subject), Some(timeslot)) = (field("labAssegnato"), field("dataAssegnata"))
                else {
                    continue;
                };
                if let Some(key) = StatusKey::new(&subject, &timeslot, tz) {
                    if map.record_if_absent(key, Status::Pending) {
                        added += 1;
                    }
                }
            }
            info!(batch = %batch, added, "proposal batch merged");
        }
        None => info!("no proposal batch to merge"),
    }

    map
}

/// Entries of a batch, which may be stored as an object or an array.
fn children(node: &Value) -> Vec<&Value> {
    match node {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

/// Display color of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellColor {
    Confirmed,
    Pending,
    Neutral,
}

impl CellColor {
    pub fn hex(self) -> &'static str {
        match self {
            CellColor::Confirmed => "#90ee90",
            CellColor::Pending => "#ffffe0",
            CellColor::Neutral => "#ffffff",
        }
    }
}

impl From<Status> for CellColor {
    fn from(status: Status) -> Self {
        match status {
            Status::Confirmed => CellColor::Confirmed,
            Status::Pending => CellColor::Pending,
        }
    }
}

/// Colors for the data rows of a display source. `None` leaves a cell as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorGrid {
    headers: Vec<String>,
    cells: Vec<Vec<Option<CellColor>>>,
    colored: usize,
}

impl ColorGrid {
    pub fn cell(&self, row: usize, column: usize) -> Option<CellColor> {
        self.cells.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Cells given a confirmed or pending color.
    pub fn colored(&self) -> usize {
        self.colored
    }

    pub fn rows(&self) -> &[Vec<Option<CellColor>>] {
        &self.cells
    }

    /// Render as a sheet of hex colors with the display headers; untouched
    /// cells are empty.
    pub fn to_sheet(&self, name: impl Into<String>) -> Sheet {
        let rows = self
            .cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map(|c| c.hex().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();
        Sheet::new(name, self.headers.clone(), rows)
    }
}

/// Match every timeslot cell of `display` against `map`.
///
/// Slot columns run from the first `"1° data"` header to the last
/// `"{N}° data"` header (N = configured slot count), or to the final column
/// when that header is absent. Rows without a subject are left untouched; in
/// other rows each slot cell is reset to neutral unless it matches.
pub fn apply(
    display: &dyn TabularSource,
    map: &StatusMap,
    columns: &ColumnConfig,
    tz: Tz,
) -> Result<ColorGrid> {
    let headers = display.headers();
    let first_slot = slot_column_name(1);
    let subject_idx = headers.iter().position(|h| *h == columns.slot_subject);
    let start = headers.iter().position(|h| *h == first_slot);
    let (Some(subject_idx), Some(start)) = (subject_idx, start) else {
        let missing = display.missing_columns(&[columns.slot_subject.as_str(), first_slot.as_str()]);
        return Err(SyncError::schema(display.name(), missing));
    };
    let last_slot = slot_column_name(columns.slot_columns);
    let end = match headers.iter().rposition(|h| *h == last_slot) {
        Some(idx) => idx,
        None => {
            warn!(column = %last_slot, "last slot column not found; using the final column");
            headers.len().saturating_sub(1)
        }
    };

    let width = headers.len();
    let mut cells = Vec::with_capacity(display.row_count());
    let mut colored = 0usize;

    for row in display.rows() {
        let mut colors = vec![None; width];
        let values = row.values();
        let subject = values.get(subject_idx).map(|s| s.trim()).unwrap_or("");
        if !subject.is_empty() {
            let subject = clean_subject(subject);
            for (column, color) in colors.iter_mut().enumerate().take(end + 1).skip(start) {
                *color = Some(CellColor::Neutral);
                let raw = values.get(column).map(String::as_str).unwrap_or("");
                let Some(timeslot) = normalize_timeslot(raw, tz) else {
                    continue;
                };
                if let Some((key, status)) = map.find_match(&subject, &timeslot) {
                    debug!(row = row.position + 2, key = %key, "status matched");
                    *color = Some(status.into());
                    colored += 1;
                }
            }
        }
        cells.push(colors);
    }

    if colored == 0 && !map.is_empty() {
        warn!("no display cell matched any status entry");
    }
    info!(colored, "status grid computed");
    Ok(ColorGrid {
        headers: headers.to_vec(),
        cells,
        colored,
    })
}
