use std::cell::Cell;
use std::rc::Rc;

use labsync_rs::config::DEFAULT_REMOTE_ID_COLUMN;
use labsync_rs::payload::{COL_CLASS_LEVEL, COL_TEACHER_FIRST, LAB_INTEREST_COLUMNS};
use labsync_rs::{Clock, RemoteStore, Result, Sheet, SyncError};
use serde_json::Value;

/// Clock under test control; clones share the same instant.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

#[allow(dead_code)]
impl ManualClock {
    pub fn at(millis: u64) -> Self {
        Self(Rc::new(Cell::new(millis)))
    }

    pub fn set(&self, millis: u64) {
        self.0.set(millis);
    }

    pub fn advance(&self, millis: u64) {
        self.0.set(self.0.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.get()
    }
}

/// One form response for [`request_sheet`].
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct RequestRow {
    pub remote_id: String,
    pub timestamp: String,
    pub email: String,
    pub teacher: String,
    pub class_level: String,
    pub labs: String,
}

#[allow(dead_code)]
pub fn request_row(timestamp: &str, email: &str, class_level: &str, labs: &str) -> RequestRow {
    RequestRow {
        timestamp: timestamp.to_string(),
        email: email.to_string(),
        teacher: "Anna".to_string(),
        class_level: class_level.to_string(),
        labs: labs.to_string(),
        ..RequestRow::default()
    }
}

/// Form-response sheet with the standard request headers.
#[allow(dead_code)]
pub fn request_sheet(name: &str, rows: &[RequestRow]) -> Sheet {
    let headers = vec![
        DEFAULT_REMOTE_ID_COLUMN.to_string(),
        "Informazioni cronologiche".to_string(),
        "Indirizzo email".to_string(),
        COL_TEACHER_FIRST.to_string(),
        COL_CLASS_LEVEL.to_string(),
        LAB_INTEREST_COLUMNS[0].to_string(),
    ];
    let rows = rows
        .iter()
        .map(|row| {
            vec![
                row.remote_id.clone(),
                row.timestamp.clone(),
                row.email.clone(),
                row.teacher.clone(),
                row.class_level.clone(),
                row.labs.clone(),
            ]
        })
        .collect();
    Sheet::new(name, headers, rows)
}

/// Decision sheet: `(request id, decision, subject, timeslot, phase tag)`.
#[allow(dead_code)]
pub fn decision_sheet(name: &str, rows: &[(&str, &str, &str, &str, &str)]) -> Sheet {
    let headers = vec![
        DEFAULT_REMOTE_ID_COLUMN.to_string(),
        "Proposta accettata".to_string(),
        "Nome laboratorio proposto/accettato".to_string(),
        "Data e ora proposta/accettata".to_string(),
        "consiglio AI".to_string(),
    ];
    let rows = rows
        .iter()
        .map(|(id, decision, subject, slot, tag)| {
            [*id, *decision, *subject, *slot, *tag]
                .iter()
                .map(|cell| cell.to_string())
                .collect()
        })
        .collect();
    Sheet::new(name, headers, rows)
}

/// Researcher slot sheet with `slots` numbered timeslot columns.
#[allow(dead_code)]
pub fn slot_sheet(name: &str, slots: usize, rows: &[(&str, &str, &[&str])]) -> Sheet {
    let mut headers = vec![
        "Scegli il tuo laboratorio".to_string(),
        "Punto di incontro con la scolaresca".to_string(),
    ];
    headers.extend((1..=slots).map(labsync_rs::config::slot_column_name));
    let rows = rows
        .iter()
        .map(|(subject, meeting_point, dates)| {
            let mut cells = vec![subject.to_string(), meeting_point.to_string()];
            cells.extend(dates.iter().map(|d| d.to_string()));
            cells
        })
        .collect();
    Sheet::new(name, headers, rows)
}

/// Store wrapper whose writes start failing once `budget` writes succeeded.
#[allow(dead_code)]
pub struct FlakyStore<S> {
    pub inner: S,
    budget: usize,
}

#[allow(dead_code)]
impl<S: RemoteStore> FlakyStore<S> {
    pub fn new(inner: S, budget: usize) -> Self {
        Self { inner, budget }
    }

    fn spend(&mut self, method: &'static str, path: &str) -> Result<()> {
        if self.budget == 0 {
            return Err(SyncError::Transport {
                method,
                path: path.to_string(),
                status: Some(503),
                message: "write budget exhausted".to_string(),
            });
        }
        self.budget -= 1;
        Ok(())
    }
}

impl<S: RemoteStore> RemoteStore for FlakyStore<S> {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        self.inner.get(path)
    }

    fn patch(&mut self, path: &str, data: &Value) -> Result<Option<Value>> {
        self.spend("PATCH", path)?;
        self.inner.patch(path, data)
    }

    fn post(&mut self, path: &str, data: &Value) -> Result<String> {
        self.spend("POST", path)?;
        self.inner.post(path, data)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.spend("DELETE", path)?;
        self.inner.delete(path)
    }
}
