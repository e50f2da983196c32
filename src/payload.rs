//! Mapping from form-response columns to typed request payloads, and routing
//! of a source to its destination nodes.

use crate::config::{ColumnConfig, NodeConfig};
use crate::model::{Destination, RequestPayload, SourceRow};
use tracing::warn;

pub const COL_CONSENT_PRIVACY: &str = "Ho preso visione e compreso l\u{2019}informativa relativa al trattamento dei dati personali (clicca per visualizzare e scaricare)";
pub const COL_CONSENT_NEWSLETTER: &str = "Presto il CONSENSO a ricevere informazioni su altri progetti di public engagement per la scuola";
pub const COL_INSTITUTE_NAME: &str = "Nome dell'Istituto";
pub const COL_INSTITUTE_CODE: &str = "Codice meccanografico dell'Istituto (Es.:TO1A005001)";
pub const COL_INSTITUTE_DISTRICT: &str =
    "Circoscrizione del Comune di Torino in cui si trova l'Istituto (solo il numero)";
pub const COL_BUILDING_NAME: &str = "Plesso di appartenenza della classe";
pub const COL_BUILDING_ADDRESS: &str = "Indirizzo del plesso";
pub const COL_TEACHER_FIRST: &str = "Nome insegnante referente";
pub const COL_TEACHER_LAST: &str = "Cognome insegnante referente";
pub const COL_TEACHER_PHONE: &str = "Numero cellulare insegnante referente";
pub const COL_CLASS_SECTION: &str = "Sezione della classe per cui si manifesta l'interesse";
pub const COL_STUDENT_COUNT: &str = "Numero degli studenti della sezione";
pub const COL_CLASS_LEVEL: &str = "Classe per cui si manifesta l'interesse";
pub const COL_DISABILITY_PRESENT: &str = "Nella classe sono presenti persone con disabilità?";
pub const COL_DISABILITY_KINDS: &str = "Selezionare le tipologie presenti";

/// Per-grade lab interest columns; the first non-empty one is used.
pub const LAB_INTEREST_COLUMNS: [&str; 5] = [
    "Laboratori d'interesse per le Classi I (selezionarne un massimo di 4)",
    "Laboratori d'interesse per le Classi II (selezionarne un massimo di 4)",
    "Laboratori d'interesse per le Classi III (selezionarne un massimo di 4)",
    "Laboratori d'interesse per le Classi IV (selezionarne un massimo di 4)",
    "Laboratori d'interesse per le Classi V (selezionarne un massimo di 4)",
];

const YES: &str = "Sì";

/// Build the request payload for a row.
///
/// The timestamp is left empty when the row has none; callers that post
/// single submissions fill it with [`RequestPayload::with_default_timestamp`].
pub fn derive_payload(row: &SourceRow, columns: &ColumnConfig) -> RequestPayload {
    let text = |column: &str| row.text(column).map(str::to_string);
    let flag = |column: &str| row.text(column).map(|value| value == YES);

    let mut payload = RequestPayload {
        timestamp: text(&columns.timestamp),
        email: text(&columns.email),
        consent_privacy: flag(COL_CONSENT_PRIVACY),
        consent_newsletter: flag(COL_CONSENT_NEWSLETTER),
        institute_name: text(COL_INSTITUTE_NAME),
        institute_code: text(COL_INSTITUTE_CODE),
        institute_district: text(COL_INSTITUTE_DISTRICT),
        building_name: text(COL_BUILDING_NAME),
        building_address: text(COL_BUILDING_ADDRESS),
        referent_teacher: referent(row),
        referent_phone: text(COL_TEACHER_PHONE),
        class_section: text(COL_CLASS_SECTION),
        student_count: text(COL_STUDENT_COUNT),
        ..RequestPayload::default()
    };

    let Some(class_level) = text(COL_CLASS_LEVEL) else {
        return payload;
    };

    payload.requested_labs = LAB_INTEREST_COLUMNS
        .iter()
        .find_map(|column| row.text(column))
        .map(split_list);
    if payload.requested_labs.is_none() {
        warn!(
            row = row.position + 2,
            class_level = %class_level,
            "no lab interest found; row will be filtered out"
        );
    }
    payload.class_level = Some(class_level);
    payload.disability_present = flag(COL_DISABILITY_PRESENT);
    payload.disability_kinds = row.text(COL_DISABILITY_KINDS).map(split_list);
    payload
}

impl RequestPayload {
    /// Fill a missing timestamp with `now`.
    pub fn with_default_timestamp(mut self, now: impl FnOnce() -> String) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = Some(now());
        }
        self
    }
}

fn referent(row: &SourceRow) -> Option<String> {
    let first = row.text(COL_TEACHER_FIRST);
    let last = row.text(COL_TEACHER_LAST);
    if first.is_none() && last.is_none() {
        return None;
    }
    let full = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    Some(full.trim().to_string())
}

/// Split a multi-select cell on commas, dropping empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Route a source by its name: any configured marker (matched on the
/// uppercased name) selects the secondary nodes.
pub fn destination_for(source_name: &str, secondary_markers: &[String]) -> Destination {
    let upper = source_name.to_uppercase();
    if secondary_markers
        .iter()
        .any(|marker| upper.contains(&marker.to_uppercase()))
    {
        Destination::Secondary
    } else {
        Destination::Primary
    }
}

impl NodeConfig {
    pub fn requests_for(&self, destination: Destination) -> &str {
        match destination {
            Destination::Primary => &self.requests_primary,
            Destination::Secondary => &self.requests_secondary,
        }
    }

    pub fn assignments_for(&self, destination: Destination) -> &str {
        match destination {
            Destination::Primary => &self.assignments_primary,
            Destination::Secondary => &self.assignments_secondary,
        }
    }
}
