//! # Data Model
//!
//! Row, record and identifier types shared by the reconciliation, counter and
//! status engines. Remote records keep the store's existing wire field names
//! through serde renames.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Identifier of a record in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Raw cell contents as seen by the engines.
///
/// `Missing` means the column does not exist in the source at all, which is
/// distinct from a present but blank cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellValue<'a> {
    Missing,
    Empty,
    Text(&'a str),
}

impl<'a> CellValue<'a> {
    /// Trimmed, non-empty text, if any.
    pub fn text(&self) -> Option<&'a str> {
        match self {
            CellValue::Text(raw) => {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

/// One data row of a tabular source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 0-based position among data rows (the header is not counted)
    pub position: usize,
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl SourceRow {
    pub fn new(position: usize, headers: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            position,
            headers,
            values,
        }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(position: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (headers, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(position, headers.into(), values)
    }

    /// Look up a cell by column header (first matching header wins).
    pub fn get(&self, column: &str) -> CellValue<'_> {
        match self.headers.iter().position(|header| header == column) {
            None => CellValue::Missing,
            Some(idx) => match self.values.get(idx).map(String::as_str) {
                None | Some("") => CellValue::Empty,
                Some(raw) => CellValue::Text(raw),
            },
        }
    }

    /// Trimmed, non-empty text of a column.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).text()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Instruction to persist a remote id into a source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    pub position: usize,
    pub remote_id: RemoteId,
}

/// Which pair of request/assignment nodes a source feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Primary,
    Secondary,
}

/// Reason a row produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Row already carries a remote id.
    AlreadyLinked,
    /// Timestamp, email or classification field absent.
    Incomplete,
    /// Decision is neither a rejection nor an acceptance/pending.
    NoDecision,
    /// Identical assignment already recorded.
    Duplicate,
    /// No remote record shares the row's dedup key.
    NoMatch,
}

/// Classified assignment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Rejected,
    AcceptedOrPending,
}

impl Decision {
    /// Classify a raw decision label (`NO`, `SI`, `SÌ`, `PROPOSTA DA ELABORARE`).
    pub fn classify(raw: &str) -> Option<Decision> {
        match raw.trim().to_uppercase().as_str() {
            "NO" => Some(Decision::Rejected),
            "SI" | "SÌ" | "PROPOSTA DA ELABORARE" => Some(Decision::AcceptedOrPending),
            _ => None,
        }
    }
}

/// Request record as written to the requests nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "consenso_informativa", skip_serializing_if = "Option::is_none")]
    pub consent_privacy: Option<bool>,
    #[serde(rename = "consenso_newsletter", skip_serializing_if = "Option::is_none")]
    pub consent_newsletter: Option<bool>,
    #[serde(rename = "istituto_nome", skip_serializing_if = "Option::is_none")]
    pub institute_name: Option<String>,
    #[serde(rename = "istituto_codice_mecc", skip_serializing_if = "Option::is_none")]
    pub institute_code: Option<String>,
    #[serde(rename = "istituto_circoscrizione", skip_serializing_if = "Option::is_none")]
    pub institute_district: Option<String>,
    #[serde(rename = "plesso_nome", skip_serializing_if = "Option::is_none")]
    pub building_name: Option<String>,
    #[serde(rename = "plesso_indirizzo", skip_serializing_if = "Option::is_none")]
    pub building_address: Option<String>,
    #[serde(rename = "insegnante_referente", skip_serializing_if = "Option::is_none")]
    pub referent_teacher: Option<String>,
    #[serde(rename = "insegnante_cellulare", skip_serializing_if = "Option::is_none")]
    pub referent_phone: Option<String>,
    #[serde(rename = "classe_sezione", skip_serializing_if = "Option::is_none")]
    pub class_section: Option<String>,
    #[serde(rename = "classe_studenti_numero", skip_serializing_if = "Option::is_none")]
    pub student_count: Option<String>,
    #[serde(rename = "classe_livello", skip_serializing_if = "Option::is_none")]
    pub class_level: Option<String>,
    #[serde(rename = "laboratori_richiesti", skip_serializing_if = "Option::is_none")]
    pub requested_labs: Option<Vec<String>>,
    #[serde(rename = "disabilita_presente", skip_serializing_if = "Option::is_none")]
    pub disability_present: Option<bool>,
    #[serde(rename = "disabilita_tipologie", skip_serializing_if = "Option::is_none")]
    pub disability_kinds: Option<Vec<String>>,
}

impl RequestPayload {
    /// Number of populated fields.
    pub fn field_count(&self) -> usize {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.len(),
            _ => 0,
        }
    }

    /// Timestamp, email and class level are all present.
    pub fn is_complete(&self) -> bool {
        self.timestamp.is_some() && self.email.is_some() && self.class_level.is_some()
    }
}

/// The fields of a remote request record the dedup index looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: RemoteId,
    pub timestamp: Option<String>,
    pub email: Option<String>,
}

impl RemoteRecord {
    /// Extract from an arbitrary JSON node; non-objects yield `None`.
    pub fn from_value(id: &str, value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            id: RemoteId::from(id),
            timestamp: object.get("timestamp").and_then(value_text),
            email: object.get("email").and_then(value_text),
        })
    }
}

/// Assignment event as stored in the assignments nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Request id this assignment belongs to.
    #[serde(rename = "id_firebase")]
    pub group_id: String,
    /// Decision label as typed by the operator (`NO`, `SI`, ...).
    #[serde(rename = "proposta_accettata")]
    pub decision: String,
    #[serde(rename = "nome_lab")]
    pub subject_name: String,
    #[serde(rename = "data_lab")]
    pub timeslot: String,
    #[serde(rename = "contatore_no")]
    pub rejection_counter: u32,
}

impl AssignmentRecord {
    /// Lenient extraction from stored JSON: the counter may be a number or a
    /// numeric string, text fields may be numbers. A record without a group id
    /// yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let group_id = object.get("id_firebase").and_then(value_text)?;
        Some(Self {
            group_id,
            decision: object
                .get("proposta_accettata")
                .and_then(value_text)
                .unwrap_or_default(),
            subject_name: object.get("nome_lab").and_then(value_text).unwrap_or_default(),
            timeslot: object.get("data_lab").and_then(value_text).unwrap_or_default(),
            rejection_counter: object
                .get("contatore_no")
                .map(parse_counter)
                .unwrap_or(0),
        })
    }
}

/// Render a scalar JSON value as trimmed text; empty strings and non-scalars yield `None`.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Parse a stored counter the way a leading-digits integer parse would;
/// anything unparseable counts as 0.
fn parse_counter(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}
