//! Default constants for labsync configuration.
//!
//! All magic numbers and remote node names are centralized here.

// =============================================================================
// Remote Store Defaults
// =============================================================================

/// Default base URL of the remote JSON store.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9000";

/// Default per-request timeout in milliseconds.
/// Applies to connect, read and write separately.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// =============================================================================
// Node Defaults
// =============================================================================

pub const DEFAULT_REQUESTS_PRIMARY: &str = "richiesteprimarie";
pub const DEFAULT_REQUESTS_SECONDARY: &str = "richiestesecondarie";
pub const DEFAULT_ASSIGNMENTS_PRIMARY: &str = "assegnazioni_primarie";
pub const DEFAULT_ASSIGNMENTS_SECONDARY: &str = "assegnazioni_secondarie";
pub const DEFAULT_SUBJECTS: &str = "laboratori";

/// Node holding automated proposals, one child per batch timestamp.
pub const DEFAULT_STATUS_PROPOSALS: &str = "risultati_assegnazione_primarie";

/// Node holding confirmed decisions used by the status grid.
pub const DEFAULT_STATUS_CONFIRMED: &str = "assegnazioni_primarie";

// =============================================================================
// Sync Defaults
// =============================================================================

/// IANA timezone used to render timestamps before comparing them.
pub const DEFAULT_TIMEZONE: &str = "Europe/Rome";

/// Records per PATCH request.
/// Smaller chunks keep request bodies well under transport limits.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Source names containing any of these (uppercased) route to secondary nodes.
pub fn default_secondary_markers() -> Vec<String> {
    vec!["SECONDO GRADO".to_string(), "SECONDARIE".to_string()]
}

// =============================================================================
// Column Defaults
// =============================================================================

pub const DEFAULT_REMOTE_ID_COLUMN: &str = "firebase_id";
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Informazioni cronologiche";
pub const DEFAULT_EMAIL_COLUMN: &str = "Indirizzo email";
pub const DEFAULT_DECISION_COLUMN: &str = "Proposta accettata";
pub const DEFAULT_SUBJECT_COLUMN: &str = "Nome laboratorio proposto/accettato";
pub const DEFAULT_TIMESLOT_COLUMN: &str = "Data e ora proposta/accettata";
pub const DEFAULT_PHASE_TAG_COLUMN: &str = "consiglio AI";
pub const DEFAULT_SLOT_SUBJECT_COLUMN: &str = "Scegli il tuo laboratorio";
pub const DEFAULT_MEETING_POINT_COLUMN: &str = "Punto di incontro con la scolaresca";

/// Number of numbered timeslot columns ("1° data" .. "25° data").
pub const DEFAULT_SLOT_COLUMN_COUNT: usize = 25;

/// Header of the n-th timeslot column (1-based).
pub fn slot_column_name(n: usize) -> String {
    format!("{n}° data")
}

// =============================================================================
// Phase Defaults
// =============================================================================

/// Phase tags that reset the rejection counter to 1.
pub fn default_standard_phases() -> Vec<String> {
    ["ALTA DOMANDA", "BASSA DOMANDA", "EXTRA (RIPIEGO)", "EXTRA (TEMATICO)"]
        .iter()
        .map(|label| label.to_string())
        .collect()
}

/// Marker forcing the counter to 2.
pub const DEFAULT_FIRST_PHASE_MARKER: &str = "FASE 1";

/// Marker forcing the counter to 3.
pub const DEFAULT_SECOND_PHASE_MARKER: &str = "FASE 2";
