//! Unified configuration for labsync runs.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (labsync.toml)
//! ```toml
//! [remote]
//! base_url = "https://example-default-rtdb.europe-west1.firebasedatabase.app"
//!
//! [sync]
//! timezone = "Europe/Rome"
//! batch_size = 50
//!
//! [nodes]
//! subjects = "laboratori"
//! ```
//!
//! Environment variables use the `LABSYNC_` prefix with `__` between
//! sections, e.g. `LABSYNC_REMOTE__SECRET`.

mod defaults;

pub use defaults::*;

use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration for labsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote store connection
    pub remote: RemoteConfig,
    /// Remote node (collection) names
    pub nodes: NodeConfig,
    /// Run behavior
    pub sync: RunConfig,
    /// Source column headers
    pub columns: ColumnConfig,
    /// Rejection counter phase rules
    pub phases: PhaseConfig,
}

impl SyncConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - CLI overrides to apply on top
    pub fn load(
        config_path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(SyncConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with LABSYNC_ prefix
        figment = figment.merge(Env::prefixed("LABSYNC_").split("__"));

        // Layer 3: CLI overrides
        figment = figment.merge(Serialized::defaults(overrides));

        let config: SyncConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engines cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.batch_size == 0 {
            return Err(ConfigError::new("sync.batch_size must be at least 1"));
        }
        self.sync.timezone()?;
        Ok(())
    }
}

/// Remote store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Database secret appended as `auth` query parameter
    pub secret: Option<String>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            secret: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Remote node names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub requests_primary: String,
    pub requests_secondary: String,
    pub assignments_primary: String,
    pub assignments_secondary: String,
    pub subjects: String,
    pub status_proposals: String,
    pub status_confirmed: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            requests_primary: DEFAULT_REQUESTS_PRIMARY.to_string(),
            requests_secondary: DEFAULT_REQUESTS_SECONDARY.to_string(),
            assignments_primary: DEFAULT_ASSIGNMENTS_PRIMARY.to_string(),
            assignments_secondary: DEFAULT_ASSIGNMENTS_SECONDARY.to_string(),
            subjects: DEFAULT_SUBJECTS.to_string(),
            status_proposals: DEFAULT_STATUS_PROPOSALS.to_string(),
            status_confirmed: DEFAULT_STATUS_CONFIRMED.to_string(),
        }
    }
}

/// Run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// IANA timezone name used for timestamp rendering
    pub timezone: String,
    /// Records per PATCH chunk
    pub batch_size: usize,
    /// Uppercased source-name fragments routing to secondary nodes
    pub secondary_markers: Vec<String>,
}

impl RunConfig {
    /// Parse the configured timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::new(format!("unknown timezone '{}'", self.timezone)))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            secondary_markers: default_secondary_markers(),
        }
    }
}

/// Source column headers the engines read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub remote_id: String,
    pub timestamp: String,
    pub email: String,
    pub decision: String,
    pub subject: String,
    pub timeslot: String,
    pub phase_tag: String,
    pub slot_subject: String,
    pub meeting_point: String,
    /// Number of numbered timeslot columns
    pub slot_columns: usize,
}

impl ColumnConfig {
    /// Headers of the numbered timeslot columns, in order.
    pub fn slot_column_names(&self) -> Vec<String> {
        (1..=self.slot_columns).map(slot_column_name).collect()
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            remote_id: DEFAULT_REMOTE_ID_COLUMN.to_string(),
            timestamp: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            email: DEFAULT_EMAIL_COLUMN.to_string(),
            decision: DEFAULT_DECISION_COLUMN.to_string(),
            subject: DEFAULT_SUBJECT_COLUMN.to_string(),
            timeslot: DEFAULT_TIMESLOT_COLUMN.to_string(),
            phase_tag: DEFAULT_PHASE_TAG_COLUMN.to_string(),
            slot_subject: DEFAULT_SLOT_SUBJECT_COLUMN.to_string(),
            meeting_point: DEFAULT_MEETING_POINT_COLUMN.to_string(),
            slot_columns: DEFAULT_SLOT_COLUMN_COUNT,
        }
    }
}

/// Phase tag rules for rejection counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Exact (uppercased) labels forcing the counter to 1
    pub standard: Vec<String>,
    /// Substring forcing the counter to 2
    pub first_marker: String,
    /// Substring forcing the counter to 3
    pub second_marker: String,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            standard: default_standard_phases(),
            first_marker: DEFAULT_FIRST_PHASE_MARKER.to_string(),
            second_marker: DEFAULT_SECOND_PHASE_MARKER.to_string(),
        }
    }
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<RunOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
