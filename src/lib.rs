//! # Labsync
//!
//! Keeps a tabular source of school lab requests in step with a path-addressed
//! JSON store: reconciles request rows without creating duplicates, assigns
//! sortable push ids, derives per-request rejection counters from operator
//! decisions, and merges confirmed and proposed assignment feeds into a status
//! grid for reporting.
//!
//! Every run is single-threaded and run-to-completion. The engines compute
//! writes; [`LabSync`] performs them against a [`RemoteStore`] and reports a
//! [`RunSummary`].

pub mod batch;
pub mod config;
pub mod counter;
pub mod error;
pub mod http;
pub mod index;
pub mod model;
pub mod normalize;
pub mod payload;
pub mod pushid;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod tabular;
pub mod timeslots;

// Re-export main types for convenience
pub use batch::BatchWriter;
pub use config::{ConfigError, ConfigOverrides, SyncConfig};
pub use error::{Result, SyncError};
pub use http::HttpStore;
pub use index::{DedupIndex, DedupKey};
pub use model::{AssignmentRecord, Decision, Destination, RemoteId, RequestPayload, SourceRow};
pub use pushid::{Clock, PushIdGenerator, SystemClock};
pub use status::{CellColor, ColorGrid, Status, StatusMap};
pub use store::{MemoryStore, RemoteStore};
pub use tabular::{Sheet, TabularSource};

use chrono::{DateTime, SecondsFormat};
use chrono_tz::Tz;
use model::RemoteRecord;
use std::fmt;
use tracing::{info, warn};

/// Counts reported by one facade operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} skipped={} errors={}",
            self.created, self.updated, self.skipped, self.errors
        )
    }
}

/// Main API: one store, one configuration, one id generator per run.
pub struct LabSync<S: RemoteStore, C: Clock = SystemClock> {
    store: S,
    config: SyncConfig,
    tz: Tz,
    ids: PushIdGenerator<C>,
}

impl<S: RemoteStore> LabSync<S> {
    pub fn new(store: S, config: SyncConfig) -> Result<Self> {
        Self::with_generator(store, config, PushIdGenerator::new())
    }
}

impl<S: RemoteStore, C: Clock> LabSync<S, C> {
    /// Use a specific id generator (and through it, a specific clock).
    pub fn with_generator(store: S, config: SyncConfig, ids: PushIdGenerator<C>) -> Result<Self> {
        config.validate()?;
        let tz = config.sync.timezone()?;
        Ok(Self {
            store,
            config,
            tz,
            ids,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn batch_writer(&self) -> BatchWriter {
        BatchWriter::new(self.config.sync.batch_size)
    }

    fn destination(&self, source_name: &str) -> Destination {
        payload::destination_for(source_name, &self.config.sync.secondary_markers)
    }

    /// Current instant as RFC 3339 (UTC, milliseconds), read from the
    /// generator's clock.
    fn now_rfc3339(&self) -> String {
        let millis = self.ids.clock().now_millis();
        DateTime::from_timestamp_millis(millis as i64)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Dedup index over both request nodes, primary first.
    pub fn load_request_index(&self) -> Result<DedupIndex> {
        let nodes = &self.config.nodes;
        let mut records = Vec::new();
        for node in [&nodes.requests_primary, &nodes.requests_secondary] {
            let children = self.store.get_children(node)?;
            info!(node = %node, records = children.len(), "requests loaded");
            records.extend(
                children
                    .iter()
                    .filter_map(|(id, value)| RemoteRecord::from_value(id, value)),
            );
        }
        Ok(DedupIndex::build(&records, self.tz))
    }

    /// Assignment history across both assignment nodes.
    pub fn load_assignment_history(&self) -> Result<Vec<AssignmentRecord>> {
        let nodes = &self.config.nodes;
        let mut history = Vec::new();
        for node in [&nodes.assignments_primary, &nodes.assignments_secondary] {
            let children = self.store.get_children(node)?;
            info!(node = %node, records = children.len(), "assignments loaded");
            history.extend(
                children
                    .iter()
                    .filter_map(|(_, value)| AssignmentRecord::from_value(value)),
            );
        }
        Ok(history)
    }

    /// Push new source rows as request records and write their ids back.
    ///
    /// Rows already carrying an id are left alone; rows whose request exists
    /// remotely are relinked without a remote write.
    pub fn sync_requests(&mut self, source: &mut dyn TabularSource) -> Result<RunSummary> {
        let columns = &self.config.columns;
        source.require_columns(&[columns.remote_id.as_str()])?;
        info!(source = source.name(), rows = source.row_count(), "syncing requests");

        let index = self.load_request_index()?;
        let rows = source.rows();
        let outcome = reconcile::reconcile(&rows, &index, &self.config.columns, &mut self.ids);

        let node = self
            .config
            .nodes
            .requests_for(self.destination(source.name()))
            .to_string();
        self.batch_writer()
            .write(&mut self.store, &node, &outcome.new_records)?;
        source.apply_row_updates(&self.config.columns.remote_id, &outcome.row_updates)?;

        let summary = RunSummary {
            created: outcome.created(),
            updated: outcome.relinked,
            skipped: outcome.skipped.len(),
            errors: 0,
        };
        info!(%summary, node = %node, "requests synced");
        Ok(summary)
    }

    /// Repair pass: fill missing ids from remote records with the same
    /// timestamp and email. Never writes remotely.
    pub fn link_request_ids(&mut self, source: &mut dyn TabularSource) -> Result<RunSummary> {
        let columns = &self.config.columns;
        source.require_columns(&[
            columns.remote_id.as_str(),
            columns.timestamp.as_str(),
            columns.email.as_str(),
        ])?;

        let index = self.load_request_index()?;
        let (updates, skipped) = reconcile::link_existing(&source.rows(), &index, columns);
        source.apply_row_updates(&columns.remote_id, &updates)?;

        let summary = RunSummary {
            updated: updates.len(),
            skipped: skipped.len(),
            ..RunSummary::default()
        };
        info!(%summary, "request ids linked");
        Ok(summary)
    }

    /// Record operator decisions as assignments with adjusted counters.
    ///
    /// A failed write does not abort with an error: every assignment counted
    /// as created is reported under `errors` instead.
    pub fn sync_assignments(&mut self, source: &dyn TabularSource) -> Result<RunSummary> {
        let columns = &self.config.columns;
        source.require_columns(&[
            columns.remote_id.as_str(),
            columns.decision.as_str(),
            columns.subject.as_str(),
            columns.timeslot.as_str(),
            columns.phase_tag.as_str(),
        ])?;
        info!(source = source.name(), rows = source.row_count(), "syncing assignments");

        let history = self.load_assignment_history()?;
        let mut outcome = counter::adjust(
            &history,
            &source.rows(),
            &self.config.columns,
            &self.config.phases,
            &mut self.ids,
        );

        let node = self
            .config
            .nodes
            .assignments_for(self.destination(source.name()))
            .to_string();
        if let Err(err) = self
            .batch_writer()
            .write(&mut self.store, &node, &outcome.new_assignments)
        {
            let written = match &err {
                SyncError::PartialBatch { written, .. } => *written,
                _ => 0,
            };
            warn!(
                node = %node,
                written,
                error = %err,
                "assignment batch failed; all rows reported as errors, check the node before resubmitting"
            );
            outcome.fail_batch();
        }

        let summary = RunSummary {
            created: outcome.success_count,
            skipped: outcome.skipped.len(),
            errors: outcome.error_count,
            ..RunSummary::default()
        };
        info!(%summary, node = %node, "assignments synced");
        Ok(summary)
    }

    /// Merge the status feeds and color the slot cells of `display`.
    pub fn status_grid(&self, display: &dyn TabularSource) -> Result<ColorGrid> {
        let nodes = &self.config.nodes;
        let confirmed = self.store.get_children(&nodes.status_confirmed)?;
        let proposals = self.store.get(&nodes.status_proposals)?;
        let map = status::merge(&confirmed, proposals.as_ref(), self.tz);
        info!(entries = map.len(), "status map merged");
        status::apply(display, &map, &self.config.columns, self.tz)
    }

    /// Replace every known subject's timeslots with those in `source`.
    pub fn sync_timeslots(&mut self, source: &dyn TabularSource) -> Result<RunSummary> {
        let now = self.now_rfc3339();
        let outcome = timeslots::sync_timeslots(
            &mut self.store,
            &self.config.nodes.subjects,
            source,
            &self.config.columns,
            self.tz,
            &now,
        )?;
        let summary = RunSummary {
            updated: outcome.updated,
            skipped: outcome.unknown.len(),
            ..RunSummary::default()
        };
        info!(%summary, "timeslots synced");
        Ok(summary)
    }

    /// Publish the timeslots of a single submitted row.
    pub fn submit_timeslots(&mut self, row: &SourceRow) -> Result<RemoteId> {
        let now = self.now_rfc3339();
        timeslots::submit_timeslots(
            &mut self.store,
            &self.config.nodes.subjects,
            row,
            &self.config.columns,
            self.tz,
            &now,
        )
    }

    /// Post a single form submission to the requests node its source routes
    /// to. Returns `None` when the submission carries at most one field.
    pub fn submit_request(&mut self, source_name: &str, row: &SourceRow) -> Result<Option<String>> {
        let now = self.now_rfc3339();
        let payload = payload::derive_payload(row, &self.config.columns).with_default_timestamp(|| now);
        if payload.field_count() <= 1 {
            warn!(source = source_name, "empty submission ignored");
            return Ok(None);
        }
        let node = self
            .config
            .nodes
            .requests_for(self.destination(source_name))
            .to_string();
        let id = self.store.post(&node, &serde_json::to_value(&payload)?)?;
        info!(node = %node, id = %id, "submission stored");
        Ok(Some(id))
    }

    /// Delete `node` and rebuild it from every usable row of `source`.
    pub fn repopulate(&mut self, source: &dyn TabularSource, node: &str) -> Result<RunSummary> {
        info!(node, source = source.name(), "repopulating node");
        self.store.delete(node)?;

        let rows = source.rows();
        let mut records = std::collections::BTreeMap::new();
        for row in &rows {
            let now = self.now_rfc3339();
            let payload =
                payload::derive_payload(row, &self.config.columns).with_default_timestamp(|| now);
            if payload.class_level.is_some() && payload.requested_labs.is_some() {
                records.insert(self.ids.generate(), payload);
            }
        }
        if records.is_empty() {
            warn!(node, "no usable rows; node left empty");
        }

        let written = self.batch_writer().write(&mut self.store, node, &records)?;
        let summary = RunSummary {
            created: written,
            skipped: rows.len() - written,
            ..RunSummary::default()
        };
        info!(%summary, node, "node repopulated");
        Ok(summary)
    }
}
