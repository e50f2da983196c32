//! Chunked partial-update writes.

use crate::error::{Result, SyncError};
use crate::model::RemoteId;
use crate::store::RemoteStore;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Splits an id→record map into chunks of at most `chunk_size` entries and
/// patches them into a node one after another. The first failing chunk aborts
/// the rest; chunks already sent stay written, and a failure after the first
/// chunk is reported as [`SyncError::PartialBatch`].
#[derive(Debug, Clone, Copy)]
pub struct BatchWriter {
    chunk_size: usize,
}

impl BatchWriter {
    /// A chunk size of 0 is treated as 1.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Write `records` under `node`; returns the number of records written.
    pub fn write<S, T>(&self, store: &mut S, node: &str, records: &BTreeMap<RemoteId, T>) -> Result<usize>
    where
        S: RemoteStore + ?Sized,
        T: Serialize,
    {
        if records.is_empty() {
            debug!(node, "nothing to write");
            return Ok(0);
        }

        let mut written = 0;
        let mut chunk = Map::new();
        for (id, record) in records {
            chunk.insert(id.0.clone(), serde_json::to_value(record)?);
            if chunk.len() == self.chunk_size {
                written += self.flush(store, node, &mut chunk, written)?;
            }
        }
        if !chunk.is_empty() {
            written += self.flush(store, node, &mut chunk, written)?;
        }

        info!(node, records = written, "batch written");
        Ok(written)
    }

    fn flush<S>(
        &self,
        store: &mut S,
        node: &str,
        chunk: &mut Map<String, Value>,
        written: usize,
    ) -> Result<usize>
    where
        S: RemoteStore + ?Sized,
    {
        let size = chunk.len();
        let body = Value::Object(std::mem::take(chunk));
        if let Err(err) = store.patch(node, &body) {
            if written == 0 {
                return Err(err);
            }
            return Err(SyncError::PartialBatch {
                node: node.to_string(),
                written,
                source: Box::new(err),
            });
        }
        debug!(node, size, "chunk sent");
        Ok(size)
    }
}

impl Default for BatchWriter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BATCH_SIZE)
    }
}
