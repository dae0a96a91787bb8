//! Result Store - persisted ledger of run records
//!
//! The store keeps at most one record per parameter value. Every mutation
//! rewrites the whole JSON file, so a kill at any point loses at most the
//! run that was in flight.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{RunRecord, RunStatus};
use crate::persist::{sibling, write_atomic};
use crate::{Error, Result};

/// File-backed store of [`RunRecord`]s for one sweep session.
///
/// ## Usage
///
/// ```rust,no_run
/// use sweep_harness::experiment::{Outcome, ResultStore, RunRecord};
///
/// let mut store = ResultStore::load("simulation_results.json")?;
/// for parameter in store.pending(1..=10) {
///     store.upsert(RunRecord::new(parameter, Outcome::Steps(100)))?;
/// }
/// store.finalize()?;
/// # Ok::<(), sweep_harness::Error>(())
/// ```
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    records: Vec<RunRecord>,
}

impl ResultStore {
    /// Create an empty store bound to `path` without touching the file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Load the store at `path`.
    ///
    /// A missing or blank file yields an empty store. Unparseable content is
    /// moved aside to `<path>.corrupt` (best effort) and replaced with an
    /// empty store.
    ///
    /// # Errors
    ///
    /// Returns error only if the file exists but cannot be read, or if the
    /// replacement empty store cannot be written.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(path);
        let text = match std::fs::read_to_string(&store.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %store.path.display(), "no result store yet");
                return Ok(store);
            }
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(store);
        }

        match Self::parse(&text) {
            Ok(records) => {
                for record in records {
                    store.insert(record);
                }
                info!(count = store.records.len(), path = %store.path.display(), "loaded existing results");
            }
            Err(e) => {
                warn!(error = %e, path = %store.path.display(), "result store corrupt, starting empty");
                let aside = sibling(&store.path, ".corrupt");
                if let Err(e) = std::fs::copy(&store.path, &aside) {
                    warn!(error = %e, "could not preserve corrupt result store");
                }
                store.persist()?;
            }
        }
        Ok(store)
    }

    /// Load an existing, non-empty store for read-only analysis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoResults`] when the file is missing or holds no records,
    /// and [`Error::StoreCorrupt`] when it cannot be parsed.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NoResults(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let records = Self::parse(&text)?;
        let mut store = Self::new(path);
        for record in records {
            store.insert(record);
        }
        if store.is_empty() {
            return Err(Error::NoResults(path.to_path_buf()));
        }
        Ok(store)
    }

    fn parse(text: &str) -> Result<Vec<RunRecord>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(text).map_err(|e| Error::StoreCorrupt(e.to_string()))
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the number of records (one per parameter).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// All records in store order.
    #[must_use]
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Record for a parameter value, if any.
    #[must_use]
    pub fn get(&self, parameter: u32) -> Option<&RunRecord> {
        self.records.iter().find(|r| r.parameter() == parameter)
    }

    /// Records with the given status.
    pub fn with_status(&self, status: RunStatus) -> impl Iterator<Item = &RunRecord> + '_ {
        self.records.iter().filter(move |r| r.status() == status)
    }

    /// Replace the record for the same parameter, or append.
    fn insert(&mut self, record: RunRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.parameter() == record.parameter())
        {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    /// Insert `record`, superseding any earlier one for its parameter, and
    /// persist the full store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persist`] if the store cannot be written.
    pub fn upsert(&mut self, record: RunRecord) -> Result<()> {
        debug!(parameter = record.parameter(), outcome = %record.outcome(), "recording run");
        self.insert(record);
        self.persist()
    }

    /// Parameter values in `candidates` that have no record yet, ascending
    /// and without duplicates.
    #[must_use]
    pub fn pending(&self, candidates: impl IntoIterator<Item = u32>) -> Vec<u32> {
        let candidates: BTreeSet<u32> = candidates.into_iter().collect();
        candidates
            .into_iter()
            .filter(|p| self.get(*p).is_none())
            .collect()
    }

    /// Sort by parameter ascending and persist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persist`] if the store cannot be written.
    pub fn finalize(&mut self) -> Result<()> {
        self.records.sort_by_key(RunRecord::parameter);
        self.persist()?;
        info!(count = self.records.len(), path = %self.path.display(), "results finalized");
        Ok(())
    }

    /// Drop every record and persist the empty store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persist`] if the store cannot be written.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        info!(path = %self.path.display(), "results cleared");
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, json.as_bytes()).map_err(|source| Error::Persist {
            path: self.path.clone(),
            source,
        })
    }
}
