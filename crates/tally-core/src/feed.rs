//! JSON feeds in and out of the aggregator.
//!
//! Both feeds are whole-file JSON arrays: events are read wholesale, and the
//! summary is written wholesale as a 2-space pretty-printed array.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::TallyError;
use crate::event::Event;
use crate::summary::OutputRecord;

/// Destination for flattened summary records.
pub trait SummarySink {
    /// Replace the destination's contents with `records`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be written.
    fn write_summary(&mut self, records: &[OutputRecord]) -> Result<(), TallyError>;
}

/// Read a JSON array of events.
///
/// # Errors
///
/// Returns [`TallyError::Read`] if the file cannot be read and
/// [`TallyError::MalformedEvent`] if it is not an array of well-formed events.
pub fn read_events(path: &Path) -> Result<Vec<Event>, TallyError> {
    let bytes = fs::read(path).map_err(|source| TallyError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| TallyError::MalformedEvent {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a previous run's summary, or `None` if it was never written.
///
/// # Errors
///
/// Returns [`TallyError::Read`] on I/O failure other than a missing file and
/// [`TallyError::MalformedSummary`] if the content is not a record array.
pub fn read_prior_summary(path: &Path) -> Result<Option<Vec<OutputRecord>>, TallyError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(TallyError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| TallyError::MalformedSummary {
            path: path.to_path_buf(),
            source,
        })
}

/// Summary written to a JSON file, replaced atomically.
#[derive(Debug, Clone)]
pub struct JsonSummaryFile {
    path: PathBuf,
}

impl JsonSummaryFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummarySink for JsonSummaryFile {
    fn write_summary(&mut self, records: &[OutputRecord]) -> Result<(), TallyError> {
        let mut body = serde_json::to_vec_pretty(records).map_err(|err| TallyError::Write {
            path: self.path.clone(),
            source: io::Error::other(err),
        })?;
        body.push(b'\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|source| TallyError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| TallyError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "summary written");
        Ok(())
    }
}

/// Keeps the most recently written summary in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySummarySink {
    records: Vec<OutputRecord>,
    writes: usize,
}

impl MemorySummarySink {
    #[must_use]
    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    /// Number of times the sink has been written.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    #[must_use]
    pub fn into_records(self) -> Vec<OutputRecord> {
        self.records
    }
}

impl SummarySink for MemorySummarySink {
    fn write_summary(&mut self, records: &[OutputRecord]) -> Result<(), TallyError> {
        self.records = records.to_vec();
        self.writes += 1;
        Ok(())
    }
}
