//! Incremental aggregation of activity events into daily per-user counts.
//!
//! A run looks like this:
//!
//! 1. Build an [`Aggregator`] from the persisted watermark.
//! 2. Optionally seed it with the previous run's summary records.
//! 3. Fold the new event batch with [`Aggregator::process_events`].
//! 4. Write the flattened table and persist the watermark with
//!    [`Aggregator::flatten_and_persist`].
//!
//! # Watermark rules
//!
//! - Each event is compared against the live watermark. An event at or
//!   below it is skipped without touching the table, so a second event
//!   sharing the timestamp of one just folded is skipped too.
//! - Every event that is not skipped moves the watermark to its timestamp,
//!   including events whose type is not counted. Since only events above
//!   the watermark get that far, it never moves backwards.
//! - With [`EventOrder::ByTimestamp`] (the default) the batch is stably
//!   sorted first. With [`EventOrder::AsGiven`] an event older than one
//!   already folded from the same batch is skipped.
//! - Nothing is persisted until the summary has been written.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TallyError;
use crate::event::{Event, UserId};
use crate::feed::SummarySink;
use crate::summary::{DATE_FORMAT, OutputRecord, SummaryTable};
use crate::watermark::WatermarkStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Order in which a batch is folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventOrder {
    /// Stable sort by timestamp before folding.
    #[default]
    ByTimestamp,
    /// Fold in feed order.
    AsGiven,
}

impl EventOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ByTimestamp => "by-timestamp",
            Self::AsGiven => "as-given",
        }
    }
}

impl fmt::Display for EventOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "by-timestamp" => Ok(Self::ByTimestamp),
            "as-given" => Ok(Self::AsGiven),
            other => Err(format!(
                "unknown event order '{other}': expected by-timestamp or as-given"
            )),
        }
    }
}

/// An event that was examined but not counted because of its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownEvent {
    pub event_type: String,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub timestamp: i64,
}

/// Outcome of folding one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    /// Events examined (counted or not).
    pub processed: usize,
    /// Events at or below the watermark.
    pub skipped: usize,
    /// Examined events with an unrecognized type.
    pub unknown: Vec<UnknownEvent>,
}

impl ProcessReport {
    /// Events that incremented a counter.
    #[must_use]
    pub fn counted(&self) -> usize {
        self.processed - self.unknown.len()
    }
}

/// Outcome of [`Aggregator::flatten_and_persist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    /// Records written to the sink.
    pub records: usize,
    /// Watermark saved to the store, if any.
    pub watermark: Option<i64>,
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Folds activity events into a [`SummaryTable`] behind a watermark.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    watermark: Option<i64>,
    table: SummaryTable,
    order: EventOrder,
}

impl Aggregator {
    /// Create an aggregator with the given persisted watermark.
    ///
    /// `None` means every event will be processed.
    #[must_use]
    pub fn new(prior_watermark: Option<i64>) -> Self {
        Self {
            watermark: prior_watermark,
            table: SummaryTable::new(),
            order: EventOrder::default(),
        }
    }

    /// Create an aggregator from whatever `store` has persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn from_store(store: &dyn WatermarkStore, order: EventOrder) -> Result<Self, TallyError> {
        let watermark = store.load()?;
        debug!(?watermark, %order, "aggregator initialized");
        Ok(Self::new(watermark).with_order(order))
    }

    #[must_use]
    pub const fn with_order(mut self, order: EventOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn watermark(&self) -> Option<i64> {
        self.watermark
    }

    #[must_use]
    pub const fn order(&self) -> EventOrder {
        self.order
    }

    #[must_use]
    pub const fn table(&self) -> &SummaryTable {
        &self.table
    }

    /// Populate the table from a previous run's output.
    ///
    /// Records are copied as-is, including fields the aggregator does not
    /// count. When the same (date, user) pair appears twice the first record
    /// wins. The watermark is left alone.
    ///
    /// Returns the number of pairs seeded.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::InvalidSummaryDate`] for a record whose date is
    /// not `YYYY-MM-DD`.
    pub fn seed_from_prior_summary<I>(&mut self, prior_records: I) -> Result<usize, TallyError>
    where
        I: IntoIterator<Item = OutputRecord>,
    {
        let mut seeded = 0;
        for record in prior_records {
            let date = record.parsed_date()?;
            if self.table.seed(date, record.user_id, record.counts) {
                seeded += 1;
            }
        }
        debug!(seeded, "seeded summary table from prior output");
        Ok(seeded)
    }

    /// Fold a batch of events into the table.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::TimestampOutOfRange`] if an event's timestamp
    /// cannot be mapped to a date, or [`TallyError::NonNumericCounter`] if
    /// a seeded counter it would increment is not a number. Events before
    /// it in the batch have already been folded; nothing has been persisted.
    pub fn process_events<I>(&mut self, events: I) -> Result<ProcessReport, TallyError>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut batch: Vec<Event> = events.into_iter().collect();
        if self.order == EventOrder::ByTimestamp {
            batch.sort_by_key(|event| event.timestamp);
        }

        let mut report = ProcessReport::default();

        for event in batch {
            if self.watermark.is_some_and(|wm| event.timestamp <= wm) {
                report.skipped += 1;
                continue;
            }

            let date = event.date()?;
            let timestamp = event.timestamp;
            let kind = event.kind();
            let counts = self.table.entry(date, event.user_id.clone());

            match kind {
                Ok(kind) => {
                    if !counts.increment(kind) {
                        return Err(TallyError::NonNumericCounter {
                            field: kind.as_str(),
                            user: event.user_id.to_string(),
                            date: date.format(DATE_FORMAT).to_string(),
                        });
                    }
                }
                Err(unknown) => {
                    warn!(
                        event_type = %unknown.raw,
                        user = %event.user_id,
                        %date,
                        "unknown event type '{}' for user {} on {}",
                        unknown.raw,
                        event.user_id,
                        date
                    );
                    report.unknown.push(UnknownEvent {
                        event_type: unknown.raw,
                        user_id: event.user_id,
                        date,
                        timestamp,
                    });
                }
            }

            self.watermark = Some(timestamp);
            report.processed += 1;
        }

        debug!(
            processed = report.processed,
            skipped = report.skipped,
            unknown = report.unknown.len(),
            watermark = ?self.watermark,
            "batch folded"
        );
        Ok(report)
    }

    /// Flatten the table into output records ordered by date, then user.
    #[must_use]
    pub fn flatten(&self) -> Vec<OutputRecord> {
        self.table.to_records()
    }

    /// Write the flattened table to `output`, then persist the watermark.
    ///
    /// The watermark is only saved when it is set and only after the
    /// summary write succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if either the sink or the store fails.
    pub fn flatten_and_persist(
        &self,
        output: &mut dyn SummarySink,
        store: &dyn WatermarkStore,
    ) -> Result<PersistReport, TallyError> {
        let records = self.flatten();
        output.write_summary(&records)?;

        if let Some(watermark) = self.watermark {
            store.save(watermark)?;
        }

        Ok(PersistReport {
            records: records.len(),
            watermark: self.watermark,
        })
    }
}
