//! tally-core library.
//!
//! Folds timestamped user activity events into per-user, per-day counts,
//! skipping anything at or below a persisted watermark so reruns only see
//! new events.
//!
//! # Conventions
//!
//! - **Errors**: fallible core operations return [`error::TallyError`];
//!   config loading uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod lock;
pub mod summary;
pub mod watermark;

pub use aggregate::{Aggregator, EventOrder, PersistReport, ProcessReport, UnknownEvent};
pub use error::{ErrorCode, TallyError};
pub use event::{Event, EventType, UserId};
pub use summary::{DailyUserCounts, OutputRecord, SummaryTable};
