use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MalformedEvent,
    MalformedSummary,
    InvalidSummaryDate,
    TimestampOutOfRange,
    NonNumericCounter,
    CorruptWatermark,
    FileReadFailed,
    FileWriteFailed,
    LockContention,
    LockUnavailable,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::MalformedEvent => "E2001",
            Self::MalformedSummary => "E2002",
            Self::InvalidSummaryDate => "E2003",
            Self::TimestampOutOfRange => "E2004",
            Self::NonNumericCounter => "E2005",
            Self::CorruptWatermark => "E3001",
            Self::FileReadFailed => "E5001",
            Self::FileWriteFailed => "E5002",
            Self::LockContention => "E5003",
            Self::LockUnavailable => "E5004",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MalformedEvent => "Malformed input event",
            Self::MalformedSummary => "Malformed prior summary",
            Self::InvalidSummaryDate => "Invalid summary date",
            Self::TimestampOutOfRange => "Event timestamp out of range",
            Self::NonNumericCounter => "Non-numeric summary counter",
            Self::CorruptWatermark => "Corrupt watermark file",
            Self::FileReadFailed => "File read failed",
            Self::FileWriteFailed => "File write failed",
            Self::LockContention => "Lock contention",
            Self::LockUnavailable => "Lock file unavailable",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in tally.toml and retry."),
            Self::MalformedEvent => {
                Some("Every event needs integer `timestamp`, `userId` and `eventType` fields.")
            }
            Self::MalformedSummary => {
                Some("Rerun without --update, or restore the previous summary file.")
            }
            Self::InvalidSummaryDate => Some("Summary dates must be formatted as YYYY-MM-DD."),
            Self::TimestampOutOfRange => None,
            Self::NonNumericCounter => {
                Some("Fix the counter in the prior summary, or rerun without --update.")
            }
            Self::CorruptWatermark => Some(
                "The watermark file must hold a single decimal timestamp. Delete it to reprocess everything.",
            ),
            Self::FileReadFailed => None,
            Self::FileWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `tally` process releases its lock."),
            Self::LockUnavailable => {
                Some("Check that the watermark directory exists and is writable.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fatal errors raised while loading, folding, or persisting activity data.
///
/// Unknown event types are deliberately absent: they are tolerated by the
/// aggregator and reported through [`crate::aggregate::ProcessReport`].
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("{}: malformed event feed {path}: {source}", ErrorCode::MalformedEvent.code())]
    MalformedEvent {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: malformed summary {path}: {source}", ErrorCode::MalformedSummary.code())]
    MalformedSummary {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: invalid summary date '{raw}' for user {user}", ErrorCode::InvalidSummaryDate.code())]
    InvalidSummaryDate { raw: String, user: String },

    #[error("{}: timestamp {0} cannot be mapped to a calendar date", ErrorCode::TimestampOutOfRange.code())]
    TimestampOutOfRange(i64),

    #[error("{}: counter '{field}' for user {user} on {date} is not a number", ErrorCode::NonNumericCounter.code())]
    NonNumericCounter {
        field: &'static str,
        user: String,
        date: String,
    },

    #[error("{}: watermark file {path} holds '{raw}', expected a decimal timestamp", ErrorCode::CorruptWatermark.code())]
    CorruptWatermark { path: PathBuf, raw: String },

    #[error("{}: failed to read {path}: {source}", ErrorCode::FileReadFailed.code())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: failed to write {path}: {source}", ErrorCode::FileWriteFailed.code())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TallyError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedEvent { .. } => ErrorCode::MalformedEvent,
            Self::MalformedSummary { .. } => ErrorCode::MalformedSummary,
            Self::InvalidSummaryDate { .. } => ErrorCode::InvalidSummaryDate,
            Self::TimestampOutOfRange(_) => ErrorCode::TimestampOutOfRange,
            Self::NonNumericCounter { .. } => ErrorCode::NonNumericCounter,
            Self::CorruptWatermark { .. } => ErrorCode::CorruptWatermark,
            Self::Read { .. } => ErrorCode::FileReadFailed,
            Self::Write { .. } => ErrorCode::FileWriteFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
