//! Activity event model.
//!
//! Events arrive as JSON objects with `timestamp` (epoch seconds), `userId`
//! (string or integer) and `eventType`. Only three event types are counted;
//! anything else parses to [`UnknownEventType`] and is tolerated by the
//! aggregator rather than rejected at load time.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TallyError;

/// The counted activity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    /// The user published a post.
    Post,
    /// One of the user's posts received a like.
    LikeReceived,
    /// The user left a comment.
    Comment,
}

/// Error returned when parsing an event type outside the counted set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event type '{}': expected one of post, likeReceived, comment",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventType {}

impl EventType {
    /// All counted event types in output field order.
    pub const ALL: [Self; 3] = [Self::Post, Self::LikeReceived, Self::Comment];

    /// Return the wire name used in event feeds and summary records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::LikeReceived => "likeReceived",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "likeReceived" => Ok(Self::LikeReceived),
            "comment" => Ok(Self::Comment),
            _ => Err(UnknownEventType { raw: s.to_string() }),
        }
    }
}

/// User identifier as it appears in the feed.
///
/// Feeds mix numeric and string ids; the original form is kept so that
/// summary records echo exactly what was read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// A single user activity event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// Raw type string; see [`Event::kind`].
    #[serde(rename = "eventType")]
    pub event_type: String,
}

impl Event {
    #[must_use]
    pub fn new(timestamp: i64, user_id: impl Into<UserId>, event_type: impl Into<String>) -> Self {
        Self {
            timestamp,
            user_id: user_id.into(),
            event_type: event_type.into(),
        }
    }

    /// Classify the raw type string.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownEventType`] when the type is not one of the counted kinds.
    pub fn kind(&self) -> Result<EventType, UnknownEventType> {
        self.event_type.parse()
    }

    /// UTC calendar day the event falls on.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::TimestampOutOfRange`] for timestamps chrono
    /// cannot represent.
    pub fn date(&self) -> Result<NaiveDate, TallyError> {
        utc_date(self.timestamp)
    }
}

/// Truncate epoch seconds to the UTC calendar date.
///
/// # Errors
///
/// Returns [`TallyError::TimestampOutOfRange`] for timestamps chrono cannot
/// represent.
pub fn utc_date(timestamp: i64) -> Result<NaiveDate, TallyError> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.date_naive())
        .ok_or(TallyError::TimestampOutOfRange(timestamp))
}
