//! Summary table and its flat record form.
//!
//! The table is a two-level map `date -> user -> counts`. Entries are only
//! created through [`SummaryTable::entry`] (zeroed on first touch) or
//! [`SummaryTable::seed`] (copied from a prior summary record), so there is
//! no implicit default construction anywhere else.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::TallyError;
use crate::event::{EventType, UserId};

/// Calendar date format used in summary records.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Per-user, per-day counters.
///
/// Counters are kept as raw JSON values so a record seeded from a prior
/// summary is written back exactly as it was read: a counter missing from
/// the record stays missing until the first matching event, and numeric
/// forms such as `2.0` are preserved. Entries created by events start from
/// [`DailyUserCounts::zeroed`]. `extra` only ever holds keys that came in
/// through a seeded record and is written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyUserCounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Value>,
    #[serde(default, rename = "likeReceived", skip_serializing_if = "Option::is_none")]
    pub like_received: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DailyUserCounts {
    /// All three counters present and set to zero.
    #[must_use]
    pub fn zeroed() -> Self {
        Self::with_counts(0, 0, 0)
    }

    #[must_use]
    pub fn with_counts(post: u64, like_received: u64, comment: u64) -> Self {
        Self {
            post: Some(Value::from(post)),
            like_received: Some(Value::from(like_received)),
            comment: Some(Value::from(comment)),
            extra: Map::new(),
        }
    }

    /// Raw counter value, if the field is present.
    #[must_use]
    pub const fn get(&self, kind: EventType) -> Option<&Value> {
        match kind {
            EventType::Post => self.post.as_ref(),
            EventType::LikeReceived => self.like_received.as_ref(),
            EventType::Comment => self.comment.as_ref(),
        }
    }

    /// Counter as an unsigned integer; `None` if missing or not an integer.
    #[must_use]
    pub fn count(&self, kind: EventType) -> Option<u64> {
        self.get(kind).and_then(Value::as_u64)
    }

    /// Add one to the counter for `kind`, creating it at 1 if missing.
    ///
    /// Returns `false` and leaves the record untouched when the existing
    /// value is not a number.
    pub fn increment(&mut self, kind: EventType) -> bool {
        let slot = match kind {
            EventType::Post => &mut self.post,
            EventType::LikeReceived => &mut self.like_received,
            EventType::Comment => &mut self.comment,
        };
        match bumped(slot.as_ref()) {
            Some(next) => {
                *slot = Some(next);
                true
            }
            None => false,
        }
    }

    /// Sum of the integer counters; missing or non-integer counters add 0.
    #[must_use]
    pub fn total(&self) -> u64 {
        EventType::ALL
            .iter()
            .map(|kind| self.count(*kind).unwrap_or(0))
            .fold(0, u64::saturating_add)
    }
}

fn bumped(current: Option<&Value>) -> Option<Value> {
    let Some(current) = current else {
        return Some(Value::from(1_u64));
    };
    let Value::Number(n) = current else {
        return None;
    };

    if let Some(v) = n.as_u64() {
        Some(Value::from(v.saturating_add(1)))
    } else if let Some(v) = n.as_i64() {
        Some(Value::from(v.saturating_add(1)))
    } else {
        n.as_f64()
            .and_then(|v| Number::from_f64(v + 1.0))
            .map(Value::Number)
    }
}

/// One flattened (date, user) summary row, as written to the output feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// `YYYY-MM-DD`.
    pub date: String,
    #[serde(flatten)]
    pub counts: DailyUserCounts,
}

impl OutputRecord {
    /// Parse the record's date string.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::InvalidSummaryDate`] if the date is not `YYYY-MM-DD`.
    pub fn parsed_date(&self) -> Result<NaiveDate, TallyError> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|_| {
            TallyError::InvalidSummaryDate {
                raw: self.date.clone(),
                user: self.user_id.to_string(),
            }
        })
    }
}

/// Two-level keyed container: date, then user, then counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    days: BTreeMap<NaiveDate, BTreeMap<UserId, DailyUserCounts>>,
}

impl SummaryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the counts for `(date, user)`, zeroed when created.
    pub fn entry(&mut self, date: NaiveDate, user: UserId) -> &mut DailyUserCounts {
        self.days
            .entry(date)
            .or_default()
            .entry(user)
            .or_insert_with(DailyUserCounts::zeroed)
    }

    /// Insert seeded counts unless the pair already exists.
    ///
    /// Returns `true` if the counts were inserted.
    pub fn seed(&mut self, date: NaiveDate, user: UserId, counts: DailyUserCounts) -> bool {
        let users = self.days.entry(date).or_default();
        if users.contains_key(&user) {
            return false;
        }
        users.insert(user, counts);
        true
    }

    #[must_use]
    pub fn get(&self, date: NaiveDate, user: &UserId) -> Option<&DailyUserCounts> {
        self.days.get(&date).and_then(|users| users.get(user))
    }

    /// Number of (date, user) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.values().all(BTreeMap::is_empty)
    }

    /// Iterate pairs ordered by date, then user.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &UserId, &DailyUserCounts)> {
        self.days
            .iter()
            .flat_map(|(date, users)| users.iter().map(move |(user, counts)| (*date, user, counts)))
    }

    /// Flatten into output records, one per (date, user) pair.
    #[must_use]
    pub fn to_records(&self) -> Vec<OutputRecord> {
        self.iter()
            .map(|(date, user, counts)| OutputRecord {
                user_id: user.clone(),
                date: date.format(DATE_FORMAT).to_string(),
                counts: counts.clone(),
            })
            .collect()
    }
}
