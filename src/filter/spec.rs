//! Filter predicate shared by the JSON and binary paths.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::error::FilterSpecError;
use crate::storage::models::RecordKey;

/// Type-set plus half-open time window `[start, end)`.
///
/// An empty type set selects every type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    type_ids: BTreeSet<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl FilterSpec {
    /// Validate and build a predicate. `start > end` is rejected; `start == end`
    /// is a valid, empty window.
    pub fn new<I, S>(
        type_ids: I,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, FilterSpecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if start > end {
            return Err(FilterSpecError::InvertedRange { start, end });
        }
        Ok(Self {
            type_ids: type_ids.into_iter().map(Into::into).collect(),
            start,
            end,
        })
    }

    /// Every type inside `[start, end)`.
    pub fn all_types(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, FilterSpecError> {
        Self::new(Vec::<String>::new(), start, end)
    }

    /// Default window covering every key: from the earliest timestamp
    /// truncated to the second, to one second past the latest timestamp
    /// truncated to the second. `None` when there are no keys.
    pub fn covering<'a, I>(keys: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a RecordKey>,
    {
        let mut bounds: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        for key in keys {
            bounds = Some(match bounds {
                None => (key.timestamp, key.timestamp),
                Some((lo, hi)) => (lo.min(key.timestamp), hi.max(key.timestamp)),
            });
        }
        let (lo, hi) = bounds?;
        let start = truncate_to_second(lo);
        let end = truncate_to_second(hi) + Duration::seconds(1);
        Self::all_types(start, end).ok()
    }

    /// Same window, restricted to `type_ids`.
    pub fn with_types<I, S>(mut self, type_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_ids = type_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn type_ids(&self) -> &BTreeSet<String> {
        &self.type_ids
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn selects_all_types(&self) -> bool {
        self.type_ids.is_empty()
    }

    pub fn matches_type(&self, type_id: &str) -> bool {
        self.type_ids.is_empty() || self.type_ids.contains(type_id)
    }

    pub fn matches_time(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    pub fn matches(&self, type_id: &str, timestamp: DateTime<Utc>) -> bool {
        self.matches_type(type_id) && self.matches_time(timestamp)
    }
}

fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::seconds(1)).unwrap_or(ts)
}
