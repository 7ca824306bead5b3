//! Key summaries for browsing a capture: the type ids present and record
//! counts per time bucket.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::storage::models::RecordKey;

/// Type ids in first-seen order.
pub fn distinct_type_ids(keys: &[RecordKey]) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|k| seen.insert(k.type_id.as_str()))
        .map(|k| k.type_id.clone())
        .collect()
}

/// Floor a timestamp to a bucket of `scale_secs` seconds (minimum 1).
pub fn bucket_of(timestamp: DateTime<Utc>, scale_secs: u32) -> DateTime<Utc> {
    let width = Duration::seconds(i64::from(scale_secs.max(1)));
    timestamp.duration_trunc(width).unwrap_or(timestamp)
}

/// Record count per bucket, ascending by bucket start.
pub fn bucket_counts(keys: &[RecordKey], scale_secs: u32) -> Vec<(DateTime<Utc>, usize)> {
    let mut counts: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(bucket_of(key.timestamp, scale_secs)).or_default() += 1;
    }
    counts.into_iter().collect()
}

/// Keys falling into any of the selected buckets, `order` preserved.
pub fn keys_in_buckets(
    keys: &[RecordKey],
    scale_secs: u32,
    buckets: &[DateTime<Utc>],
) -> Vec<RecordKey> {
    let wanted: HashSet<&DateTime<Utc>> = buckets.iter().collect();
    keys.iter()
        .filter(|k| wanted.contains(&bucket_of(k.timestamp, scale_secs)))
        .cloned()
        .collect()
}
