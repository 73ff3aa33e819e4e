// src/normalize/mod.rs
pub mod providers;
pub mod router;
pub mod types;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{canonical_date, Field, Response};
use crate::observe::{Finding, FindingKind, Observer};
use crate::normalize::types::DateBucket;

pub use router::NormalizationRouter;
pub use types::ProviderStrategy;

/// Host part of `url`, lowercased, without userinfo or port.
pub(crate) fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, r)| r)?;
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Parse the payload of a claimed response. Invalid JSON is fatal for the run.
pub(crate) fn parse_payload(response: &Response) -> Result<Value> {
    serde_json::from_slice(&response.payload).map_err(|source| Error::Decode {
        hash: response.meta.content_hash.clone(),
        source,
    })
}

/// One numeric column of a dated row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Column {
    pub key: &'static str,
    pub field: Field,
    /// Unit conversion applied before truncating to a whole number.
    pub scale: f64,
}

impl Column {
    pub const fn new(key: &'static str, field: Field) -> Self {
        Self {
            key,
            field,
            scale: 1.0,
        }
    }

    pub const fn scaled(key: &'static str, field: Field, scale: f64) -> Self {
        Self { key, field, scale }
    }
}

fn to_whole(v: &Value, scale: f64) -> Option<i64> {
    if scale == 1.0 {
        if let Some(i) = v.as_i64() {
            return Some(i);
        }
    }
    let f = v.as_f64()? * scale;
    f.is_finite().then_some(f.trunc() as i64)
}

/// Decode one dated row into `bucket`, merging every column under the
/// non-null-max rule. Unreadable dates or values are reported and skipped.
/// Returns the number of numeric observations merged.
pub(crate) fn decode_row(
    bucket: &mut DateBucket,
    observer: &dyn Observer,
    section: &str,
    row: &Value,
    date_key: &str,
    columns: &[Column],
) -> usize {
    let raw_date = row.get(date_key).and_then(Value::as_str);
    let Some(date) = raw_date.and_then(canonical_date) else {
        observer.record(Finding::warning(
            FindingKind::SkippedObservation,
            section,
            format!("row without a usable {date_key:?}: {}", truncate(&row.to_string(), 200)),
        ));
        return 0;
    };

    let mut merged = 0;
    for col in columns {
        match row.get(col.key) {
            None | Some(Value::Null) => bucket.upsert(&date, col.field, None),
            Some(v) => match to_whole(v, col.scale) {
                Some(n) => {
                    bucket.upsert(&date, col.field, Some(n));
                    merged += 1;
                }
                None => observer.record(Finding::warning(
                    FindingKind::SkippedObservation,
                    section,
                    format!("{date}: {} is not numeric: {v}", col.key),
                )),
            },
        }
    }
    merged
}

/// Rows of `section` in `data`; reports and returns nothing if it is not an array.
pub(crate) fn rows<'a>(
    observer: &dyn Observer,
    data: &'a Value,
    section: &str,
) -> &'a [Value] {
    match data.get(section).and_then(Value::as_array) {
        Some(rows) => rows.as_slice(),
        None => {
            observer.record(Finding::warning(
                FindingKind::UnknownSection,
                section,
                format!("expected an array under {section:?}"),
            ));
            &[]
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
