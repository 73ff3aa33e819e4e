// src/model.rs
//! Core value types: captured responses, providers, metric fields and the
//! per-provider, per-date [`DataPoint`] bundle.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical date key format (`YYYY-MM-DD`), lexicographically sortable.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// date → data point, for one provider. Keys are canonical date strings.
pub type Series = BTreeMap<String, DataPoint>;

/// provider → series.
pub type MultiProviderSeries = BTreeMap<Provider, Series>;

/// date → (provider → data point); the transposed view used for validation and export.
pub type DateIndexedSnapshot = BTreeMap<String, BTreeMap<Provider, DataPoint>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(rename = "sha256", alias = "contentHash")]
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "url", alias = "sourceUrl", default)]
    pub source_url: Option<String>,
}

/// One captured network exchange. Identity is `meta.content_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub meta: ResponseMeta,
    pub payload: Vec<u8>,
}

impl Response {
    /// Build a response from raw bytes, hashing them and stamping `timestamp`.
    pub fn new(payload: Vec<u8>, source_url: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            meta: ResponseMeta {
                content_hash: content_hash(&payload),
                timestamp,
                source_url,
            },
            payload,
        }
    }

    /// Producer helper: serialize a JSON body captured now.
    pub fn from_json(body: &serde_json::Value, source_url: Option<&str>) -> Self {
        Self::new(
            body.to_string().into_bytes(),
            source_url.map(str::to_string),
            Utc::now(),
        )
    }

    pub fn url(&self) -> &str {
        self.meta.source_url.as_deref().unwrap_or_default()
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Podcast platforms acting as metric sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provider {
    Spotify,
    Apple,
    Amazon,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Spotify, Provider::Apple, Provider::Amazon];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Spotify => "Spotify",
            Provider::Apple => "Apple",
            Provider::Amazon => "Amazon",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider {s:?}"))
    }
}

/// The metric slots of a [`DataPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FollowerCount,
    ListenerCount,
    EngagedListenerCount,
    ConsumptionSeconds,
    ForegroundConsumptionSeconds,
    StreamCount,
    StreamStartCount,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::FollowerCount,
        Field::ListenerCount,
        Field::EngagedListenerCount,
        Field::ConsumptionSeconds,
        Field::ForegroundConsumptionSeconds,
        Field::StreamCount,
        Field::StreamStartCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::FollowerCount => "follower_count",
            Field::ListenerCount => "listener_count",
            Field::EngagedListenerCount => "engaged_listener_count",
            Field::ConsumptionSeconds => "consumption_seconds",
            Field::ForegroundConsumptionSeconds => "foreground_consumption_seconds",
            Field::StreamCount => "stream_count",
            Field::StreamStartCount => "stream_start_count",
        }
    }

    /// Short metric name used on the command line ("follower", "stream_start", ...).
    pub fn metric_name(self) -> &'static str {
        match self {
            Field::FollowerCount => "follower",
            Field::ListenerCount => "listener",
            Field::EngagedListenerCount => "engaged_listener",
            Field::ConsumptionSeconds => "consumption",
            Field::ForegroundConsumptionSeconds => "foreground_consumption",
            Field::StreamCount => "stream",
            Field::StreamStartCount => "stream_start",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s || f.metric_name() == s)
            .ok_or_else(|| format!("unknown metric field {s:?}"))
    }
}

/// Non-null-max merge: `None` is smaller than any number, two numbers keep the larger.
pub fn merge_max(existing: Option<i64>, new: Option<i64>) -> Option<i64> {
    match (existing, new) {
        (None, None) => None,
        (None, Some(x)) | (Some(x), None) => Some(x),
        (Some(x), Some(y)) => Some(x.max(y)),
    }
}

/// Per-provider, per-date bundle of optional metric values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub provider: Option<Provider>,
    pub follower_count: Option<i64>,
    pub listener_count: Option<i64>,
    pub engaged_listener_count: Option<i64>,
    pub consumption_seconds: Option<i64>,
    pub foreground_consumption_seconds: Option<i64>,
    pub stream_count: Option<i64>,
    pub stream_start_count: Option<i64>,
}

impl DataPoint {
    /// Empty point already tagged with `provider`; fills gaps in transposed views.
    pub fn placeholder(provider: Provider) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }

    /// True iff every metric field is unset.
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_none())
    }

    pub fn get(&self, field: Field) -> Option<i64> {
        match field {
            Field::FollowerCount => self.follower_count,
            Field::ListenerCount => self.listener_count,
            Field::EngagedListenerCount => self.engaged_listener_count,
            Field::ConsumptionSeconds => self.consumption_seconds,
            Field::ForegroundConsumptionSeconds => self.foreground_consumption_seconds,
            Field::StreamCount => self.stream_count,
            Field::StreamStartCount => self.stream_start_count,
        }
    }

    pub fn slot_mut(&mut self, field: Field) -> &mut Option<i64> {
        match field {
            Field::FollowerCount => &mut self.follower_count,
            Field::ListenerCount => &mut self.listener_count,
            Field::EngagedListenerCount => &mut self.engaged_listener_count,
            Field::ConsumptionSeconds => &mut self.consumption_seconds,
            Field::ForegroundConsumptionSeconds => &mut self.foreground_consumption_seconds,
            Field::StreamCount => &mut self.stream_count,
            Field::StreamStartCount => &mut self.stream_start_count,
        }
    }

    /// Fold one observation into `field` with [`merge_max`].
    pub fn merge(&mut self, field: Field, value: Option<i64>) {
        let slot = self.slot_mut(field);
        *slot = merge_max(*slot, value);
    }

    /// Tag the point with its owning provider. Re-tagging with a different
    /// provider is an integrity error.
    pub fn stamp(&mut self, provider: Provider, date: &str) -> Result<()> {
        match self.provider {
            None => {
                self.provider = Some(provider);
                Ok(())
            }
            Some(existing) if existing == provider => Ok(()),
            Some(existing) => Err(Error::ProviderMismatch {
                date: date.to_string(),
                existing,
                expected: provider,
            }),
        }
    }
}

/// Parse a canonical date key.
pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_FORMAT).map_err(|_| Error::InvalidDate(key.to_string()))
}

/// Canonicalize the leading `YYYY-MM-DD` of an upstream date or timestamp.
pub fn canonical_date(raw: &str) -> Option<String> {
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, DATE_FORMAT)
        .ok()
        .map(|d| d.format(DATE_FORMAT).to_string())
}
