// src/export.rs
//! Serializable summaries handed to the reporting layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{DataPoint, DateIndexedSnapshot, Field, MultiProviderSeries, Provider};
use crate::repository::Repository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub followers: i64,
    pub listeners: i64,
    pub consumed: i64,
    pub streams: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAggregate {
    pub followers: i64,
    pub listeners: i64,
    pub engaged_listeners: i64,
    pub consumed: i64,
    pub streams: i64,
    /// Date of the latest follower count.
    pub last_date: Option<String>,
}

/// Latest-known totals overall and per provider (every provider is listed,
/// with zeros when it has no data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregates {
    pub sum: Totals,
    pub by_provider: BTreeMap<String, ProviderAggregate>,
}

pub fn aggregates(data: &MultiProviderSeries) -> Aggregates {
    let followers = Repository::followers(data);
    let listeners = Repository::listeners(data);
    let engaged = Repository::engaged_listeners(data);
    let consumed = Repository::consumption(data);
    let streams = Repository::streams(data);

    let by_provider = Provider::ALL
        .into_iter()
        .map(|p| {
            (
                p.as_str().to_string(),
                ProviderAggregate {
                    followers: followers.sum_by_provider(p),
                    listeners: listeners.sum_by_provider(p),
                    engaged_listeners: engaged.sum_by_provider(p),
                    consumed: consumed.sum_by_provider(p),
                    streams: streams.sum_by_provider(p),
                    last_date: followers.last_date_of_provider(p).map(str::to_string),
                },
            )
        })
        .collect();

    Aggregates {
        sum: Totals {
            followers: followers.sum(),
            listeners: listeners.sum(),
            consumed: consumed.sum(),
            streams: streams.sum(),
        },
        by_provider,
    }
}

/// Flat (date, provider) row for document-oriented sinks. Unset fields are 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: String,
    pub scraper: String,
    pub follower_count: i64,
    pub listener_count: i64,
    pub engaged_listener_count: i64,
    pub consumption_seconds: i64,
    pub foreground_consumption_seconds: i64,
    pub stream_count: i64,
    pub stream_start_count: i64,
}

impl Document {
    pub fn new(date: &str, provider: Provider, point: &DataPoint) -> Self {
        let v = |f: Field| point.get(f).unwrap_or(0);
        Self {
            id: format!("{}-{}", provider.as_str(), date),
            date: date.to_string(),
            scraper: provider.as_str().to_string(),
            follower_count: v(Field::FollowerCount),
            listener_count: v(Field::ListenerCount),
            engaged_listener_count: v(Field::EngagedListenerCount),
            consumption_seconds: v(Field::ConsumptionSeconds),
            foreground_consumption_seconds: v(Field::ForegroundConsumptionSeconds),
            stream_count: v(Field::StreamCount),
            stream_start_count: v(Field::StreamStartCount),
        }
    }
}

/// Documents for every (date, provider) cell, dates ascending.
pub fn documents(snapshot: &DateIndexedSnapshot) -> Vec<Document> {
    snapshot
        .iter()
        .flat_map(|(date, row)| {
            row.iter()
                .map(move |(provider, point)| Document::new(date, *provider, point))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Series;

    #[test]
    fn aggregates_list_every_provider() {
        let mut s = Series::new();
        let mut p = DataPoint::placeholder(Provider::Amazon);
        p.follower_count = Some(4);
        p.stream_count = Some(10);
        s.insert("2025-02-01".into(), p);
        let mut data = MultiProviderSeries::new();
        data.insert(Provider::Amazon, s);

        let a = aggregates(&data);
        assert_eq!(a.sum.followers, 4);
        assert_eq!(a.sum.streams, 10);
        assert_eq!(a.by_provider.len(), 3);
        assert_eq!(a.by_provider["Amazon"].last_date.as_deref(), Some("2025-02-01"));
        assert_eq!(a.by_provider["Apple"].followers, 0);

        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["by_provider"]["Amazon"]["streams"], 10);
    }

    #[test]
    fn documents_default_unset_fields_to_zero() {
        let mut p = DataPoint::placeholder(Provider::Spotify);
        p.listener_count = Some(3);
        let doc = Document::new("2025-02-01", Provider::Spotify, &p);
        assert_eq!(doc.id, "Spotify-2025-02-01");
        assert_eq!(doc.listener_count, 3);
        assert_eq!(doc.stream_count, 0);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "Spotify-2025-02-01");
    }
}
