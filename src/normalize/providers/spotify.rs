// src/normalize/providers/spotify.rs
use metrics::counter;
use serde_json::Value;

use crate::error::Result;
use crate::model::{Field, Provider, Response, ResponseMeta};
use crate::normalize::types::{DateBucket, ProviderStrategy};
use crate::normalize::{decode_row, host_of, parse_payload, rows, truncate, Column};
use crate::observe::{Finding, FindingKind, ObserverHandle};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Routes with nothing we track (or only totals we recompute ourselves).
const IGNORED_ROUTES: &[&str] = &[
    "metadata",
    "seamless_switch",
    "onboarding",
    "followersDelta",
    "onSpotifyOverview",
];

const CONSUMPTION: &[Column] = &[
    Column::scaled(
        "totalConsumptionHours",
        Field::ConsumptionSeconds,
        SECONDS_PER_HOUR,
    ),
    Column::scaled(
        "foregroundConsumptionHours",
        Field::ForegroundConsumptionSeconds,
        SECONDS_PER_HOUR,
    ),
];
const FOLLOWERS: &[Column] = &[Column::new("count", Field::FollowerCount)];
const LISTENERS: &[Column] = &[Column::new("count", Field::ListenerCount)];
const STREAMS: &[Column] = &[
    Column::new("starts", Field::StreamStartCount),
    Column::new("streams", Field::StreamCount),
];

/// Decodes the creator dashboard analytics API.
pub struct SpotifyStrategy {
    observer: ObserverHandle,
}

impl SpotifyStrategy {
    pub fn new(observer: ObserverHandle) -> Self {
        Self { observer }
    }
}

/// API route of a dashboard URL: the path after the
/// `/<service>/<version>/shows/<id>/` prefix, without the query string.
pub fn api_route(url: &str) -> String {
    let Some((_, rest)) = url.split_once("://") else {
        return String::new();
    };
    let path = rest.split(['?', '#']).next().unwrap_or_default();
    path.split('/').skip(5).collect::<Vec<_>>().join("/")
}

impl ProviderStrategy for SpotifyStrategy {
    fn provider(&self) -> Provider {
        Provider::Spotify
    }

    fn claims(&self, meta: &ResponseMeta) -> bool {
        meta.source_url
            .as_deref()
            .and_then(host_of)
            .is_some_and(|h| h.contains("spotify"))
    }

    fn decode(&self, bucket: &mut DateBucket, response: &Response) -> Result<()> {
        let route = api_route(response.url());
        if IGNORED_ROUTES.contains(&route.as_str())
            || route.ends_with("/latest")
            || route.ends_with("/total")
        {
            return Ok(());
        }

        let data = parse_payload(response)?;
        let obs = self.observer.as_ref();
        let (section, date_key, columns) = match route.as_str() {
            "consumption/daily" => ("consumptionTimes", "date", CONSUMPTION),
            "followers" => ("counts", "date", FOLLOWERS),
            "listeners" => ("counts", "date", LISTENERS),
            "detailedStreams" => ("detailedStreams", "date", STREAMS),
            _ => {
                let keys: Vec<&str> = data
                    .as_object()
                    .map(|o| o.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                obs.record(Finding::warning(
                    FindingKind::UnknownSection,
                    route.clone(),
                    format!(
                        "unknown API route {route:?} (keys={keys:?}): {}",
                        truncate(&data.to_string(), 200)
                    ),
                ));
                return Ok(());
            }
        };

        let merged: usize = rows(obs, &data, section)
            .iter()
            .map(|row: &Value| decode_row(bucket, obs, section, row, date_key, columns))
            .sum();
        counter!("normalize_observations_total", "provider" => "Spotify").increment(merged as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RecordingObserver;
    use serde_json::json;
    use std::sync::Arc;

    const BASE: &str = "https://generic.wg.spotify.com/podcasters/v0/shows/abc123";

    fn response(route: &str, body: Value) -> Response {
        Response::from_json(&body, Some(&format!("{BASE}/{route}?start=2025-01-01")))
    }

    #[test]
    fn route_strips_prefix_and_query() {
        assert_eq!(api_route(&format!("{BASE}/consumption/daily?x=1")), "consumption/daily");
        assert_eq!(api_route(&format!("{BASE}/followers")), "followers");
        assert_eq!(api_route("https://spotify.com/a"), "");
    }

    #[test]
    fn decodes_consumption_hours_as_seconds() {
        let rec = Arc::new(RecordingObserver::new());
        let s = SpotifyStrategy::new(rec.clone());
        let mut bucket = DateBucket::new();
        let r = response(
            "consumption/daily",
            json!({"consumptionTimes": [
                {"date": "2025-01-01", "totalConsumptionHours": 1.5, "foregroundConsumptionHours": 0.5}
            ]}),
        );
        s.decode(&mut bucket, &r).unwrap();
        let p = bucket.get("2025-01-01").unwrap();
        assert_eq!(p.consumption_seconds, Some(5400));
        assert_eq!(p.foreground_consumption_seconds, Some(1800));
        assert!(rec.findings().is_empty());
    }

    #[test]
    fn decodes_streams_and_followers() {
        let s = SpotifyStrategy::new(Arc::new(RecordingObserver::new()));
        let mut bucket = DateBucket::new();
        s.decode(
            &mut bucket,
            &response(
                "detailedStreams",
                json!({"detailedStreams": [{"date": "2025-01-02", "starts": 4, "streams": 3}]}),
            ),
        )
        .unwrap();
        s.decode(
            &mut bucket,
            &response("followers", json!({"counts": [{"date": "2025-01-02", "count": 17}]})),
        )
        .unwrap();
        let p = bucket.get("2025-01-02").unwrap();
        assert_eq!(p.stream_start_count, Some(4));
        assert_eq!(p.stream_count, Some(3));
        assert_eq!(p.follower_count, Some(17));
    }

    #[test]
    fn ignored_routes_never_parse_the_payload() {
        let s = SpotifyStrategy::new(Arc::new(RecordingObserver::new()));
        let mut bucket = DateBucket::new();
        let mut r = response("followers/total", json!({}));
        r.payload = b"not json".to_vec();
        s.decode(&mut bucket, &r).unwrap();
        r.meta.source_url = Some(format!("{BASE}/metadata"));
        s.decode(&mut bucket, &r).unwrap();
        assert!(bucket.is_empty());
    }

    #[test]
    fn unknown_route_warns_and_continues() {
        let rec = Arc::new(RecordingObserver::new());
        let s = SpotifyStrategy::new(rec.clone());
        let mut bucket = DateBucket::new();
        s.decode(&mut bucket, &response("geo/countries", json!({"countries": []})))
            .unwrap();
        let w = rec.of_kind(FindingKind::UnknownSection);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].subject, "geo/countries");
        assert!(bucket.is_empty());
    }

    #[test]
    fn bad_rows_are_skipped_not_fatal() {
        let rec = Arc::new(RecordingObserver::new());
        let s = SpotifyStrategy::new(rec.clone());
        let mut bucket = DateBucket::new();
        s.decode(
            &mut bucket,
            &response(
                "listeners",
                json!({"counts": [
                    {"date": "yesterday", "count": 1},
                    {"date": "2025-01-03", "count": "many"},
                    {"date": "2025-01-04", "count": 9}
                ]}),
            ),
        )
        .unwrap();
        assert_eq!(rec.of_kind(FindingKind::SkippedObservation).len(), 2);
        assert_eq!(bucket.get("2025-01-04").unwrap().listener_count, Some(9));
    }

    #[test]
    fn invalid_json_on_a_tracked_route_is_fatal() {
        let s = SpotifyStrategy::new(Arc::new(RecordingObserver::new()));
        let mut r = response("followers", json!({}));
        r.payload = b"<html>".to_vec();
        assert!(s.decode(&mut DateBucket::new(), &r).is_err());
    }
}
