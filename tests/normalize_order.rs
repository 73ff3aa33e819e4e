// tests/normalize_order.rs
use podcast_metrics::observe::RecordingObserver;
use podcast_metrics::{Error, Field, Provider, Response, Transformer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;
use std::sync::Arc;

const SPOTIFY: &str = "https://generic.wg.spotify.com/podcasters/v0/shows/abc123";
const AMAZON: &str = "https://podcasters.amazon.com/api/metrics/podcast/42";

fn spotify(route: &str, body: serde_json::Value) -> Response {
    Response::from_json(&body, Some(&format!("{SPOTIFY}/{route}")))
}

fn fixture_set() -> Vec<Response> {
    vec![
        spotify(
            "followers",
            serde_json::from_str(include_str!("fixtures/spotify_followers.json")).unwrap(),
        ),
        spotify(
            "detailedStreams",
            serde_json::from_str(include_str!("fixtures/spotify_streams.json")).unwrap(),
        ),
        Response::from_json(
            &serde_json::from_str(include_str!("fixtures/amazon_metrics.json")).unwrap(),
            Some(AMAZON),
        ),
        // overlapping capture of the same day with a lower count
        spotify(
            "followers",
            json!({"counts": [{"date": "2025-07-29", "count": 101}, {"date": "2025-07-30", "count": null}]}),
        ),
        spotify("followers/total", json!({"total": 110})),
    ]
}

#[test]
fn any_order_yields_the_same_series() {
    let t = Transformer::new(Arc::new(RecordingObserver::new()));
    let baseline = t.normalize(fixture_set()).unwrap();

    let mut reversed = fixture_set();
    reversed.reverse();
    assert_eq!(t.normalize(reversed).unwrap(), baseline);

    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut shuffled = fixture_set();
        shuffled.shuffle(&mut rng);
        assert_eq!(t.normalize(shuffled).unwrap(), baseline, "seed {seed}");
    }
}

#[test]
fn replaying_a_batch_twice_is_idempotent() {
    let t = Transformer::new(Arc::new(RecordingObserver::new()));
    let once = t.normalize(fixture_set()).unwrap();
    let twice = t
        .normalize(fixture_set().into_iter().chain(fixture_set()))
        .unwrap();
    assert_eq!(once, twice);
}

#[test]
fn follower_count_keeps_the_max_and_ignores_nulls() {
    let t = Transformer::new(Arc::new(RecordingObserver::new()));
    for order in [[100, 120], [120, 100]] {
        let mut batch: Vec<Response> = order
            .iter()
            .map(|c| spotify("followers", json!({"counts": [{"date": "2025-08-01", "count": c}]})))
            .collect();
        batch.push(spotify(
            "followers",
            json!({"counts": [{"date": "2025-08-01", "count": null}]}),
        ));
        let out = t.normalize(batch).unwrap();
        assert_eq!(
            out[&Provider::Spotify]["2025-08-01"].get(Field::FollowerCount),
            Some(120)
        );
    }
}

#[test]
fn cumulative_series_are_non_decreasing_for_additive_fields() {
    let t = Transformer::new(Arc::new(RecordingObserver::new()));
    let out = t.normalize(fixture_set()).unwrap();

    let streams: Vec<i64> = out[&Provider::Spotify]
        .values()
        .filter_map(|p| p.stream_count)
        .collect();
    assert_eq!(streams, vec![9, 13, 19]);
    assert!(streams.windows(2).all(|w| w[0] <= w[1]));

    let amazon = &out[&Provider::Amazon];
    assert_eq!(amazon["2025-07-29"].stream_count, Some(5));
    assert_eq!(amazon["2025-07-29"].follower_count, Some(2));
}

#[test]
fn empty_points_and_providers_are_pruned() {
    let t = Transformer::new(Arc::new(RecordingObserver::new()));
    let out = t
        .normalize(vec![
            spotify("followers", json!({"counts": [{"date": "2025-08-01", "count": null}]})),
            Response::from_json(&json!({"data": {"playsTotals": {"value": 1}}}), Some(AMAZON)),
        ])
        .unwrap();
    assert!(out.is_empty());

    let out = t.normalize(fixture_set()).unwrap();
    assert!(!out[&Provider::Spotify].contains_key("2025-07-30"));
    for series in out.values() {
        assert!(series.values().all(|p| !p.is_empty()));
    }
}

#[test]
fn points_carry_their_provider() {
    let t = Transformer::new(Arc::new(RecordingObserver::new()));
    let out = t.normalize(fixture_set()).unwrap();
    for (provider, series) in &out {
        assert!(series.values().all(|p| p.provider == Some(*provider)));
    }
}

#[test]
fn unclaimed_response_fails_the_whole_run() {
    let t = Transformer::new(Arc::new(RecordingObserver::new()));
    let mut batch = fixture_set();
    batch.insert(
        1,
        Response::from_json(&json!({}), Some("https://podcastsconnect.apple.com/analytics/show/-/1/overview")),
    );
    let err = t.normalize(batch).unwrap_err();
    assert!(matches!(err, Error::Unrouted { .. }));
}
