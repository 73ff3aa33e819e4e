// src/transform.rs
//! # Transformer
//! Turns a batch of captured responses into a per-provider daily series.
//!
//! Steps, in order:
//! 1. route every response to the strategy claiming it and merge its
//!    observations into that provider's date bucket (non-null-max);
//! 2. for cumulative-eligible providers, walk dates ascending and turn the
//!    observations into running totals (per-field [`Accumulation`]);
//! 3. stamp each point with its provider;
//! 4. prune empty points and providers left without dates.
//!
//! The result only depends on the set of responses, not on their order.

use std::collections::{BTreeMap, BTreeSet};

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    DataPoint, DateIndexedSnapshot, Field, MultiProviderSeries, Provider, Response, Series,
};
use crate::normalize::types::DateBucket;
use crate::normalize::NormalizationRouter;
use crate::observe::{Finding, FindingKind, ObserverHandle};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "normalize_responses_total",
            "Responses routed to a provider strategy."
        );
        describe_counter!(
            "normalize_observations_total",
            "Numeric observations merged into date buckets."
        );
    });
}

/// How a field folds into a running total during cumulative reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accumulation {
    /// Snapshot counter: emit the latest observed value.
    Replace,
    /// Delta counter: emit the sum of all observations so far.
    Additive,
}

/// Which providers are reconciled into running totals, and how each field folds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CumulativePolicy {
    pub providers: BTreeSet<Provider>,
    /// Per-field overrides; fields not listed use [`CumulativePolicy::default_accumulation`].
    pub fields: BTreeMap<Field, Accumulation>,
}

impl Default for CumulativePolicy {
    fn default() -> Self {
        Self {
            providers: [Provider::Spotify, Provider::Amazon].into_iter().collect(),
            fields: BTreeMap::new(),
        }
    }
}

impl CumulativePolicy {
    pub fn default_accumulation(field: Field) -> Accumulation {
        match field {
            Field::FollowerCount => Accumulation::Replace,
            _ => Accumulation::Additive,
        }
    }

    pub fn accumulation(&self, field: Field) -> Accumulation {
        self.fields
            .get(&field)
            .copied()
            .unwrap_or_else(|| Self::default_accumulation(field))
    }

    pub fn is_cumulative(&self, provider: Provider) -> bool {
        self.providers.contains(&provider)
    }
}

pub struct Transformer {
    router: NormalizationRouter,
    policy: CumulativePolicy,
    observer: ObserverHandle,
}

impl Transformer {
    /// Default strategies and default reconciliation policy.
    pub fn new(observer: ObserverHandle) -> Self {
        Self::with_policy(CumulativePolicy::default(), observer)
    }

    pub fn with_policy(policy: CumulativePolicy, observer: ObserverHandle) -> Self {
        Self {
            router: NormalizationRouter::with_default_strategies(observer.clone()),
            policy,
            observer,
        }
    }

    pub fn with_router(
        router: NormalizationRouter,
        policy: CumulativePolicy,
        observer: ObserverHandle,
    ) -> Self {
        Self {
            router,
            policy,
            observer,
        }
    }

    pub fn policy(&self) -> &CumulativePolicy {
        &self.policy
    }

    pub fn normalize<I>(&self, responses: I) -> Result<MultiProviderSeries>
    where
        I: IntoIterator<Item = Response>,
    {
        self.normalize_fallible(responses.into_iter().map(Ok))
    }

    /// Like [`normalize`](Self::normalize) over a fallible source such as
    /// [`crate::store::ResponseStore::find`]; the first error aborts the run.
    pub fn normalize_fallible<I>(&self, responses: I) -> Result<MultiProviderSeries>
    where
        I: IntoIterator<Item = Result<Response>>,
    {
        ensure_metrics_described();

        let mut buckets: BTreeMap<Provider, DateBucket> = BTreeMap::new();
        let mut routed = 0usize;
        for response in responses {
            let response = response?;
            let strategy = self.router.route(&response.meta)?;
            let bucket = buckets.entry(strategy.provider()).or_default();
            strategy.decode(bucket, &response)?;
            counter!("normalize_responses_total", "provider" => strategy.provider().as_str())
                .increment(1);
            routed += 1;
        }

        let mut out = MultiProviderSeries::new();
        for (provider, bucket) in buckets {
            let mut series = bucket.into_series();
            if self.policy.is_cumulative(provider) {
                series = reconcile_cumulative(&series, &self.policy);
            }
            stamp_series(provider, &mut series)?;
            series.retain(|_, point| !point.is_empty());
            if !series.is_empty() {
                out.insert(provider, series);
            }
        }

        self.observer.record(Finding::info(
            FindingKind::Summary,
            "normalize",
            format!(
                "normalized {routed} response(s) into {} provider series ({} data points)",
                out.len(),
                out.values().map(Series::len).sum::<usize>()
            ),
        ));
        Ok(out)
    }

    /// Transpose to date → provider, filling every (date, provider) gap with
    /// an empty placeholder tagged with the provider.
    pub fn provider_to_date_flip(by_provider: &MultiProviderSeries) -> DateIndexedSnapshot {
        let dates: BTreeSet<&String> = by_provider.values().flat_map(|s| s.keys()).collect();

        let mut out = DateIndexedSnapshot::new();
        for date in dates {
            let row = out.entry(date.clone()).or_default();
            for (provider, series) in by_provider {
                let point = series
                    .get(date)
                    .cloned()
                    .unwrap_or_else(|| DataPoint::placeholder(*provider));
                row.insert(*provider, point);
            }
        }
        out
    }

    /// Inverse of [`provider_to_date_flip`](Self::provider_to_date_flip).
    /// Empty placeholders are dropped, so flipping a pruned series back and
    /// forth is lossless.
    pub fn date_to_provider_flip(by_date: &DateIndexedSnapshot) -> MultiProviderSeries {
        let mut out = MultiProviderSeries::new();
        for (date, row) in by_date {
            for (provider, point) in row {
                if point.is_empty() {
                    continue;
                }
                out.entry(*provider)
                    .or_default()
                    .insert(date.clone(), point.clone());
            }
        }
        out
    }
}

/// Running totals over ascending dates. Days without any observation are
/// skipped; every emitted point is an independent snapshot.
pub fn reconcile_cumulative(series: &Series, policy: &CumulativePolicy) -> Series {
    let mut running = DataPoint::default();
    let mut out = Series::new();

    for (date, point) in series {
        if point.is_empty() {
            continue;
        }
        for field in Field::ALL {
            let observed = point.get(field);
            let slot = running.slot_mut(field);
            match policy.accumulation(field) {
                Accumulation::Replace => {
                    if observed.is_some() {
                        *slot = observed;
                    }
                }
                Accumulation::Additive => {
                    if let Some(x) = observed {
                        *slot = Some(slot.unwrap_or(0).saturating_add(x));
                    }
                }
            }
        }
        let mut emitted = running.clone();
        emitted.provider = point.provider;
        out.insert(date.clone(), emitted);
    }
    out
}

fn stamp_series(provider: Provider, series: &mut Series) -> Result<()> {
    for (date, point) in series.iter_mut() {
        point.stamp(provider, date)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::observe::RecordingObserver;
    use std::sync::Arc;

    fn point(f: &[(Field, i64)]) -> DataPoint {
        let mut p = DataPoint::default();
        for (field, v) in f {
            p.merge(*field, Some(*v));
        }
        p
    }

    #[test]
    fn replace_fields_keep_latest_and_additive_fields_sum() {
        let mut s = Series::new();
        s.insert(
            "2025-01-01".into(),
            point(&[(Field::FollowerCount, 10), (Field::StreamCount, 3)]),
        );
        s.insert("2025-01-02".into(), DataPoint::default());
        s.insert("2025-01-03".into(), point(&[(Field::StreamCount, 4)]));
        s.insert("2025-01-04".into(), point(&[(Field::FollowerCount, 12)]));

        let out = reconcile_cumulative(&s, &CumulativePolicy::default());
        assert!(!out.contains_key("2025-01-02"));
        assert_eq!(out["2025-01-01"].stream_count, Some(3));
        assert_eq!(out["2025-01-03"].stream_count, Some(7));
        assert_eq!(out["2025-01-03"].follower_count, Some(10));
        assert_eq!(out["2025-01-04"].follower_count, Some(12));
        assert_eq!(out["2025-01-04"].stream_count, Some(7));
        // never observed → stays unset
        assert_eq!(out["2025-01-04"].listener_count, None);
    }

    #[test]
    fn field_policy_is_configurable() {
        let mut s = Series::new();
        s.insert("2025-01-01".into(), point(&[(Field::FollowerCount, 2)]));
        s.insert("2025-01-02".into(), point(&[(Field::FollowerCount, 3)]));

        let mut policy = CumulativePolicy::default();
        policy
            .fields
            .insert(Field::FollowerCount, Accumulation::Additive);
        let out = reconcile_cumulative(&s, &policy);
        assert_eq!(out["2025-01-02"].follower_count, Some(5));
    }

    #[test]
    fn emitted_points_are_independent_snapshots() {
        let mut s = Series::new();
        s.insert("2025-01-01".into(), point(&[(Field::ListenerCount, 1)]));
        s.insert("2025-01-02".into(), point(&[(Field::ListenerCount, 1)]));
        let out = reconcile_cumulative(&s, &CumulativePolicy::default());
        assert_eq!(out["2025-01-01"].listener_count, Some(1));
        assert_eq!(out["2025-01-02"].listener_count, Some(2));
    }

    #[test]
    fn stamping_detects_foreign_points() {
        let mut s = Series::new();
        s.insert("2025-01-01".into(), DataPoint::placeholder(Provider::Amazon));
        let err = stamp_series(Provider::Spotify, &mut s).unwrap_err();
        assert!(matches!(err, Error::ProviderMismatch { .. }));
    }

    #[test]
    fn flips_fill_gaps_and_round_trip() {
        let mut by_provider = MultiProviderSeries::new();
        let mut sp = Series::new();
        sp.insert("2025-01-01".into(), {
            let mut p = point(&[(Field::FollowerCount, 1)]);
            p.provider = Some(Provider::Spotify);
            p
        });
        let mut am = Series::new();
        am.insert("2025-01-02".into(), {
            let mut p = point(&[(Field::StreamCount, 5)]);
            p.provider = Some(Provider::Amazon);
            p
        });
        by_provider.insert(Provider::Spotify, sp);
        by_provider.insert(Provider::Amazon, am);

        let by_date = Transformer::provider_to_date_flip(&by_provider);
        assert_eq!(by_date.len(), 2);
        let gap = &by_date["2025-01-02"][&Provider::Spotify];
        assert!(gap.is_empty());
        assert_eq!(gap.provider, Some(Provider::Spotify));

        assert_eq!(Transformer::date_to_provider_flip(&by_date), by_provider);
    }

    #[test]
    fn summary_is_reported() {
        let rec = Arc::new(RecordingObserver::new());
        let t = Transformer::new(rec.clone());
        let out = t.normalize(Vec::new()).unwrap();
        assert!(out.is_empty());
        assert_eq!(rec.of_kind(FindingKind::Summary).len(), 1);
    }
}
