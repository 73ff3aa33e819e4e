// src/normalize/providers/amazon.rs
use metrics::counter;
use serde_json::Value;

use crate::error::Result;
use crate::model::{Field, Provider, Response, ResponseMeta};
use crate::normalize::types::{DateBucket, ProviderStrategy};
use crate::normalize::{decode_row, host_of, parse_payload, Column};
use crate::observe::{Finding, FindingKind, ObserverHandle};

/// Decodes the podcaster portal metrics API.
///
/// Payloads look like `{"data": {"<section>": [...]}}` where time series rows
/// are `{"time": "2025-07-30T00:00:00.000Z", "value": 3.0}`.
pub struct AmazonStrategy {
    observer: ObserverHandle,
}

impl AmazonStrategy {
    pub fn new(observer: ObserverHandle) -> Self {
        Self { observer }
    }
}

fn series_field(section: &str) -> Option<Field> {
    match section {
        "playsTimeSeries" => Some(Field::StreamCount),
        "startsTimeSeries" => Some(Field::StreamStartCount),
        "listenersTimeSeries" => Some(Field::ListenerCount),
        "followsTimeSeries" => Some(Field::FollowerCount),
        "engagedListenersTimeSeries" => Some(Field::EngagedListenerCount),
        _ => None,
    }
}

// Totals and aggregates carry no per-day breakdown.
fn is_aggregate(section: &str) -> bool {
    section.ends_with("Aggregate") || section.ends_with("Totals")
}

impl ProviderStrategy for AmazonStrategy {
    fn provider(&self) -> Provider {
        Provider::Amazon
    }

    fn claims(&self, meta: &ResponseMeta) -> bool {
        meta.source_url
            .as_deref()
            .and_then(host_of)
            .is_some_and(|h| h.contains("amazon"))
    }

    fn decode(&self, bucket: &mut DateBucket, response: &Response) -> Result<()> {
        let body = parse_payload(response)?;
        let obs = self.observer.as_ref();

        let Some(data) = body.get("data").and_then(Value::as_object) else {
            obs.record(Finding::warning(
                FindingKind::UnknownSection,
                "envelope",
                format!(
                    "response {} has no \"data\" object",
                    response.meta.content_hash
                ),
            ));
            return Ok(());
        };

        let mut merged = 0usize;
        for (section, value) in data {
            if let Some(field) = series_field(section) {
                let Some(rows) = value.as_array() else {
                    obs.record(Finding::warning(
                        FindingKind::UnknownSection,
                        section.as_str(),
                        format!("expected an array under {section:?}"),
                    ));
                    continue;
                };
                let columns = [Column::new("value", field)];
                for row in rows {
                    merged += decode_row(bucket, obs, section, row, "time", &columns);
                }
            } else if !is_aggregate(section) {
                obs.record(Finding::warning(
                    FindingKind::UnknownSection,
                    section.as_str(),
                    format!("unknown section {section:?}"),
                ));
            }
        }

        counter!("normalize_observations_total", "provider" => "Amazon").increment(merged as u64);
        Ok(())
    }
}
