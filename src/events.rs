// src/events.rs
//! Dated annotation markers (episode releases, campaigns, ...) shown next to
//! the metric series by the reporting layer.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::model::canonical_date;
use crate::observe::{Finding, FindingKind, Observer};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationEvent {
    /// Canonical `YYYY-MM-DD` date.
    pub date: String,
    pub label: String,
}

/// Load events from `path`. A missing file yields no events; entries with an
/// unusable date are reported and dropped. Result is sorted by date.
pub fn load_events(path: &Path, observer: &dyn Observer) -> Result<Vec<AnnotationEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading events from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = parse_events(&content, ext.as_str())
        .with_context(|| format!("parsing events file {}", path.display()))?;
    Ok(clean_events(raw, observer))
}

fn parse_events(s: &str, hint_ext: &str) -> Result<Vec<AnnotationEvent>> {
    #[derive(Deserialize)]
    struct TomlEvents {
        events: Vec<AnnotationEvent>,
    }

    if hint_ext != "toml" {
        if let Ok(v) = serde_json::from_str::<Vec<AnnotationEvent>>(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = toml::from_str::<TomlEvents>(s) {
        return Ok(v.events);
    }
    Err(anyhow!("unsupported events format"))
}

fn clean_events(items: Vec<AnnotationEvent>, observer: &dyn Observer) -> Vec<AnnotationEvent> {
    let mut out: Vec<AnnotationEvent> = items
        .into_iter()
        .filter_map(|ev| match canonical_date(ev.date.trim()) {
            Some(date) => Some(AnnotationEvent {
                date,
                label: ev.label.trim().to_string(),
            }),
            None => {
                observer.record(Finding::warning(
                    FindingKind::SkippedObservation,
                    "events",
                    format!("event {:?} has unusable date {:?}", ev.label, ev.date),
                ));
                None
            }
        })
        .collect();
    out.sort();
    out
}
