// src/pipeline.rs
//! One batch run: replay the store, normalize, transpose, validate.

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::events::{load_events, AnnotationEvent};
use crate::model::{DateIndexedSnapshot, MultiProviderSeries};
use crate::observe::{Finding, ObserverHandle};
use crate::store::ResponseStore;
use crate::transform::Transformer;
use crate::validator::{ValidationReport, Validator};

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub by_provider: MultiProviderSeries,
    pub by_date: DateIndexedSnapshot,
    pub validation: ValidationReport,
    pub events: Vec<AnnotationEvent>,
}

fn report(observer: &ObserverHandle, stage: &str, err: &crate::Error) {
    observer.record(Finding::error(stage, err.to_string()));
}

/// Run the whole pipeline against the store described by `cfg`.
/// Any fatal error aborts the run; nothing partial is returned.
pub fn run_once(cfg: &PipelineConfig, observer: ObserverHandle) -> Result<RunOutput> {
    let store = ResponseStore::open(&cfg.meta_dir, &cfg.payload_dir)
        .inspect_err(|e| report(&observer, "store", e))
        .context("opening response store")?;

    let transformer = Transformer::with_policy(cfg.reconcile.clone(), observer.clone());
    let by_provider = transformer
        .normalize_fallible(store.find())
        .inspect_err(|e| report(&observer, "normalize", e))
        .context("normalizing stored responses")?;
    let by_date = Transformer::provider_to_date_flip(&by_provider);

    let validation = Validator::new(observer.clone())
        .validate(&by_date)
        .context("validating normalized series")?;

    let events = match &cfg.events_path {
        Some(p) => load_events(p, observer.as_ref())?,
        None => Vec::new(),
    };

    tracing::info!(
        target: "podcast_metrics",
        providers = by_provider.len(),
        rows = by_date.len(),
        gaps = validation.gaps.len(),
        events = events.len(),
        "pipeline run finished"
    );

    Ok(RunOutput {
        by_provider,
        by_date,
        validation,
        events,
    })
}
