// src/observe.rs
//! Observability sink injected into the pipeline components.
//!
//! Components never reach for a global logger; the run owns an
//! `Arc<dyn Observer>` and hands it to each component it constructs.
//! [`TracingObserver`] forwards findings to `tracing`, [`RecordingObserver`]
//! keeps them in memory so callers (and tests) can inspect them.

use std::sync::{Arc, Mutex};

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// A calendar day inside the observed span with no data for any provider.
    ContinuityGap,
    /// A payload section or route a strategy could not place.
    UnknownSection,
    /// A single observation that could not be decoded and was dropped.
    SkippedObservation,
    Summary,
    /// The error that aborted a run stage.
    Fatal,
}

impl FindingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingKind::ContinuityGap => "continuity_gap",
            FindingKind::UnknownSection => "unknown_section",
            FindingKind::SkippedObservation => "skipped_observation",
            FindingKind::Summary => "summary",
            FindingKind::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub level: Level,
    pub kind: FindingKind,
    /// What the finding is about: a date key, an API route, a section name.
    pub subject: String,
    pub message: String,
}

impl Finding {
    pub fn info(kind: FindingKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn warning(
        kind: FindingKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level: Level::Warning,
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Fatal errors are still returned to the caller; this only reports them.
    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            kind: FindingKind::Fatal,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

pub trait Observer: Send + Sync {
    fn record(&self, finding: Finding);
}

pub type ObserverHandle = Arc<dyn Observer>;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_findings_total",
            "Non-fatal findings reported during a run, by kind."
        );
    });
}

/// Default sink: structured `tracing` events under the `podcast_metrics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn handle() -> ObserverHandle {
        Arc::new(TracingObserver)
    }
}

impl Observer for TracingObserver {
    fn record(&self, f: Finding) {
        ensure_metrics_described();
        counter!("pipeline_findings_total", "kind" => f.kind.as_str()).increment(1);

        let kind = f.kind.as_str();
        match f.level {
            Level::Info => {
                tracing::info!(target: "podcast_metrics", kind, subject = %f.subject, "{}", f.message)
            }
            Level::Warning => {
                tracing::warn!(target: "podcast_metrics", kind, subject = %f.subject, "{}", f.message)
            }
            Level::Error => {
                tracing::error!(target: "podcast_metrics", kind, subject = %f.subject, "{}", f.message)
            }
        }
    }
}

/// Collects findings in memory, optionally forwarding them to another sink.
#[derive(Default)]
pub struct RecordingObserver {
    findings: Mutex<Vec<Finding>>,
    forward: Option<ObserverHandle>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and also pass every finding on to `inner`.
    pub fn forwarding_to(inner: ObserverHandle) -> Self {
        Self {
            findings: Mutex::new(Vec::new()),
            forward: Some(inner),
        }
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn of_kind(&self, kind: FindingKind) -> Vec<Finding> {
        self.findings()
            .into_iter()
            .filter(|f| f.kind == kind)
            .collect()
    }

    pub fn warnings(&self) -> Vec<Finding> {
        self.at_level(Level::Warning)
    }

    pub fn errors(&self) -> Vec<Finding> {
        self.at_level(Level::Error)
    }

    fn at_level(&self, level: Level) -> Vec<Finding> {
        self.findings()
            .into_iter()
            .filter(|f| f.level == level)
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn record(&self, finding: Finding) {
        if let Some(inner) = &self.forward {
            inner.record(finding.clone());
        }
        if let Ok(mut v) = self.findings.lock() {
            v.push(finding);
        }
    }
}
