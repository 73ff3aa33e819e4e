// src/validator.rs
//! Continuity and integrity checks over the date-indexed snapshot.
//!
//! Missing days are expected (a provider may have no capture that day) and
//! are only reported. A data point without a provider tag, or tagged with a
//! provider other than the one it is filed under, fails the run.

use chrono::Duration;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::model::{parse_date_key, DateIndexedSnapshot, DATE_FORMAT};
use crate::observe::{Finding, FindingKind, ObserverHandle};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "validate_gaps_total",
            "Calendar days missing inside the observed span."
        );
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub rows: usize,
    pub first: Option<String>,
    pub last: Option<String>,
    /// Whole days between first and last date.
    pub span_days: i64,
    /// Missing date keys, ascending.
    pub gaps: Vec<String>,
}

pub struct Validator {
    observer: ObserverHandle,
}

impl Validator {
    pub fn new(observer: ObserverHandle) -> Self {
        Self { observer }
    }

    /// Fatal errors are recorded on the observer before they are returned.
    pub fn validate(&self, snapshot: &DateIndexedSnapshot) -> Result<ValidationReport> {
        self.check(snapshot).inspect_err(|e| {
            self.observer.record(Finding::error("validate", e.to_string()));
        })
    }

    fn check(&self, snapshot: &DateIndexedSnapshot) -> Result<ValidationReport> {
        ensure_metrics_described();

        let mut dates = Vec::with_capacity(snapshot.len());
        for key in snapshot.keys() {
            dates.push(parse_date_key(key)?);
        }
        let (Some(&first), Some(&last)) = (dates.iter().min(), dates.iter().max()) else {
            self.observer.record(Finding::info(
                FindingKind::Summary,
                "validate",
                "nothing to validate (0 rows)",
            ));
            return Ok(ValidationReport::default());
        };

        let mut gaps = Vec::new();
        let mut current = first;
        while current < last {
            current += Duration::days(1);
            let key = current.format(DATE_FORMAT).to_string();
            if !snapshot.contains_key(&key) {
                self.observer.record(Finding::warning(
                    FindingKind::ContinuityGap,
                    key.clone(),
                    format!("Date {key} missing."),
                ));
                counter!("validate_gaps_total").increment(1);
                gaps.push(key);
            }
        }

        let span_days = (last - first).num_days();
        self.observer.record(Finding::info(
            FindingKind::Summary,
            "validate",
            format!("Validated {} rows ({span_days} day(s)).", snapshot.len()),
        ));

        for (date, row) in snapshot {
            for (filed_under, point) in row {
                match point.provider {
                    None => return Err(Error::MissingProvider { date: date.clone() }),
                    Some(tag) if tag != *filed_under => {
                        return Err(Error::ProviderMismatch {
                            date: date.clone(),
                            existing: tag,
                            expected: *filed_under,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(ValidationReport {
            rows: snapshot.len(),
            first: Some(first.format(DATE_FORMAT).to_string()),
            last: Some(last.format(DATE_FORMAT).to_string()),
            span_days,
            gaps,
        })
    }
}
