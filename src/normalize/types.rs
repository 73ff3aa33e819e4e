// src/normalize/types.rs
use crate::error::Result;
use crate::model::{DataPoint, Field, Provider, Response, ResponseMeta, Series};

/// Date-keyed observations of a single provider, built up while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateBucket {
    points: Series,
}

impl DateBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `value` into `field` at `date`, creating an empty point on first reference.
    pub fn upsert(&mut self, date: &str, field: Field, value: Option<i64>) {
        self.points
            .entry(date.to_string())
            .or_default()
            .merge(field, value);
    }

    pub fn get(&self, date: &str) -> Option<&DataPoint> {
        self.points.get(date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_series(self) -> Series {
        self.points
    }
}

/// Decodes the responses of one platform.
pub trait ProviderStrategy: Send + Sync {
    fn provider(&self) -> Provider;

    /// Does this strategy own the response? Usually a hostname check.
    fn claims(&self, meta: &ResponseMeta) -> bool;

    /// Merge the response's observations into `bucket`.
    ///
    /// Unrecognized sub-sections are reported to the observer and skipped;
    /// only a payload that cannot be parsed at all is an error.
    fn decode(&self, bucket: &mut DateBucket, response: &Response) -> Result<()>;

    fn name(&self) -> &'static str {
        self.provider().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_creates_then_merges() {
        let mut b = DateBucket::new();
        b.upsert("2025-01-01", Field::FollowerCount, None);
        assert!(b.get("2025-01-01").unwrap().is_empty());

        b.upsert("2025-01-01", Field::FollowerCount, Some(100));
        b.upsert("2025-01-01", Field::FollowerCount, Some(90));
        b.upsert("2025-01-01", Field::FollowerCount, None);
        assert_eq!(b.get("2025-01-01").unwrap().follower_count, Some(100));
        assert_eq!(b.len(), 1);
    }
}
