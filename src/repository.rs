// src/repository.rs
//! Per-metric query views over a normalized [`MultiProviderSeries`].

use std::collections::BTreeSet;

use crate::model::{DataPoint, Field, MultiProviderSeries, Provider, Series};

/// Pulls one metric out of a data point.
pub trait Extract {
    fn extract(&self, point: &DataPoint) -> Option<i64>;
}

impl Extract for Field {
    fn extract(&self, point: &DataPoint) -> Option<i64> {
        point.get(*self)
    }
}

/// Read-only view of one metric across all providers.
#[derive(Debug, Clone, Copy)]
pub struct Repository<'a, E = Field> {
    metric: E,
    data: &'a MultiProviderSeries,
}

impl<'a> Repository<'a, Field> {
    pub fn followers(data: &'a MultiProviderSeries) -> Self {
        Self::new(Field::FollowerCount, data)
    }

    pub fn listeners(data: &'a MultiProviderSeries) -> Self {
        Self::new(Field::ListenerCount, data)
    }

    pub fn engaged_listeners(data: &'a MultiProviderSeries) -> Self {
        Self::new(Field::EngagedListenerCount, data)
    }

    pub fn consumption(data: &'a MultiProviderSeries) -> Self {
        Self::new(Field::ConsumptionSeconds, data)
    }

    pub fn streams(data: &'a MultiProviderSeries) -> Self {
        Self::new(Field::StreamCount, data)
    }

    pub fn stream_starts(data: &'a MultiProviderSeries) -> Self {
        Self::new(Field::StreamStartCount, data)
    }
}

impl<'a, E: Extract> Repository<'a, E> {
    pub fn new(metric: E, data: &'a MultiProviderSeries) -> Self {
        Self { metric, data }
    }

    pub fn metric(&self) -> &E {
        &self.metric
    }

    /// Providers present in the underlying series, in provider order.
    pub fn providers(&self) -> Vec<Provider> {
        self.data.keys().copied().collect()
    }

    /// Sorted union of every provider's date keys.
    pub fn get_dates(&self) -> Vec<&'a str> {
        let data = self.data;
        let dates: BTreeSet<&'a str> = data
            .values()
            .flat_map(|s| s.keys().map(String::as_str))
            .collect();
        dates.into_iter().collect()
    }

    /// One value per date of [`get_dates`](Self::get_dates): the last known
    /// value carried forward, 0 before the provider's first observation.
    /// Each call yields a fresh iterator.
    pub fn find_by_provider(&self, provider: Provider) -> ForwardFilled<'_, E> {
        let data: &MultiProviderSeries = self.data;
        ForwardFilled {
            dates: self.get_dates().into_iter(),
            series: data.get(&provider),
            metric: &self.metric,
            last: 0,
        }
    }

    /// Latest known value for `provider`: the first non-null value scanning
    /// dates descending, or 0. Series are running totals, so this is the
    /// current total, not an arithmetic sum over dates.
    pub fn sum_by_provider(&self, provider: Provider) -> i64 {
        self.latest(provider).map(|(_, v)| v).unwrap_or(0)
    }

    /// [`sum_by_provider`](Self::sum_by_provider) added up across providers.
    pub fn sum(&self) -> i64 {
        self.data
            .keys()
            .map(|p| self.sum_by_provider(*p))
            .sum()
    }

    /// Date of the value returned by [`sum_by_provider`](Self::sum_by_provider).
    pub fn last_date_of_provider(&self, provider: Provider) -> Option<&'a str> {
        self.latest(provider).map(|(d, _)| d)
    }

    fn latest(&self, provider: Provider) -> Option<(&'a str, i64)> {
        let data = self.data;
        data.get(&provider)?
            .iter()
            .rev()
            .find_map(|(date, p)| self.metric.extract(p).map(|v| (date.as_str(), v)))
    }
}

/// Iterator returned by [`Repository::find_by_provider`].
pub struct ForwardFilled<'r, E> {
    dates: std::vec::IntoIter<&'r str>,
    series: Option<&'r Series>,
    metric: &'r E,
    last: i64,
}

impl<E: Extract> Iterator for ForwardFilled<'_, E> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let date = self.dates.next()?;
        if let Some(v) = self
            .series
            .and_then(|s| s.get(date))
            .and_then(|p| self.metric.extract(p))
        {
            self.last = v;
        }
        Some(self.last)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.dates.size_hint()
    }
}
