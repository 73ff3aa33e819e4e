// src/normalize/router.rs
use crate::error::{Error, Result};
use crate::model::{Provider, ResponseMeta};
use crate::normalize::providers::{amazon::AmazonStrategy, spotify::SpotifyStrategy};
use crate::normalize::types::ProviderStrategy;
use crate::observe::ObserverHandle;

/// Ordered strategy list; the first strategy claiming a response wins.
pub struct NormalizationRouter {
    strategies: Vec<Box<dyn ProviderStrategy>>,
}

impl NormalizationRouter {
    pub fn new(strategies: Vec<Box<dyn ProviderStrategy>>) -> Self {
        Self { strategies }
    }

    /// Spotify first, then Amazon. Apple has no decoder.
    pub fn with_default_strategies(observer: ObserverHandle) -> Self {
        Self::new(vec![
            Box::new(SpotifyStrategy::new(observer.clone())),
            Box::new(AmazonStrategy::new(observer)),
        ])
    }

    pub fn route(&self, meta: &ResponseMeta) -> Result<&dyn ProviderStrategy> {
        self.strategies
            .iter()
            .find(|s| s.claims(meta))
            .map(|s| &**s)
            .ok_or_else(|| Error::Unrouted {
                hash: meta.content_hash.clone(),
                url: meta.source_url.clone(),
            })
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.strategies.iter().map(|s| s.provider()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RecordingObserver;
    use chrono::Utc;
    use std::sync::Arc;

    fn meta(url: Option<&str>) -> ResponseMeta {
        ResponseMeta {
            content_hash: "abcdef0123".into(),
            timestamp: Utc::now(),
            source_url: url.map(str::to_string),
        }
    }

    #[test]
    fn first_claiming_strategy_wins() {
        let router = NormalizationRouter::with_default_strategies(Arc::new(RecordingObserver::new()));
        let s = router
            .route(&meta(Some("https://generic.wg.spotify.com/podcasters/v0/shows/x/followers")))
            .unwrap();
        assert_eq!(s.provider(), Provider::Spotify);
        let a = router
            .route(&meta(Some("https://podcasters.amazon.com/api/metrics/podcast/1")))
            .unwrap();
        assert_eq!(a.provider(), Provider::Amazon);
        assert_eq!(router.providers(), vec![Provider::Spotify, Provider::Amazon]);
    }

    #[test]
    fn unclaimed_response_is_an_error() {
        let router = NormalizationRouter::with_default_strategies(Arc::new(RecordingObserver::new()));
        let err = router
            .route(&meta(Some("https://podcastsconnect.apple.com/analytics")))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Unrouted { .. }));
        assert!(router.route(&meta(None)).is_err());
    }
}
