//! Aggregation Service
//!
//! Fans a query out to every provider source concurrently and concatenates
//! the answers, grouped by provider in registration order. In a
//! multi-provider call a failing or slow provider is skipped and logged; the
//! request only fails when every provider did. A single-provider call
//! surfaces the provider's error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::{GatewayError, ProviderResult, Result};
use crate::models::{DateRange, Page};
use crate::providers::{bounded, LatestByTypeSource, LatestDataEntry, ProviderName};

// == Aggregate ==
/// Composed result of a fan-out. `skipped` lists providers whose data is
/// missing from `entries`; the result never claims completeness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub entries: Vec<LatestDataEntry>,
    pub skipped: Vec<ProviderName>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Aggregation Service ==
pub struct AggregationService {
    sources: Vec<Arc<dyn LatestByTypeSource>>,
    /// Bound on every provider call
    call_timeout: Duration,
}

impl AggregationService {
    pub fn new(sources: Vec<Arc<dyn LatestByTypeSource>>, call_timeout: Duration) -> Self {
        Self {
            sources,
            call_timeout,
        }
    }

    /// Newest `limit` entries of `data_type` from `device`, or from every
    /// provider when no device is given.
    pub async fn get_latest_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        device: Option<ProviderName>,
        limit: u32,
    ) -> Result<Aggregate> {
        let query = move |source: Arc<dyn LatestByTypeSource>| async move {
            source.get_latest_by_type(user_id, data_type, limit).await
        };

        match device {
            Some(device) => {
                let source = self.source(device)?;
                let entries = self.call(source, query).await?;
                Ok(Aggregate {
                    entries: tag(device, entries),
                    skipped: Vec::new(),
                })
            }
            None => self.fan_out(query).await,
        }
    }

    /// Entries of `data_type` in `range` from every provider. `page` applies
    /// to each provider separately: `limit = 3` yields up to 3 entries per
    /// provider.
    pub async fn get_all_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        range: DateRange,
        page: Page,
    ) -> Result<Aggregate> {
        self.fan_out(move |source: Arc<dyn LatestByTypeSource>| async move {
            source.get_all_by_type(user_id, data_type, range, page).await
        })
        .await
    }

    fn source(&self, device: ProviderName) -> Result<Arc<dyn LatestByTypeSource>> {
        self.sources
            .iter()
            .find(|s| s.device() == device)
            .map(Arc::clone)
            .ok_or_else(|| GatewayError::UnknownProvider(device.to_string()))
    }

    /// One provider call under the per-call timeout.
    async fn call<F, Fut>(
        &self,
        source: Arc<dyn LatestByTypeSource>,
        query: F,
    ) -> ProviderResult<Vec<LatestDataEntry>>
    where
        F: FnOnce(Arc<dyn LatestByTypeSource>) -> Fut,
        Fut: Future<Output = ProviderResult<Vec<LatestDataEntry>>>,
    {
        bounded(source.device(), self.call_timeout, query(source)).await
    }

    async fn fan_out<F, Fut>(&self, query: F) -> Result<Aggregate>
    where
        F: Fn(Arc<dyn LatestByTypeSource>) -> Fut,
        Fut: Future<Output = ProviderResult<Vec<LatestDataEntry>>>,
    {
        let calls = self.sources.iter().map(|source| {
            let device = source.device();
            let pending = self.call(Arc::clone(source), &query);
            async move { (device, pending.await) }
        });
        let results = join_all(calls).await;

        let mut aggregate = Aggregate::default();
        for (device, result) in results {
            match result {
                Ok(entries) => {
                    debug!(provider = %device, count = entries.len(), "Provider answered");
                    aggregate.entries.extend(tag(device, entries));
                }
                Err(e) => {
                    warn!(provider = %device, error = %e, "Skipping provider in aggregate");
                    aggregate.skipped.push(device);
                }
            }
        }

        if !self.sources.is_empty() && aggregate.skipped.len() == self.sources.len() {
            return Err(GatewayError::AllProvidersFailed(self.sources.len()));
        }
        Ok(aggregate)
    }
}

fn tag(device: ProviderName, mut entries: Vec<LatestDataEntry>) -> Vec<LatestDataEntry> {
    for entry in &mut entries {
        entry.device = device;
    }
    entries
}
