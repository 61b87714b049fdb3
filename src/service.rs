//! Wearable Service
//!
//! Read-through front for the wearable domain. Every read renders its key,
//! tries the cache, and on a miss computes the answer from the providers and
//! stores it under the TTL of its view. Every write goes to the provider
//! first and then through the invalidation dispatcher, so the response is
//! only sent once the stale views are gone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::aggregation::{Aggregate, AggregationService};
use crate::cache::{CacheClient, CacheStats, WearableKey};
use crate::config::TtlPolicy;
use crate::error::{GatewayError, ProviderError, ProviderResult, Result};
use crate::invalidation::{InvalidationDispatcher, InvalidationOutcome};
use crate::models::{CachedJson, DateRange, Page};
use crate::providers::{bounded, LatestDataEntry, ProviderName, ProviderRegistry};

/// A freshly computed answer. Only complete answers are cached.
struct Computed<T> {
    value: Option<T>,
    skipped: Vec<ProviderName>,
}

impl<T> Computed<T> {
    fn complete(value: Option<T>) -> Self {
        Self {
            value,
            skipped: Vec::new(),
        }
    }
}

impl Computed<Vec<LatestDataEntry>> {
    /// An aggregate that skipped a provider is served but not cached, so the
    /// missing provider shows up again on the next read.
    fn from_aggregate(aggregate: Aggregate) -> Self {
        Self {
            value: non_empty(aggregate.entries),
            skipped: aggregate.skipped,
        }
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

// == Wearable Service ==
pub struct WearableService {
    cache: CacheClient,
    registry: Arc<ProviderRegistry>,
    aggregation: AggregationService,
    dispatcher: InvalidationDispatcher,
    ttl: TtlPolicy,
    provider_timeout: Duration,
}

impl WearableService {
    pub fn new(
        cache: CacheClient,
        registry: ProviderRegistry,
        provider_timeout: Duration,
        ttl: TtlPolicy,
    ) -> Self {
        let aggregation = AggregationService::new(registry.sources(), provider_timeout);
        Self {
            dispatcher: InvalidationDispatcher::new(cache.clone()),
            cache,
            registry: Arc::new(registry),
            aggregation,
            ttl,
            provider_timeout,
        }
    }

    // == Aggregate Reads ==
    pub async fn latest_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        device: Option<ProviderName>,
        limit: u32,
    ) -> Result<CachedJson> {
        let key = WearableKey::Latest {
            user_id: user_id.to_string(),
            data_type: data_type.to_string(),
            device,
            limit,
        };
        self.read_through(key, || async move {
            let aggregate = self
                .aggregation
                .get_latest_by_type(user_id, data_type, device, limit)
                .await?;
            Ok(Computed::from_aggregate(aggregate))
        })
        .await
    }

    pub async fn all_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        range: DateRange,
        page: Page,
    ) -> Result<CachedJson> {
        let key = WearableKey::AllByType {
            user_id: user_id.to_string(),
            data_type: data_type.to_string(),
            range,
            page,
        };
        self.read_through(key, || async move {
            let aggregate = self
                .aggregation
                .get_all_by_type(user_id, data_type, range, page)
                .await?;
            Ok(Computed::from_aggregate(aggregate))
        })
        .await
    }

    // == Provider Reads ==
    pub async fn dates(
        &self,
        provider: ProviderName,
        user_id: &str,
        range: DateRange,
    ) -> Result<CachedJson> {
        let store = self.registry.store(provider)?;
        let key = WearableKey::Dates {
            provider,
            user_id: user_id.to_string(),
            range,
        };
        self.read_through(key, || async move {
            let dates = bounded(provider, self.provider_timeout, store.get_dates(user_id, range))
                .await?;
            Ok(Computed::complete(non_empty(dates)))
        })
        .await
    }

    pub async fn types(
        &self,
        provider: ProviderName,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<CachedJson> {
        let store = self.registry.store(provider)?;
        let key = WearableKey::Types {
            provider,
            user_id: user_id.to_string(),
            date,
        };
        self.read_through(key, || async move {
            let types = bounded(provider, self.provider_timeout, store.get_types(user_id, date))
                .await?;
            Ok(Computed::complete(non_empty(types)))
        })
        .await
    }

    pub async fn data(
        &self,
        provider: ProviderName,
        user_id: &str,
        date: NaiveDate,
        data_type: Option<&str>,
    ) -> Result<CachedJson> {
        let store = self.registry.store(provider)?;
        let key = WearableKey::Data {
            provider,
            user_id: user_id.to_string(),
            date,
            data_type: data_type.map(str::to_string),
        };
        self.read_through(key, || async move {
            let payload = bounded(
                provider,
                self.provider_timeout,
                store.get_data(user_id, date, data_type),
            )
            .await?;
            Ok(Computed::complete(payload))
        })
        .await
    }

    /// Registered provider names. Cached as reference data.
    pub async fn providers(&self) -> Result<CachedJson> {
        self.read_through(WearableKey::Providers, || async move {
            Ok(Computed::complete(non_empty(self.registry.names())))
        })
        .await
    }

    // == Writes ==
    /// Upserts the payload for (provider, user, date), then invalidates.
    pub async fn insert_data(
        &self,
        provider: ProviderName,
        user_id: &str,
        date: NaiveDate,
        payload: Value,
    ) -> Result<InvalidationOutcome> {
        if !payload.is_object() {
            return Err(GatewayError::InvalidRequest(
                "payload must be a JSON object keyed by measurement type".to_string(),
            ));
        }
        let store = self.registry.store(provider)?;
        let written = bounded(
            provider,
            self.provider_timeout,
            store.insert_data(user_id, date, payload),
        )
        .await;
        self.after_write(provider, user_id, written).await
    }

    /// Removes all of a user's data at one provider, then invalidates.
    pub async fn delete_all_data(
        &self,
        provider: ProviderName,
        user_id: &str,
    ) -> Result<(u64, InvalidationOutcome)> {
        let store = self.registry.store(provider)?;
        let deleted = bounded(provider, self.provider_timeout, store.delete_all_data(user_id)).await;
        let rows = deleted.as_ref().map_or(0, |rows| *rows);
        let outcome = self.after_write(provider, user_id, deleted.map(|_| ())).await?;
        Ok((rows, outcome))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Runs the dispatcher once a write committed. A timed-out write may
    /// still commit, so it is invalidated too before the error is returned.
    async fn after_write(
        &self,
        provider: ProviderName,
        user_id: &str,
        written: ProviderResult<()>,
    ) -> Result<InvalidationOutcome> {
        match written {
            Ok(()) => Ok(self.dispatcher.invalidate_provider(user_id, provider).await),
            Err(e @ ProviderError::Timeout { .. }) => {
                warn!(provider = %provider, user_id, "Write timed out, invalidating anyway");
                self.dispatcher.invalidate_provider(user_id, provider).await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    // == Read Through ==
    async fn read_through<T, F, Fut>(&self, key: WearableKey, compute: F) -> Result<CachedJson>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed<T>>>,
    {
        let rendered = key.render();
        if let Some(body) = self.cache.get(&rendered).await {
            return Ok(CachedJson::Hit(body));
        }

        let computed = compute().await?;
        let Some(value) = computed.value else {
            debug!(key = %rendered, "No data, nothing cached");
            return Ok(CachedJson::NoContent);
        };
        let body =
            serde_json::to_string(&value).map_err(|e| GatewayError::Internal(e.to_string()))?;

        if !computed.skipped.is_empty() {
            debug!(key = %rendered, skipped = ?computed.skipped, "Partial aggregate served uncached");
            return Ok(CachedJson::Partial {
                body,
                skipped: computed.skipped,
            });
        }

        self.cache.set(&rendered, &body, self.ttl.ttl_for(&key)).await;
        Ok(CachedJson::Miss(body))
    }
}
