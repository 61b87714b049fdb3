//! In-Memory Provider Store
//!
//! Keeps one payload per (user, date) in a sorted map. Stands in for a
//! vendor's relational tables and exposes availability/latency switches so
//! degraded backends can be simulated.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{LatestByTypeSource, LatestDataEntry, ProviderName, ProviderStore};
use crate::error::{ProviderError, ProviderResult};
use crate::models::{DateRange, Page};

type UserPayloads = BTreeMap<NaiveDate, Value>;

// == In-Memory Provider Store ==
#[derive(Debug)]
pub struct InMemoryProviderStore {
    name: ProviderName,
    rows: RwLock<HashMap<String, UserPayloads>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryProviderStore {
    pub fn new(name: ProviderName) -> Self {
        Self {
            name,
            rows: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Marks the backend as up or down. Every call fails while down.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Adds an artificial delay to every call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of stored rows across all users.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.values().map(BTreeMap::len).sum()
    }

    async fn simulate_backend(&self) -> ProviderResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable(self.name));
        }
        Ok(())
    }

    /// Newest-first entries of `data_type` within `range`.
    async fn entries_of_type(
        &self,
        user_id: &str,
        data_type: &str,
        range: DateRange,
        offset: usize,
        limit: usize,
    ) -> Vec<LatestDataEntry> {
        let rows = self.rows.read().await;
        let Some(payloads) = rows.get(user_id) else {
            return Vec::new();
        };

        payloads
            .iter()
            .rev()
            .filter(|(date, _)| range.contains(**date))
            .filter_map(|(date, payload)| {
                payload.get(data_type).map(|data| LatestDataEntry {
                    device: self.name,
                    date: *date,
                    data: data.clone(),
                })
            })
            .skip(offset)
            .take(limit)
            .collect()
    }
}

#[async_trait]
impl LatestByTypeSource for InMemoryProviderStore {
    fn device(&self) -> ProviderName {
        self.name
    }

    async fn get_latest_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        limit: u32,
    ) -> ProviderResult<Vec<LatestDataEntry>> {
        self.simulate_backend().await?;
        Ok(self
            .entries_of_type(user_id, data_type, DateRange::unbounded(), 0, limit as usize)
            .await)
    }

    async fn get_all_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        range: DateRange,
        page: Page,
    ) -> ProviderResult<Vec<LatestDataEntry>> {
        self.simulate_backend().await?;
        Ok(self
            .entries_of_type(
                user_id,
                data_type,
                range,
                page.offset as usize,
                page.limit as usize,
            )
            .await)
    }
}

#[async_trait]
impl ProviderStore for InMemoryProviderStore {
    async fn get_dates(&self, user_id: &str, range: DateRange) -> ProviderResult<Vec<NaiveDate>> {
        self.simulate_backend().await?;
        let rows = self.rows.read().await;
        Ok(rows
            .get(user_id)
            .map(|payloads| {
                payloads
                    .keys()
                    .rev()
                    .copied()
                    .filter(|date| range.contains(*date))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_types(&self, user_id: &str, date: NaiveDate) -> ProviderResult<Vec<String>> {
        self.simulate_backend().await?;
        let rows = self.rows.read().await;
        let types = rows
            .get(user_id)
            .and_then(|payloads| payloads.get(&date))
            .and_then(Value::as_object)
            .map(|object| object.keys().cloned().collect())
            .unwrap_or_default();
        Ok(types)
    }

    async fn get_data(
        &self,
        user_id: &str,
        date: NaiveDate,
        data_type: Option<&str>,
    ) -> ProviderResult<Option<Value>> {
        self.simulate_backend().await?;
        let rows = self.rows.read().await;
        let payload = rows.get(user_id).and_then(|payloads| payloads.get(&date));
        Ok(match data_type {
            Some(data_type) => payload.and_then(|p| p.get(data_type)).cloned(),
            None => payload.cloned(),
        })
    }

    async fn insert_data(
        &self,
        user_id: &str,
        date: NaiveDate,
        payload: Value,
    ) -> ProviderResult<()> {
        self.simulate_backend().await?;
        if !payload.is_object() {
            return Err(ProviderError::Storage {
                provider: self.name,
                message: "payload must be a JSON object keyed by measurement type".to_string(),
            });
        }
        let mut rows = self.rows.write().await;
        let replaced = rows
            .entry(user_id.to_string())
            .or_default()
            .insert(date, payload)
            .is_some();
        debug!(provider = %self.name, user_id, %date, replaced, "Stored provider payload");
        Ok(())
    }

    async fn delete_all_data(&self, user_id: &str) -> ProviderResult<u64> {
        self.simulate_backend().await?;
        let mut rows = self.rows.write().await;
        Ok(rows
            .remove(user_id)
            .map(|payloads| payloads.len() as u64)
            .unwrap_or(0))
    }
}
