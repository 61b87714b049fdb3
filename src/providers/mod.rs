//! Provider Module
//!
//! Contracts for the wearable-device backends ("providers"). Each vendor
//! integration implements [`ProviderStore`]; the aggregation service only ever
//! sees the narrower [`LatestByTypeSource`] capability, so adding a vendor
//! never touches aggregation code.

mod memory;
mod registry;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, ProviderError, ProviderResult};
use crate::models::{DateRange, Page};

pub use memory::InMemoryProviderStore;
pub use registry::ProviderRegistry;

// == Provider Name ==
/// The device integrations known to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Garmin,
    Oura,
    Polar,
    Suunto,
}

impl ProviderName {
    /// Every provider, in aggregation order.
    pub const ALL: [ProviderName; 4] = [
        ProviderName::Garmin,
        ProviderName::Oura,
        ProviderName::Polar,
        ProviderName::Suunto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Garmin => "garmin",
            ProviderName::Oura => "oura",
            ProviderName::Polar => "polar",
            ProviderName::Suunto => "suunto",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderName::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GatewayError::UnknownProvider(s.to_string()))
    }
}

// == Latest Data Entry ==
/// One provider payload projected to a single measurement type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestDataEntry {
    /// Provider the data came from
    pub device: ProviderName,
    pub date: NaiveDate,
    pub data: Value,
}

// == Capability Traits ==
/// The part of a provider the aggregation service depends on.
#[async_trait]
pub trait LatestByTypeSource: Send + Sync {
    /// Name used to tag every entry this source returns.
    fn device(&self) -> ProviderName;

    /// Newest `limit` entries carrying `data_type`, newest first.
    async fn get_latest_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        limit: u32,
    ) -> ProviderResult<Vec<LatestDataEntry>>;

    /// Entries carrying `data_type` inside `range`, newest first, paged.
    async fn get_all_by_type(
        &self,
        user_id: &str,
        data_type: &str,
        range: DateRange,
        page: Page,
    ) -> ProviderResult<Vec<LatestDataEntry>>;
}

/// Raw data access for one device vendor.
///
/// At most one payload exists per (provider, user, date); `insert_data`
/// replaces it.
#[async_trait]
pub trait ProviderStore: LatestByTypeSource {
    /// Distinct dates holding data, newest first.
    async fn get_dates(&self, user_id: &str, range: DateRange) -> ProviderResult<Vec<NaiveDate>>;

    /// Measurement types present in the payload for `date`.
    async fn get_types(&self, user_id: &str, date: NaiveDate) -> ProviderResult<Vec<String>>;

    /// Whole payload for `date`, or only the `data_type` member of it.
    async fn get_data(
        &self,
        user_id: &str,
        date: NaiveDate,
        data_type: Option<&str>,
    ) -> ProviderResult<Option<Value>>;

    /// Upserts the payload for (user, date).
    async fn insert_data(&self, user_id: &str, date: NaiveDate, payload: Value)
        -> ProviderResult<()>;

    /// Removes every payload of the user. Returns the number of rows removed.
    async fn delete_all_data(&self, user_id: &str) -> ProviderResult<u64>;
}

/// Runs one provider call under `timeout`. A timeout reads as a provider error.
pub async fn bounded<T>(
    provider: ProviderName,
    timeout: Duration,
    call: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ProviderError::Timeout {
            provider,
            timeout_ms: timeout.as_millis() as u64,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: ProviderResult<()> = bounded(
            ProviderName::Garmin,
            Duration::from_millis(10),
            std::future::pending(),
        )
        .await;
        assert_eq!(
            result,
            Err(ProviderError::Timeout {
                provider: ProviderName::Garmin,
                timeout_ms: 10
            })
        );
    }

    #[test]
    fn test_provider_name_parse() {
        assert_eq!("garmin".parse::<ProviderName>().unwrap(), ProviderName::Garmin);
        assert_eq!("Oura".parse::<ProviderName>().unwrap(), ProviderName::Oura);
        assert!(matches!(
            "fitbit".parse::<ProviderName>(),
            Err(GatewayError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_latest_entry_serialize() {
        let entry = LatestDataEntry {
            device: ProviderName::Suunto,
            date: "2024-03-01".parse().unwrap(),
            data: serde_json::json!({"score": 80}),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"device":"suunto","date":"2024-03-01","data":{"score":80}}"#
        );
    }
}
