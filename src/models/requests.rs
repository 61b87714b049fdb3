//! Request DTOs for the gateway API
//!
//! Query-string shapes of the read endpoints. Each carries a `validate`
//! that reports the first problem as a message.

use chrono::NaiveDate;
use serde::Deserialize;

use super::query::{validate_limit, DateRange, Page};
use crate::error::Result;
use crate::providers::ProviderName;

/// Default number of entries per provider for the latest-by-type view
pub const DEFAULT_LATEST_LIMIT: u32 = 1;

/// Default page size per provider for the all-by-type view
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Query for GET /aggregates/latest
#[derive(Debug, Clone, Deserialize)]
pub struct LatestQuery {
    pub user_id: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// Restricts the query to one provider
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl LatestQuery {
    /// Validates the query. Returns an error message if invalid.
    pub fn validate(&self) -> Option<String> {
        validate_identity(&self.user_id, &self.data_type)
            .or_else(|| limit_error(self.limit()))
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LATEST_LIMIT)
    }

    /// Parsed `device` filter. Unknown names are rejected.
    pub fn device(&self) -> Result<Option<ProviderName>> {
        self.device.as_deref().map(str::parse).transpose()
    }
}

/// Query for GET /aggregates/all
#[derive(Debug, Clone, Deserialize)]
pub struct AllByTypeQuery {
    pub user_id: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub after: Option<NaiveDate>,
    #[serde(default)]
    pub before: Option<NaiveDate>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl AllByTypeQuery {
    pub fn validate(&self) -> Option<String> {
        validate_identity(&self.user_id, &self.data_type)
            .or_else(|| limit_error(self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)))
    }

    pub fn range(&self) -> Result<DateRange> {
        DateRange::new(self.after, self.before)
    }

    pub fn page(&self) -> Result<Page> {
        Page::new(
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            self.offset.unwrap_or(0),
        )
    }
}

/// Query for GET /providers/:provider/users/:user_id/dates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    #[serde(default)]
    pub after: Option<NaiveDate>,
    #[serde(default)]
    pub before: Option<NaiveDate>,
}

impl DateRangeQuery {
    pub fn range(&self) -> Result<DateRange> {
        DateRange::new(self.after, self.before)
    }
}

/// Query for GET /providers/:provider/users/:user_id/data/:date
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataQuery {
    #[serde(default, rename = "type")]
    pub data_type: Option<String>,
}

impl DataQuery {
    pub fn validate(&self) -> Option<String> {
        match self.data_type.as_deref() {
            Some(t) if t.trim().is_empty() => Some("type cannot be empty".to_string()),
            _ => None,
        }
    }
}

fn validate_identity(user_id: &str, data_type: &str) -> Option<String> {
    if user_id.trim().is_empty() {
        return Some("user_id cannot be empty".to_string());
    }
    if data_type.trim().is_empty() {
        return Some("type cannot be empty".to_string());
    }
    None
}

fn limit_error(limit: u32) -> Option<String> {
    validate_limit(limit).err().map(|e| e.to_string())
}
