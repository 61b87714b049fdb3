//! Validated query parameters shared by the providers, the key policy and
//! the aggregation service.

use chrono::NaiveDate;

use crate::error::{GatewayError, Result};

/// Largest page a caller may request from one provider.
pub const MAX_LIMIT: u32 = 500;

// == Date Range ==
/// Inclusive date bounds, either side optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateRange {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateRange {
    /// Builds a range, rejecting `after > before`.
    pub fn new(after: Option<NaiveDate>, before: Option<NaiveDate>) -> Result<Self> {
        if let (Some(a), Some(b)) = (after, before) {
            if a > b {
                return Err(GatewayError::InvalidRequest(format!(
                    "after ({}) must not be later than before ({})",
                    a, b
                )));
            }
        }
        Ok(Self { after, before })
    }

    /// A range with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.after.map_or(true, |a| date >= a) && self.before.map_or(true, |b| date <= b)
    }
}

// == Page ==
/// Limit/offset pair. Applied per provider, never across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Result<Self> {
        Ok(Self {
            limit: validate_limit(limit)?,
            offset,
        })
    }
}

/// Checks that a limit is in `1..=MAX_LIMIT`.
pub fn validate_limit(limit: u32) -> Result<u32> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(GatewayError::InvalidRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(limit)
}
