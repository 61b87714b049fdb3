//! Cache Key Policy
//!
//! Every key is `<domain>:<resource>:<user>:<view>[:<param>]*`. The first
//! three segments form the scope prefix used for invalidation, so every key of
//! a scope starts with [`CacheScope::prefix`] whatever filters were applied.
//!
//! Segments are escaped so a value can never contain the separator, and
//! absent optional filters serialize to [`ABSENT`] instead of being skipped.
//! Together this makes key rendering injective: two different parameter sets
//! never share a cache slot.

use chrono::NaiveDate;

use crate::models::{DateRange, Page};
use crate::providers::ProviderName;

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Encoding of an absent optional filter.
pub const ABSENT: &str = "~";

// == Domain ==
/// Top-level cache namespace, one per client system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Wearables,
    Fis,
    Injury,
    Lab,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Wearables => "wearables",
            Domain::Fis => "fis",
            Domain::Injury => "injury",
            Domain::Lab => "lab",
        }
    }
}

// == Segment Encoding ==
/// Escapes the characters that carry meaning inside a key.
pub fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '~' => out.push_str("%7E"),
            _ => out.push(ch),
        }
    }
    out
}

/// One filter value of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyParam {
    Value(String),
    Absent,
}

impl KeyParam {
    pub fn value(value: impl ToString) -> Self {
        KeyParam::Value(value.to_string())
    }

    pub fn optional<T: ToString>(value: Option<T>) -> Self {
        value.map_or(KeyParam::Absent, KeyParam::value)
    }

    fn encode(&self) -> String {
        match self {
            KeyParam::Value(v) => encode_segment(v),
            KeyParam::Absent => ABSENT.to_string(),
        }
    }
}

// == Cache Scope ==
/// The invalidation unit: (domain, resource, user).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheScope {
    domain: Domain,
    resource: String,
    user: Option<String>,
}

impl CacheScope {
    pub fn new(domain: Domain, resource: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            domain,
            resource: resource.into(),
            user: Some(user.into()),
        }
    }

    /// Scope for data shared by every user, such as reference lists.
    pub fn global(domain: Domain, resource: impl Into<String>) -> Self {
        Self {
            domain,
            resource: resource.into(),
            user: None,
        }
    }

    /// Prefix shared by every key of this scope. Ends with the separator so
    /// user `u1` never matches keys of user `u10`.
    pub fn prefix(&self) -> String {
        let user = self
            .user
            .as_deref()
            .map_or_else(|| ABSENT.to_string(), encode_segment);
        format!(
            "{}{sep}{}{sep}{}{sep}",
            self.domain.as_str(),
            encode_segment(&self.resource),
            user,
            sep = SEPARATOR
        )
    }

    /// Full key for `view` with its filters in order.
    pub fn key(&self, view: &str, params: &[KeyParam]) -> String {
        let mut key = self.prefix();
        key.push_str(&encode_segment(view));
        for param in params {
            key.push(SEPARATOR);
            key.push_str(&param.encode());
        }
        key
    }
}

/// Builds a key from its parts.
pub fn build_key(
    domain: Domain,
    resource: &str,
    user: &str,
    view: &str,
    params: &[KeyParam],
) -> String {
    CacheScope::new(domain, resource, user).key(view, params)
}

// == Wearable Keys ==
const RESOURCE_LATEST: &str = "latest";
const RESOURCE_ALL_BY_TYPE: &str = "all";
const RESOURCE_PROVIDERS: &str = "providers";

/// Every cacheable view of the wearable domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WearableKey {
    Dates {
        provider: ProviderName,
        user_id: String,
        range: DateRange,
    },
    Types {
        provider: ProviderName,
        user_id: String,
        date: NaiveDate,
    },
    Data {
        provider: ProviderName,
        user_id: String,
        date: NaiveDate,
        data_type: Option<String>,
    },
    Latest {
        user_id: String,
        data_type: String,
        device: Option<ProviderName>,
        limit: u32,
    },
    AllByType {
        user_id: String,
        data_type: String,
        range: DateRange,
        page: Page,
    },
    Providers,
}

impl WearableKey {
    /// Scope the key belongs to; the dispatcher invalidates by these.
    pub fn scope(&self) -> CacheScope {
        match self {
            WearableKey::Dates {
                provider, user_id, ..
            }
            | WearableKey::Types {
                provider, user_id, ..
            }
            | WearableKey::Data {
                provider, user_id, ..
            } => provider_scope(user_id, *provider),
            WearableKey::Latest { user_id, .. } => {
                CacheScope::new(Domain::Wearables, RESOURCE_LATEST, user_id.as_str())
            }
            WearableKey::AllByType { user_id, .. } => {
                CacheScope::new(Domain::Wearables, RESOURCE_ALL_BY_TYPE, user_id.as_str())
            }
            WearableKey::Providers => CacheScope::global(Domain::Wearables, RESOURCE_PROVIDERS),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            WearableKey::Latest { .. } | WearableKey::AllByType { .. }
        )
    }

    pub fn render(&self) -> String {
        let scope = self.scope();
        match self {
            WearableKey::Dates { range, .. } => scope.key(
                "dates",
                &[
                    KeyParam::optional(range.after),
                    KeyParam::optional(range.before),
                ],
            ),
            WearableKey::Types { date, .. } => scope.key("types", &[KeyParam::value(date)]),
            WearableKey::Data {
                date, data_type, ..
            } => scope.key(
                "data",
                &[
                    KeyParam::value(date),
                    KeyParam::optional(data_type.as_deref()),
                ],
            ),
            WearableKey::Latest {
                data_type,
                device,
                limit,
                ..
            } => scope.key(
                "by_type",
                &[
                    KeyParam::value(data_type),
                    KeyParam::optional(*device),
                    KeyParam::value(limit),
                ],
            ),
            WearableKey::AllByType {
                data_type,
                range,
                page,
                ..
            } => scope.key(
                "by_type",
                &[
                    KeyParam::value(data_type),
                    KeyParam::optional(range.after),
                    KeyParam::optional(range.before),
                    KeyParam::value(page.limit),
                    KeyParam::value(page.offset),
                ],
            ),
            WearableKey::Providers => scope.key("list", &[]),
        }
    }
}

/// Scope of one provider's date/type/data views for a user.
pub fn provider_scope(user_id: &str, provider: ProviderName) -> CacheScope {
    CacheScope::new(Domain::Wearables, provider.as_str(), user_id)
}

/// Scopes of the cross-provider views for a user.
pub fn aggregate_scopes(user_id: &str) -> [CacheScope; 2] {
    [
        CacheScope::new(Domain::Wearables, RESOURCE_LATEST, user_id),
        CacheScope::new(Domain::Wearables, RESOURCE_ALL_BY_TYPE, user_id),
    ]
}

/// Prefixes that may hold data stale after a write to (user, provider).
pub fn invalidation_prefixes(user_id: &str, provider: ProviderName) -> Vec<String> {
    std::iter::once(provider_scope(user_id, provider))
        .chain(aggregate_scopes(user_id))
        .map(|scope| scope.prefix())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_key_layout() {
        let key = WearableKey::Dates {
            provider: ProviderName::Garmin,
            user_id: "u1".into(),
            range: DateRange::new(Some(date("2024-03-01")), None).unwrap(),
        };
        assert_eq!(key.render(), "wearables:garmin:u1:dates:2024-03-01:~");
    }

    #[test]
    fn test_absent_filter_differs_from_empty_value() {
        let scope = CacheScope::new(Domain::Lab, "bundles", "u1");
        let absent = scope.key("list", &[KeyParam::Absent]);
        let empty = scope.key("list", &[KeyParam::value("")]);
        let tilde = scope.key("list", &[KeyParam::value("~")]);
        assert_ne!(absent, empty);
        assert_ne!(absent, tilde);
        assert_ne!(scope.key("list", &[]), empty);
    }

    #[test]
    fn test_separator_in_value_cannot_alias() {
        let a = build_key(Domain::Fis, "results", "u1", "race", &[
            KeyParam::value("a:b"),
            KeyParam::value("c"),
        ]);
        let b = build_key(Domain::Fis, "results", "u1", "race", &[
            KeyParam::value("a"),
            KeyParam::value("b:c"),
        ]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_user_prefix_is_not_shared_with_longer_user() {
        let short = provider_scope("u1", ProviderName::Oura).prefix();
        let long_key = WearableKey::Types {
            provider: ProviderName::Oura,
            user_id: "u10".into(),
            date: date("2024-03-01"),
        }
        .render();
        assert!(!long_key.starts_with(&short));
    }

    #[test]
    fn test_latest_and_all_by_type_never_collide() {
        let latest = WearableKey::Latest {
            user_id: "u1".into(),
            data_type: "sleep".into(),
            device: None,
            limit: 3,
        };
        let all = WearableKey::AllByType {
            user_id: "u1".into(),
            data_type: "sleep".into(),
            range: DateRange::unbounded(),
            page: Page::new(3, 0).unwrap(),
        };
        assert_ne!(latest.render(), all.render());
        assert!(latest.is_aggregate() && all.is_aggregate());
    }

    #[test]
    fn test_invalidation_prefixes_cover_provider_and_aggregates() {
        let prefixes = invalidation_prefixes("u1", ProviderName::Polar);
        assert_eq!(
            prefixes,
            vec![
                "wearables:polar:u1:".to_string(),
                "wearables:latest:u1:".to_string(),
                "wearables:all:u1:".to_string(),
            ]
        );
    }

    #[test]
    fn test_global_scope_is_distinct_from_any_user() {
        let global = WearableKey::Providers.render();
        assert_eq!(global, "wearables:providers:~:list");
        let user_tilde = CacheScope::new(Domain::Wearables, "providers", "~").prefix();
        assert!(!global.starts_with(&user_tilde));
    }
}
