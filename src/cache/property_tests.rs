//! Property-Based Tests for the Cache Module
//!
//! Uses proptest to check key injectivity, prefix containment and the
//! memory backend's overwrite and sweep behaviour.

use std::time::Duration;

use chrono::NaiveDate;
use proptest::prelude::*;

use crate::cache::keys::{aggregate_scopes, invalidation_prefixes, provider_scope};
use crate::cache::{CacheStore, KeyParam, MemoryCache, WearableKey};
use crate::models::{DateRange, Page};
use crate::providers::ProviderName;

// == Strategies ==
/// User ids including the characters the key encoding must escape.
fn user_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9:~%]{0,12}"
}

fn data_type_strategy() -> impl Strategy<Value = String> {
    "[a-z_:~%]{0,10}"
}

fn provider_strategy() -> impl Strategy<Value = ProviderName> {
    prop::sample::select(ProviderName::ALL.to_vec())
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650).prop_map(|days| {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(days)
    })
}

fn range_strategy() -> impl Strategy<Value = DateRange> {
    (
        prop::option::of(date_strategy()),
        prop::option::of(date_strategy()),
    )
        .prop_map(|(after, before)| DateRange { after, before })
}

fn page_strategy() -> impl Strategy<Value = Page> {
    (1u32..20, 0u32..20).prop_map(|(limit, offset)| Page { limit, offset })
}

fn key_strategy() -> impl Strategy<Value = WearableKey> {
    prop_oneof![
        (provider_strategy(), user_strategy(), range_strategy()).prop_map(
            |(provider, user_id, range)| WearableKey::Dates {
                provider,
                user_id,
                range
            }
        ),
        (provider_strategy(), user_strategy(), date_strategy()).prop_map(
            |(provider, user_id, date)| WearableKey::Types {
                provider,
                user_id,
                date
            }
        ),
        (
            provider_strategy(),
            user_strategy(),
            date_strategy(),
            prop::option::of(data_type_strategy())
        )
            .prop_map(|(provider, user_id, date, data_type)| WearableKey::Data {
                provider,
                user_id,
                date,
                data_type
            }),
        (
            user_strategy(),
            data_type_strategy(),
            prop::option::of(provider_strategy()),
            1u32..20
        )
            .prop_map(|(user_id, data_type, device, limit)| WearableKey::Latest {
                user_id,
                data_type,
                device,
                limit
            }),
        (
            user_strategy(),
            data_type_strategy(),
            range_strategy(),
            page_strategy()
        )
            .prop_map(|(user_id, data_type, range, page)| WearableKey::AllByType {
                user_id,
                data_type,
                range,
                page
            }),
        Just(WearableKey::Providers),
    ]
}

fn key_user(key: &WearableKey) -> Option<&str> {
    match key {
        WearableKey::Dates { user_id, .. }
        | WearableKey::Types { user_id, .. }
        | WearableKey::Data { user_id, .. }
        | WearableKey::Latest { user_id, .. }
        | WearableKey::AllByType { user_id, .. } => Some(user_id),
        WearableKey::Providers => None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // *For any* two distinct parameter sets, the rendered keys SHALL differ.
    #[test]
    fn prop_key_injectivity(a in key_strategy(), b in key_strategy()) {
        if a != b {
            prop_assert_ne!(a.render(), b.render());
        } else {
            prop_assert_eq!(a.render(), b.render());
        }
    }

    // *For any* key, the key SHALL start with the prefix of its own scope.
    #[test]
    fn prop_key_starts_with_scope_prefix(key in key_strategy()) {
        prop_assert!(key.render().starts_with(&key.scope().prefix()));
    }

    // *For any* user key and any provider, a write to (user, provider) SHALL
    // reach the key when it is that provider's view or an aggregate view.
    #[test]
    fn prop_invalidation_reaches_every_stale_key(
        key in key_strategy(),
        provider in provider_strategy()
    ) {
        let Some(user_id) = key_user(&key) else {
            return Ok(());
        };
        let rendered = key.render();
        let reached = invalidation_prefixes(user_id, provider)
            .iter()
            .any(|p| rendered.starts_with(p.as_str()));

        let must_reach = key.is_aggregate() || key.scope() == provider_scope(user_id, provider);
        prop_assert_eq!(reached, must_reach, "key {} provider {}", rendered, provider);
    }

    // *For any* two different users, no prefix of one SHALL match the other's keys.
    #[test]
    fn prop_prefixes_never_cross_users(
        key in key_strategy(),
        other in user_strategy(),
        provider in provider_strategy()
    ) {
        let Some(user_id) = key_user(&key) else {
            return Ok(());
        };
        prop_assume!(user_id != other);
        let rendered = key.render();
        for prefix in invalidation_prefixes(&other, provider) {
            prop_assert!(!rendered.starts_with(&prefix));
        }
        for scope in aggregate_scopes(&other) {
            prop_assert!(!rendered.starts_with(&scope.prefix()));
        }
    }

    // *For any* optional filter, absent and present values SHALL encode differently.
    #[test]
    fn prop_absent_is_distinct(value in "[a-z~:%]{0,6}") {
        let scope = provider_scope("u1", ProviderName::Garmin);
        prop_assert_ne!(
            scope.key("v", &[KeyParam::Absent]),
            scope.key("v", &[KeyParam::value(value)])
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // *For any* set of keys, sweeping a user's invalidation prefixes SHALL
    // remove exactly the keys those prefixes cover.
    #[test]
    fn prop_sweep_removes_exactly_covered_keys(
        keys in prop::collection::vec(key_strategy(), 1..30),
        user_id in user_strategy(),
        provider in provider_strategy()
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let cache = MemoryCache::new(1000);
            let ttl = Duration::from_secs(300);
            let mut rendered: Vec<String> = keys.iter().map(WearableKey::render).collect();
            rendered.sort();
            rendered.dedup();
            for key in &rendered {
                cache.set(key, "[]", ttl).await.unwrap();
            }

            let prefixes = invalidation_prefixes(&user_id, provider);
            let expected = rendered
                .iter()
                .filter(|k| prefixes.iter().any(|p| k.starts_with(p.as_str())))
                .count() as u64;

            let removed = cache.delete_by_prefixes(&prefixes).await.unwrap();
            prop_assert_eq!(removed, expected);
            prop_assert_eq!(cache.len().await as u64, rendered.len() as u64 - expected);
            Ok(())
        })?;
    }

    // *For any* key, storing V1 then V2 SHALL leave exactly V2.
    #[test]
    fn prop_overwrite_semantics(key in key_strategy(), v1 in "[a-z]{1,8}", v2 in "[a-z]{1,8}") {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let cache = MemoryCache::new(10);
            let rendered = key.render();
            cache.set(&rendered, &v1, Duration::from_secs(60)).await.unwrap();
            cache.set(&rendered, &v2, Duration::from_secs(60)).await.unwrap();
            prop_assert_eq!(cache.get(&rendered).await.unwrap(), Some(v2.clone()));
            prop_assert_eq!(cache.len().await, 1);
            Ok(())
        })?;
    }
}
