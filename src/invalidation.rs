//! Invalidation Dispatcher
//!
//! Runs after every committed provider write, before the write is answered.
//! Deletes the writer's own (provider, user) views and every cross-provider
//! aggregate of the user, since those may embed the overwritten data. Other
//! users and other providers' views are left alone.
//!
//! A failed sweep is logged and counted but never fails the write: the write
//! already committed, and the entries it missed age out with their TTL.

use tracing::{error, info};

use crate::cache::keys::invalidation_prefixes;
use crate::cache::{CacheClient, CacheScope};
use crate::providers::ProviderName;

/// What an invalidation achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// Sweep finished; `removed` keys were deleted
    Completed { removed: u64 },
    /// Sweep failed; stale entries may be served until their TTL expires
    Failed,
}

#[derive(Clone)]
pub struct InvalidationDispatcher {
    cache: CacheClient,
}

impl InvalidationDispatcher {
    pub fn new(cache: CacheClient) -> Self {
        Self { cache }
    }

    /// Invalidates everything a write to (user, provider) could have staled.
    pub async fn invalidate_provider(
        &self,
        user_id: &str,
        provider: ProviderName,
    ) -> InvalidationOutcome {
        let prefixes = invalidation_prefixes(user_id, provider);
        self.sweep(&prefixes).await
    }

    /// Invalidates a single scope of any domain.
    pub async fn invalidate_scope(&self, scope: &CacheScope) -> InvalidationOutcome {
        self.sweep(&[scope.prefix()]).await
    }

    async fn sweep(&self, prefixes: &[String]) -> InvalidationOutcome {
        match self.cache.delete_by_prefixes(prefixes).await {
            Ok(removed) => {
                info!(prefixes = ?prefixes, removed, "Invalidated cache entries");
                InvalidationOutcome::Completed { removed }
            }
            Err(e) => {
                error!(
                    prefixes = ?prefixes,
                    error = %e,
                    "Cache invalidation failed; entries stay stale until TTL expiry"
                );
                InvalidationOutcome::Failed
            }
        }
    }
}
