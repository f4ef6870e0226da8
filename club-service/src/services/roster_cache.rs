//! Time-bounded cache of the member roster.
//!
//! Entries refresh after the configured TTL. A failed refresh falls back to
//! the previous snapshot when there is one. Concurrent misses may each
//! reload; the last one to finish wins.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::clock::Clock;
use super::error::ClubError;
use super::store::{collections, query_records, DocumentStore};
use crate::models::Member;

struct CachedRoster {
    members: Arc<Vec<Member>>,
    loaded_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RosterCache {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cached: Arc<Mutex<Option<CachedRoster>>>,
}

impl RosterCache {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    fn snapshot(&self) -> Option<(Arc<Vec<Member>>, DateTime<Utc>)> {
        let guard = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .map(|entry| (Arc::clone(&entry.members), entry.loaded_at))
    }

    fn replace(&self, entry: Option<CachedRoster>) {
        let mut guard = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = entry;
    }

    /// Current roster, reloading it from the store once the TTL has passed.
    pub async fn members(&self) -> Result<Arc<Vec<Member>>, ClubError> {
        let now = self.clock.now();
        let stale = match self.snapshot() {
            Some((members, loaded_at)) if now - loaded_at < self.ttl => return Ok(members),
            other => other,
        };

        match query_records::<Member, _>(self.store.as_ref(), collections::MEMBERS, &[]).await {
            Ok(mut members) => {
                members.sort_by(|a, b| a.id.cmp(&b.id));
                let members = Arc::new(members);
                tracing::debug!(count = members.len(), "Roster cache refreshed");
                self.replace(Some(CachedRoster {
                    members: Arc::clone(&members),
                    loaded_at: now,
                }));
                Ok(members)
            }
            Err(e) => match stale {
                Some((members, loaded_at)) => {
                    tracing::warn!(
                        error = %e,
                        loaded_at = %loaded_at,
                        "Roster refresh failed, serving stale roster"
                    );
                    Ok(members)
                }
                None => Err(e),
            },
        }
    }

    /// Member names keyed by id.
    pub async fn names(&self) -> Result<HashMap<String, String>, ClubError> {
        Ok(self
            .members()
            .await?
            .iter()
            .map(|m| (m.id.clone(), m.full_name()))
            .collect())
    }

    /// Drop the snapshot; the next read reloads.
    pub fn invalidate(&self) {
        self.replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::FixedClock;
    use crate::services::store::{set_record, InMemoryStore};
    use chrono::TimeZone;

    async fn seed(store: &InMemoryStore, id: &str, first: &str, last: &str) {
        set_record(store, collections::MEMBERS, id, &Member::new(id, first, last))
            .await
            .unwrap();
    }

    fn setup() -> (Arc<InMemoryStore>, Arc<FixedClock>, RosterCache) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ));
        let cache = RosterCache::new(store.clone(), clock.clone(), Duration::minutes(5));
        (store, clock, cache)
    }

    #[tokio::test]
    async fn test_serves_snapshot_within_ttl() {
        let (store, clock, cache) = setup();
        seed(&store, "m1", "Anna", "Berg").await;
        assert_eq!(cache.members().await.unwrap().len(), 1);

        seed(&store, "m2", "Ben", "Cole").await;
        clock.advance(Duration::minutes(4));
        assert_eq!(cache.members().await.unwrap().len(), 1);

        clock.advance(Duration::minutes(1));
        assert_eq!(cache.members().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_roster_survives_store_outage() {
        let (store, clock, cache) = setup();
        seed(&store, "m1", "Anna", "Berg").await;
        cache.members().await.unwrap();

        store.set_available(false);
        clock.advance(Duration::hours(1));
        let members = cache.members().await.unwrap();
        assert_eq!(members[0].full_name(), "Anna Berg");
    }

    #[tokio::test]
    async fn test_outage_without_snapshot_propagates() {
        let (store, _clock, cache) = setup();
        store.set_available(false);
        assert!(matches!(
            cache.members().await,
            Err(ClubError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let (store, _clock, cache) = setup();
        seed(&store, "m1", "Anna", "Berg").await;
        cache.members().await.unwrap();
        seed(&store, "m2", "Ben", "Cole").await;

        cache.invalidate();
        let names = cache.names().await.unwrap();
        assert_eq!(names.get("m2").map(String::as_str), Some("Ben Cole"));
    }
}
