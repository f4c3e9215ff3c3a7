use crate::{CacheStats, FactCategory, IdempotencyCache, MembershipKey};
use chrono::{DateTime, Utc};
use definitions::{Definition, PersonType};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Expiry policy wrapped around another cache.
///
/// Facts are still recorded in the inner cache, which stays append-only.
/// The wrapper stamps each mark and reports a fact as unknown once its
/// stamp is older than the TTL, so the engine redoes the work and marks it
/// again. A TTL of 0 expires immediately, a negative TTL never expires.
pub struct TtlCache<C> {
    inner: C,
    ttl_seconds: i64,
    stamps: RwLock<HashMap<(FactCategory, String), DateTime<Utc>>>,
    results: RwLock<HashMap<MembershipKey, (DateTime<Utc>, Arc<Vec<Definition>>)>>,
}

impl<C: IdempotencyCache> TtlCache<C> {
    pub fn new(inner: C, ttl_seconds: i64) -> Self {
        Self {
            inner,
            ttl_seconds,
            stamps: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    fn is_fresh(&self, stamped_at: DateTime<Utc>) -> bool {
        if self.ttl_seconds < 0 {
            return true;
        }
        let age_seconds = (Utc::now() - stamped_at).num_seconds();
        self.ttl_seconds > 0 && age_seconds <= self.ttl_seconds
    }
}

impl<C: IdempotencyCache> IdempotencyCache for TtlCache<C> {
    fn has(&self, category: FactCategory, key: &str) -> bool {
        if !self.inner.has(category, key) {
            return false;
        }
        let stamped_at = self
            .stamps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(category, key.to_string()))
            .copied();
        match stamped_at {
            Some(stamped_at) if self.is_fresh(stamped_at) => true,
            Some(_) => {
                debug!("Cached {} for {} expired", category, key);
                false
            }
            // Marked on the inner cache directly, outside this policy
            None => true,
        }
    }

    fn mark(&self, category: FactCategory, key: &str) -> bool {
        let expired = !self.has(category, key);
        self.inner.mark(category, key);
        self.stamps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((category, key.to_string()), Utc::now());
        expired
    }

    fn cached_memberships(
        &self,
        person_type: PersonType,
        values: &[String],
    ) -> Option<Arc<Vec<Definition>>> {
        let key = MembershipKey::new(person_type, values);
        let results = self.results.read().unwrap_or_else(PoisonError::into_inner);
        results
            .get(&key)
            .filter(|(stamped_at, _)| self.is_fresh(*stamped_at))
            .map(|(_, definitions)| Arc::clone(definitions))
    }

    fn cache_memberships(
        &self,
        person_type: PersonType,
        values: &[String],
        definitions: Vec<Definition>,
    ) -> Arc<Vec<Definition>> {
        let key = MembershipKey::new(person_type, values);
        let mut results = self.results.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((stamped_at, existing)) = results.get(&key) {
            if self.is_fresh(*stamped_at) {
                return Arc::clone(existing);
            }
        }
        let definitions = Arc::new(definitions);
        results.insert(key, (Utc::now(), Arc::clone(&definitions)));
        definitions
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats();
        stats.membership_results = self
            .results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = TtlCache::new(MemoryCache::new(), 0);
        assert!(cache.mark_privileges_handled("org:g"));
        assert!(!cache.has_privileges_handled("org:g"));
        // The inner cache still knows the fact
        assert!(cache.inner().has_privileges_handled("org:g"));
        // Marking an expired fact reports it as new again
        assert!(cache.mark_privileges_handled("org:g"));
    }

    #[test]
    fn test_fresh_facts_are_kept() {
        let cache = TtlCache::new(MemoryCache::new(), 3600);
        assert!(cache.mark_memberships_handled("org:g"));
        assert!(cache.has_memberships_handled("org:g"));
        assert!(!cache.mark_memberships_handled("org:g"));
    }

    #[test]
    fn test_negative_ttl_never_expires() {
        let cache = TtlCache::new(MemoryCache::new(), -1);
        cache.mark_empty_template_created("org:e");
        assert!(cache.has_empty_template_created("org:e"));
    }

    #[test]
    fn test_membership_results_are_refreshed_after_expiry() {
        let cache = TtlCache::new(MemoryCache::new(), 0);
        let values = vec!["ETB01".to_string()];
        cache.cache_memberships(PersonType::Teacher, &values, Vec::new());
        assert!(cache.cached_memberships(PersonType::Teacher, &values).is_none());
        assert_eq!(cache.stats().membership_results, 1);
    }
}
