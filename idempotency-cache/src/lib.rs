//! Process-lifetime memoization of provisioning work.
//!
//! The engine asks the cache whether the privileges or the containing-group
//! memberships of a group were already handled, and whether a templated
//! "create even if empty" resource was already created, before it spends any
//! backend call on them. Facts are append-only: nothing in this crate forgets
//! a fact except the [`TtlCache`] policy wrapper.

pub mod ttl;

use definitions::{Definition, PersonType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

pub use ttl::TtlCache;

/// The independent fact sets kept by a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    PrivilegesHandled,
    MembershipsHandled,
    EmptyTemplateCreated,
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactCategory::PrivilegesHandled => write!(f, "privileges-handled"),
            FactCategory::MembershipsHandled => write!(f, "memberships-handled"),
            FactCategory::EmptyTemplateCreated => write!(f, "empty-template-created"),
        }
    }
}

/// Key of the membership lookup results cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MembershipKey {
    pub person_type: PersonType,
    pub values: Vec<String>,
}

impl MembershipKey {
    pub fn new(person_type: PersonType, values: &[String]) -> Self {
        Self {
            person_type,
            values: values.to_vec(),
        }
    }
}

/// Idempotency facts shared by every provisioning call of a process
pub trait IdempotencyCache: Send + Sync {
    fn has(&self, category: FactCategory, key: &str) -> bool;

    /// Record a fact; returns false when it was already known
    fn mark(&self, category: FactCategory, key: &str) -> bool;

    fn cached_memberships(
        &self,
        person_type: PersonType,
        values: &[String],
    ) -> Option<Arc<Vec<Definition>>>;

    /// Store a lookup result. The first stored result for a key wins.
    fn cache_memberships(
        &self,
        person_type: PersonType,
        values: &[String],
        definitions: Vec<Definition>,
    ) -> Arc<Vec<Definition>>;

    fn stats(&self) -> CacheStats;

    fn has_privileges_handled(&self, group: &str) -> bool {
        self.has(FactCategory::PrivilegesHandled, group)
    }

    fn mark_privileges_handled(&self, group: &str) -> bool {
        self.mark(FactCategory::PrivilegesHandled, group)
    }

    fn has_memberships_handled(&self, group: &str) -> bool {
        self.has(FactCategory::MembershipsHandled, group)
    }

    fn mark_memberships_handled(&self, group: &str) -> bool {
        self.mark(FactCategory::MembershipsHandled, group)
    }

    fn has_empty_template_created(&self, path: &str) -> bool {
        self.has(FactCategory::EmptyTemplateCreated, path)
    }

    fn mark_empty_template_created(&self, path: &str) -> bool {
        self.mark(FactCategory::EmptyTemplateCreated, path)
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub privileges_handled: usize,
    pub memberships_handled: usize,
    pub empty_templates_created: usize,
    pub membership_results: usize,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory cache, one lock per fact set
#[derive(Debug, Default)]
pub struct MemoryCache {
    privileges_handled: RwLock<HashSet<String>>,
    memberships_handled: RwLock<HashSet<String>>,
    empty_templates_created: RwLock<HashSet<String>>,
    membership_results: RwLock<HashMap<MembershipKey, Arc<Vec<Definition>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn facts(&self, category: FactCategory) -> &RwLock<HashSet<String>> {
        match category {
            FactCategory::PrivilegesHandled => &self.privileges_handled,
            FactCategory::MembershipsHandled => &self.memberships_handled,
            FactCategory::EmptyTemplateCreated => &self.empty_templates_created,
        }
    }

    fn record_lookup(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl IdempotencyCache for MemoryCache {
    fn has(&self, category: FactCategory, key: &str) -> bool {
        // A poisoned set still holds valid facts: inserts never leave it half written.
        let known = self
            .facts(category)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key);
        self.record_lookup(known);
        known
    }

    fn mark(&self, category: FactCategory, key: &str) -> bool {
        let inserted = self
            .facts(category)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        if inserted {
            debug!("Cached {} for {}", category, key);
        }
        inserted
    }

    fn cached_memberships(
        &self,
        person_type: PersonType,
        values: &[String],
    ) -> Option<Arc<Vec<Definition>>> {
        let found = self
            .membership_results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&MembershipKey::new(person_type, values))
            .cloned();
        self.record_lookup(found.is_some());
        found
    }

    fn cache_memberships(
        &self,
        person_type: PersonType,
        values: &[String],
        definitions: Vec<Definition>,
    ) -> Arc<Vec<Definition>> {
        let mut results = self
            .membership_results
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            results
                .entry(MembershipKey::new(person_type, values))
                .or_insert_with(|| Arc::new(definitions)),
        )
    }

    fn stats(&self) -> CacheStats {
        let count = |set: &RwLock<HashSet<String>>| {
            set.read().unwrap_or_else(PoisonError::into_inner).len()
        };
        CacheStats {
            privileges_handled: count(&self.privileges_handled),
            memberships_handled: count(&self.memberships_handled),
            empty_templates_created: count(&self.empty_templates_created),
            membership_results: self
                .membership_results
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
