//! Thread-safe owner of a descriptor registry and its autoclose policy.
//! Every registry operation, including an autoclose pass triggered by an insert, runs
//! under a single mutex acquisition.

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::autoclose::{AutoclosePolicy, AutocloseReport};
use crate::config::AutocloseConfig;
use crate::descriptors::{DateSortedDescriptors, Inserted, Priority};
use crate::error::{CloseError, DescriptorError, DescriptorResult};
use crate::openable::Openable;
use crate::time::{Clock, SystemClock, Timestamp};

/// Result of [`DescriptorCache::insert`].
#[derive(Debug)]
pub struct InsertOutcome<K, V> {
    pub inserted: Inserted<V>,
    /// Present when an on-insert autoclose pass ran. A failed pass (bad bounds) does not
    /// undo the insert.
    pub autoclose: Option<DescriptorResult<AutocloseReport<K>>>,
}

impl<K, V> InsertOutcome<K, V> {
    /// The on-insert pass error, if there was one.
    pub fn autoclose_error(&self) -> Option<&DescriptorError> {
        self.autoclose.as_ref().and_then(|r| r.as_ref().err())
    }
}

/// Point-in-time view of one registered descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorInfo<K> {
    pub key: K,
    pub position: usize,
    pub added_at: Timestamp,
    pub used_at: Timestamp,
}

pub struct DescriptorCache<K, V> {
    registry: Mutex<DateSortedDescriptors<K, V>>,
    policy: RwLock<Option<AutoclosePolicy>>,
    autoclose_on_insert: AtomicBool,
}

impl<K, V> Debug for DescriptorCache<K, V>
where
    K: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("registry", &*self.registry.lock())
            .field("policy", &*self.policy.read())
            .field("autoclose_on_insert", &self.autoclose_on_insert.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Default for DescriptorCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: PartialEq + Openable,
{
    fn default() -> Self { Self::new() }
}

impl<K, V> DescriptorCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: PartialEq + Openable,
{
    pub fn new() -> Self { Self::with_clock(Arc::new(SystemClock)) }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Mutex::new(DateSortedDescriptors::with_clock(clock)),
            policy: RwLock::new(None),
            autoclose_on_insert: AtomicBool::new(false),
        }
    }

    /// Build a cache whose policy and insert trigger come from `config`.
    pub fn from_config(config: &AutocloseConfig, clock: Arc<dyn Clock>) -> DescriptorResult<Self> {
        let cache = Self::with_clock(clock);
        let policy = config.to_policy()?;
        cache.autoclose_on_insert.store(policy.is_some() && config.on_insert, Ordering::Relaxed);
        *cache.policy.write() = policy;
        Ok(cache)
    }

    pub fn with_policy(self, policy: AutoclosePolicy, on_insert: bool) -> Self {
        *self.policy.write() = Some(policy);
        self.autoclose_on_insert.store(on_insert, Ordering::Relaxed);
        self
    }

    pub fn set_policy(&self, policy: Option<AutoclosePolicy>) { *self.policy.write() = policy; }
    pub fn clear_policy(&self) { self.set_policy(None); }
    pub fn policy(&self) -> Option<AutoclosePolicy> { self.policy.read().clone() }

    pub fn set_autoclose_on_insert(&self, on: bool) { self.autoclose_on_insert.store(on, Ordering::Relaxed); }
    pub fn autoclose_on_insert(&self) -> bool { self.autoclose_on_insert.load(Ordering::Relaxed) }

    pub fn len(&self) -> usize { self.registry.lock().len() }
    pub fn is_empty(&self) -> bool { self.registry.lock().is_empty() }

    /// Register a descriptor, then run the attached policy if on-insert autoclose is on.
    ///
    /// The entry is registered and any replaced value handed back even when the pass
    /// fails on a bad policy; the failure is carried in [`InsertOutcome::autoclose`].
    pub fn insert(&self, key: K, value: V) -> InsertOutcome<K, V> {
        let policy = if self.autoclose_on_insert() { self.policy() } else { None };
        let mut reg = self.registry.lock();
        let inserted = reg.insert(key, value);
        let autoclose = policy.map(|p| p.run(&mut *reg));
        InsertOutcome { inserted, autoclose }
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.registry.lock().remove(key)
    }

    /// Run `f` on the registered value, touching its used timestamp.
    pub fn with_value<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.registry.lock().lookup(key).map(f)
    }

    pub fn lookup<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.registry.lock().lookup(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.registry.lock().contains_key(key)
    }

    pub fn info<Q>(&self, key: &Q) -> Option<DescriptorInfo<K>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let reg = self.registry.lock();
        let pos = reg.position_of(key)?;
        let (k, e) = reg.at(pos);
        Some(DescriptorInfo { key: k.clone(), position: pos, added_at: e.added_at(), used_at: e.used_at() })
    }

    /// Every descriptor, oldest first by `by`.
    pub fn snapshot(&self, by: Priority) -> Vec<DescriptorInfo<K>> {
        let reg = self.registry.lock();
        reg.ascending(by)
            .into_iter()
            .map(|(k, e)| DescriptorInfo {
                key: k.clone(),
                position: reg.position_of(k).unwrap_or_default(),
                added_at: e.added_at(),
                used_at: e.used_at(),
            })
            .collect()
    }

    /// Run the attached policy; `None` when no policy is set.
    pub fn autoclose(&self) -> DescriptorResult<Option<AutocloseReport<K>>> {
        match self.policy() {
            Some(p) => Ok(Some(self.autoclose_with(&p)?)),
            None => Ok(None),
        }
    }

    pub fn autoclose_with(&self, policy: &AutoclosePolicy) -> DescriptorResult<AutocloseReport<K>> {
        let mut reg = self.registry.lock();
        policy.run(&mut *reg)
    }

    /// Close and deregister one descriptor. A failed close keeps it registered.
    pub fn close<Q>(&self, key: &Q) -> Option<Result<(), CloseError>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut reg = self.registry.lock();
        let res = reg.peek_mut(key)?.close();
        if res.is_ok() {
            reg.remove(key);
        }
        Some(res)
    }

    /// Close everything, best-effort; failures stay registered.
    pub fn close_all(&self) -> AutocloseReport<K> {
        let mut reg = self.registry.lock();
        let keys: Vec<K> = reg.keys().cloned().collect();
        let mut report = AutocloseReport::new(keys.len());
        for key in keys {
            let Some(value) = reg.peek_mut(&key) else { continue };
            report.attempted += 1;
            match value.close() {
                Ok(()) => {
                    reg.remove(&key);
                    report.closed += 1;
                    report.closed_keys.push(key);
                }
                Err(e) => {
                    warn!(target: "pathfd::registry", key = ?key, code = e.code(), "close_all: {}", e);
                    report.failed += 1;
                }
            }
        }
        debug!(target: "pathfd::registry", closed = report.closed, failed = report.failed, "close_all finished");
        report
    }

    /// Direct access to the registry under the lock.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut DateSortedDescriptors<K, V>) -> R) -> R {
        let mut reg = self.registry.lock();
        f(&mut *reg)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
