//! Date-sorted registry of open descriptors.
//! Keeps every live entry at a dense position `[0, len)` in physical insertion order,
//! stamped with the time it was added and the time it was last looked up. Ordered views
//! by either timestamp are computed on demand; nothing is kept physically sorted.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Index;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::time::{Clock, SystemClock, Timestamp};

/// Which timestamp governs an ordering or a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Added,
    Used,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<V> {
    value: V,
    added_at: Timestamp,
    used_at: Timestamp,
}

impl<V> Entry<V> {
    fn new(value: V, now: Timestamp) -> Self { Self { value, added_at: now, used_at: now } }

    pub fn value(&self) -> &V { &self.value }
    pub fn value_mut(&mut self) -> &mut V { &mut self.value }
    pub fn into_value(self) -> V { self.value }
    pub fn added_at(&self) -> Timestamp { self.added_at }
    pub fn used_at(&self) -> Timestamp { self.used_at }

    #[inline]
    pub fn timestamp(&self, by: Priority) -> Timestamp {
        match by {
            Priority::Added => self.added_at,
            Priority::Used => self.used_at,
        }
    }

    fn touch(&mut self, now: Timestamp) {
        if now > self.used_at { self.used_at = now; }
    }
}

/// Outcome of [`DateSortedDescriptors::insert`].
#[derive(Debug, PartialEq)]
pub enum Inserted<V> {
    /// The key was not registered.
    New,
    /// An unequal value was registered; it is handed back to the caller.
    Replaced(V),
    /// An equal value was already registered; the offered value is handed back.
    Unchanged(V),
}

impl<V> Inserted<V> {
    pub fn is_new(&self) -> bool { matches!(self, Inserted::New) }
    pub fn is_unchanged(&self) -> bool { matches!(self, Inserted::Unchanged(_)) }
}

#[derive(Debug, Clone)]
struct Slot<K, V> {
    key: K,
    entry: Entry<V>,
}

/// Key -> entry store with a dense positional order and timestamp views.
///
/// Single-owner and unsynchronized; wrap it in a [`crate::cache::DescriptorCache`]
/// to share it between threads.
pub struct DateSortedDescriptors<K, V> {
    clock: Arc<dyn Clock>,
    slots: Vec<Slot<K, V>>,
    positions: HashMap<K, usize>,
}

impl<K, V> fmt::Debug for DateSortedDescriptors<K, V>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateSortedDescriptors")
            .field("len", &self.slots.len())
            .field("keys", &self.slots.iter().map(|s| &s.key).collect::<Vec<_>>())
            .field("clock", &self.clock)
            .finish()
    }
}

impl<K, V> Default for DateSortedDescriptors<K, V>
where
    K: Hash + Eq + Clone,
    V: PartialEq,
{
    fn default() -> Self { Self::new() }
}

impl<K, V> DateSortedDescriptors<K, V>
where
    K: Hash + Eq + Clone,
    V: PartialEq,
{
    pub fn new() -> Self { Self::with_clock(Arc::new(SystemClock)) }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, slots: Vec::new(), positions: HashMap::new() }
    }

    pub fn clock(&self) -> Arc<dyn Clock> { self.clock.clone() }
    pub fn now(&self) -> Timestamp { self.clock.now() }
    pub fn len(&self) -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Register `value` under `key`.
    /// An unequal value replaces the old entry (fresh timestamps, last position); an equal
    /// value leaves everything untouched.
    pub fn insert(&mut self, key: K, value: V) -> Inserted<V> {
        if let Some(&pos) = self.positions.get(&key) {
            if self.slots[pos].entry.value == value {
                return Inserted::Unchanged(value);
            }
            let old = self.remove_position(pos);
            self.push(key, value);
            trace!(target: "pathfd::registry", from = pos, to = self.slots.len() - 1, "replaced descriptor");
            return Inserted::Replaced(old.1);
        }
        self.push(key, value);
        trace!(target: "pathfd::registry", position = self.slots.len() - 1, "registered descriptor");
        Inserted::New
    }

    /// Remove `key`, returning its value. Missing keys are not an error.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = *self.positions.get(key)?;
        Some(self.remove_position(pos).1)
    }

    /// Fetch the value and bump its used timestamp.
    pub fn lookup<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = *self.positions.get(key)?;
        let now = self.clock.now();
        let entry = &mut self.slots[pos].entry;
        entry.touch(now);
        Some(&mut entry.value)
    }

    /// Read an entry without touching it.
    pub fn peek<Q>(&self, key: &Q) -> Option<&Entry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.get(key).map(|&p| &self.slots[p].entry)
    }

    /// Mutable access without touching; used when closing so a failed close leaves the
    /// entry exactly as it was.
    pub fn peek_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = *self.positions.get(key)?;
        Some(&mut self.slots[pos].entry.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.contains_key(key)
    }

    pub fn position_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.get(key).copied()
    }

    /// Entry at `position`.
    ///
    /// # Panics
    /// Panics if `position >= len()`.
    pub fn at(&self, position: usize) -> (&K, &Entry<V>) {
        match self.get_at(position) {
            Some(kv) => kv,
            None => panic!("descriptor position {} out of range (len {})", position, self.slots.len()),
        }
    }

    pub fn get_at(&self, position: usize) -> Option<(&K, &Entry<V>)> {
        self.slots.get(position).map(|s| (&s.key, &s.entry))
    }

    /// Remove the entry at `position`.
    ///
    /// # Panics
    /// Panics if `position >= len()`.
    pub fn remove_at(&mut self, position: usize) -> (K, V) {
        if position >= self.slots.len() {
            panic!("descriptor position {} out of range (len {})", position, self.slots.len());
        }
        self.remove_position(position)
    }

    /// Entries in position order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Entry<V>)> + '_ {
        self.slots.iter().map(|s| (&s.key, &s.entry))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ { self.slots.iter().map(|s| &s.key) }

    /// Oldest first by the chosen timestamp; ties keep position order.
    pub fn ascending(&self, by: Priority) -> Vec<(&K, &Entry<V>)> { self.sorted(by, false) }

    /// Newest first by the chosen timestamp; ties keep position order.
    pub fn descending(&self, by: Priority) -> Vec<(&K, &Entry<V>)> { self.sorted(by, true) }

    /// Remove everything, returning `(key, value)` pairs in position order.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.positions.clear();
        self.slots.drain(..).map(|s| (s.key, s.entry.value)).collect()
    }

    fn sorted(&self, by: Priority, descending: bool) -> Vec<(&K, &Entry<V>)> {
        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        let ts = |i: usize| self.slots[i].entry.timestamp(by);
        // sort_by is stable, so equal timestamps stay in position order
        if descending {
            order.sort_by(|&a, &b| ts(b).cmp(&ts(a)));
        } else {
            order.sort_by(|&a, &b| ts(a).cmp(&ts(b)));
        }
        order.into_iter().map(|i| (&self.slots[i].key, &self.slots[i].entry)).collect()
    }

    fn push(&mut self, key: K, value: V) {
        let now = self.clock.now();
        self.positions.insert(key.clone(), self.slots.len());
        self.slots.push(Slot { key, entry: Entry::new(value, now) });
    }

    fn remove_position(&mut self, pos: usize) -> (K, V) {
        let slot = self.slots.remove(pos);
        self.positions.remove(&slot.key);
        for s in &self.slots[pos..] {
            if let Some(p) = self.positions.get_mut(&s.key) { *p -= 1; }
        }
        (slot.key, slot.entry.value)
    }
}

impl<K, V> Index<usize> for DateSortedDescriptors<K, V>
where
    K: Hash + Eq + Clone,
    V: PartialEq,
{
    type Output = Entry<V>;

    fn index(&self, position: usize) -> &Entry<V> { self.at(position).1 }
}

#[cfg(test)]
#[path = "descriptors_tests.rs"]
mod descriptors_tests;
