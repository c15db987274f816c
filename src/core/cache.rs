//! Keyed entity cache with staleness metadata and per-key subscriptions.
//!
//! The cache holds at most one entry per key; the last successful write wins.
//! Entries carry the time they were fetched and how long they stay fresh. Stale
//! entries are still served (stale-while-revalidate): readers get the value
//! immediately and are told a background refetch is due.
//!
//! # Public API
//! - [`EntityCache`]: The cache itself
//! - [`CacheEntry`]: Cached value plus freshness metadata
//! - [`Lookup`]: Result of a read that also reports whether a refetch is due
//! - [`CacheEvent`]: What subscribers are told about a key
//! - [`Subscription`]: Keeps a listener attached; dropping it detaches the listener
//!
//! # Notifications
//! Listeners run synchronously after the write that triggered them. Owners that
//! keep the cache behind a `RefCell` can switch to deferred delivery with
//! [`EntityCache::defer_notifications`] and deliver once the borrow is released,
//! so listeners may read back through the owner.

use crate::core::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
    pub stale_after: Duration,
    invalidated: bool,
}

impl<V> CacheEntry<V> {
    fn new(value: V, fetched_at: DateTime<Utc>, stale_after: Duration) -> Self {
        Self {
            value,
            fetched_at,
            stale_after,
            invalidated: false,
        }
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.invalidated || now >= self.fetched_at + self.stale_after
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<V> {
    pub value: V,
    pub needs_refetch: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent<V> {
    Set(V),
    Updated(V),
    Invalidated,
    Removed,
}

type Listener<V> = dyn Fn(&CacheEvent<V>);

/// Listener handle returned by [`EntityCache::subscribe`].
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription<V> {
    _listener: Rc<Listener<V>>,
}

impl<V> Subscription<V> {
    pub fn unsubscribe(self) {}
}

/// A notification waiting to be delivered outside the owner's borrow.
pub struct Delivery<V> {
    listeners: Vec<Rc<Listener<V>>>,
    event: CacheEvent<V>,
}

impl<V> Delivery<V> {
    pub fn deliver(self) {
        for listener in &self.listeners {
            listener(&self.event);
        }
    }
}

pub struct EntityCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    listeners: HashMap<K, Vec<Weak<Listener<V>>>>,
    deferred: Option<Vec<Delivery<V>>>,
    stale_after: Duration,
    clock: SharedClock,
}

impl<K, V> EntityCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(clock: SharedClock, stale_after: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            listeners: HashMap::new(),
            deferred: None,
            stale_after,
            clock,
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn get(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn lookup(&self, key: &K) -> Option<Lookup<V>> {
        let now = self.clock.now();
        self.entries.get(key).map(|entry| Lookup {
            value: entry.value.clone(),
            needs_refetch: entry.is_stale_at(now),
        })
    }

    pub fn is_stale(&self, key: &K) -> bool {
        let now = self.clock.now();
        self.entries
            .get(key)
            .is_some_and(|entry| entry.is_stale_at(now))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, key: K, value: V) {
        let entry = CacheEntry::new(value.clone(), self.clock.now(), self.stale_after);
        self.entries.insert(key.clone(), entry);
        self.notify(&key, CacheEvent::Set(value));
    }

    /// Reinstates an entry exactly as it was captured, freshness included.
    pub fn restore(&mut self, key: K, entry: CacheEntry<V>) {
        let value = entry.value.clone();
        self.entries.insert(key.clone(), entry);
        self.notify(&key, CacheEvent::Set(value));
    }

    /// Applies `transform` to an existing value. Absent keys are left absent.
    pub fn update(&mut self, key: &K, transform: impl FnOnce(&V) -> V) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.value = transform(&entry.value);
        let value = entry.value.clone();
        self.notify(key, CacheEvent::Updated(value));
        true
    }

    /// Marks the entry stale without touching its value.
    pub fn invalidate(&mut self, key: &K) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.invalidated = true;
        self.notify(key, CacheEvent::Invalidated);
        true
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key)?;
        self.notify(key, CacheEvent::Removed);
        Some(removed.value)
    }

    /// Drops entries written at least `unused_for` ago that have no live
    /// subscriber, unless `keep` claims them. Returns the evicted keys.
    pub fn evict_unused(&mut self, unused_for: Duration, keep: impl Fn(&K) -> bool) -> Vec<K> {
        let now = self.clock.now();
        let evicted: Vec<K> = self
            .entries
            .iter()
            .filter(|(key, entry)| {
                now >= entry.fetched_at + unused_for && self.subscriber_count(key) == 0 && !keep(key)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &evicted {
            self.entries.remove(key);
            self.listeners.remove(key);
        }
        evicted
    }

    pub fn subscribe(&mut self, key: K, listener: impl Fn(&CacheEvent<V>) + 'static) -> Subscription<V>
    where
        V: 'static,
    {
        let listener: Rc<Listener<V>> = Rc::new(listener);
        self.listeners
            .entry(key)
            .or_default()
            .push(Rc::downgrade(&listener));
        Subscription {
            _listener: listener,
        }
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.listeners
            .get(key)
            .map_or(0, |listeners| listeners.iter().filter(|weak| weak.strong_count() > 0).count())
    }

    /// Queue notifications instead of running listeners inline.
    pub fn defer_notifications(&mut self) {
        if self.deferred.is_none() {
            self.deferred = Some(Vec::new());
        }
    }

    /// Stop queueing and hand back everything queued so far.
    pub fn take_deferred(&mut self) -> Vec<Delivery<V>> {
        self.deferred.take().unwrap_or_default()
    }

    fn notify(&mut self, key: &K, event: CacheEvent<V>) {
        let Some(registered) = self.listeners.get_mut(key) else {
            return;
        };
        registered.retain(|weak| weak.strong_count() > 0);
        let listeners: Vec<Rc<Listener<V>>> = registered.iter().filter_map(Weak::upgrade).collect();
        if listeners.is_empty() {
            self.listeners.remove(key);
            return;
        }

        let delivery = Delivery { listeners, event };
        match self.deferred.as_mut() {
            Some(queue) => queue.push(delivery),
            None => delivery.deliver(),
        }
    }
}
