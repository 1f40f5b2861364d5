use std::{
    borrow::Borrow,
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    rc::Rc,
};

use crate::{error::Result, ordered_map::OrderedMap};

/// An [`OrderedMap`] that remembers the timestamp each key was last assigned with.
///
/// The timestamp store holds one tuple per value tuple, at the same position and with the
/// same key, so filtering and positional removal can be applied to both stores alike.
pub struct TimestampedOrderedMap<K, V, T, S = RandomState> {
    store: OrderedMap<K, V, S>,
    timestamps: OrderedMap<K, Option<T>, S>,
}

impl<K, V, T, S> TimestampedOrderedMap<K, V, T, S> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: OrderedMap::with_capacity(capacity),
            timestamps: OrderedMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (&K, &V)> {
        self.store.iter()
    }

    pub fn keys(&self) -> impl '_ + Iterator<Item = &K> {
        self.store.keys()
    }

    pub fn values(&self) -> impl '_ + Iterator<Item = &V> {
        self.store.values()
    }

    pub fn for_each_pair(&self, visitor: impl FnMut(&K, &V)) {
        self.store.for_each_pair(visitor);
    }

    pub fn for_each_key(&self, visitor: impl FnMut(&K)) {
        self.store.for_each_key(visitor);
    }

    pub fn for_each_value(&self, visitor: impl FnMut(&V)) {
        self.store.for_each_value(visitor);
    }

    /// Copy of the timestamp bookkeeping, detached from this map.
    pub fn timestamps(&self) -> OrderedMap<K, Option<T>, S>
    where
        T: Clone,
    {
        self.timestamps.clone()
    }

    pub fn replace_with(&mut self, other: Self) {
        self.timestamps.replace_with(other.timestamps);
        self.store.replace_with(other.store);
    }

    pub fn reversed(&self) -> Self
    where
        V: Clone,
        T: Clone,
    {
        Self {
            store: self.store.reversed(),
            timestamps: self.timestamps.reversed(),
        }
    }
}

impl<K, V, T, S> TimestampedOrderedMap<K, V, T, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Records `timestamp` for `key`, then appends `(key, value)` to the value store.
    pub fn assign(&mut self, key: K, value: V, timestamp: Option<T>) {
        self.assign_shared(Rc::new(key), value, timestamp);
    }

    fn assign_shared(&mut self, key: Rc<K>, value: V, timestamp: Option<T>) {
        self.timestamps.assign_shared(Rc::clone(&key), timestamp);
        self.store.assign_shared(key, value);
    }

    pub fn lookup<Q: ?Sized>(&self, key: &Q) -> Option<&V>
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.store.lookup(key)
    }

    pub fn fetch<Q: ?Sized>(&self, key: &Q) -> Result<&V>
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.store.fetch(key)
    }

    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> bool
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.store.contains_key(key)
    }

    pub fn timestamp_of<Q: ?Sized>(&self, key: &Q) -> Option<&T>
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.timestamps.lookup(key)?.as_ref()
    }

    pub fn remove<Q: ?Sized>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq,
    {
        self.timestamps.remove(key);
        self.store.remove(key)
    }

    /// Removes every entry whose key and *value* match `predicate`, from both stores.
    pub fn remove_if(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) -> usize {
        let doomed: Vec<bool> = self.store.iter().map(|(k, v)| predicate(k, v)).collect();
        let is_doomed = |position: usize| doomed.get(position).copied().unwrap_or(false);

        self.timestamps
            .filter_positions(|position, _, _| is_doomed(position));
        self.store
            .filter_positions(|position, _, _| is_doomed(position))
    }

    pub fn retain_except(&mut self, predicate: impl FnMut(&K, &V) -> bool) -> bool {
        self.remove_if(predicate) > 0
    }

    pub fn rejected(&self, predicate: impl FnMut(&K, &V) -> bool) -> Self
    where
        V: Clone,
        T: Clone,
    {
        let mut copy = self.clone();
        copy.remove_if(predicate);
        copy
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
        self.store.clear();
    }

    pub fn pop_front(&mut self) -> Result<(K, V)>
    where
        K: Clone,
    {
        let (key, value) = self.store.pop_front()?;
        self.timestamps.remove(&key);
        Ok((key, value))
    }

    /// Appends every entry of `other`, carrying `other`'s timestamps along.
    pub fn merge_from(&mut self, other: &Self)
    where
        V: Clone,
        T: Clone,
    {
        let entries = other.store.shared_pairs().zip(other.timestamps.shared_pairs());
        for ((key, value), (_, timestamp)) in entries {
            self.assign_shared(Rc::clone(key), value.clone(), timestamp.clone());
        }
    }

    pub fn merge_copy(&self, other: &Self) -> Self
    where
        V: Clone,
        T: Clone,
    {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }

    /// Last-writer-wins merge: an entry of `other` is taken when this map has no entry for
    /// its key, or when its timestamp is not older than the current one. A missing
    /// timestamp is older than any present one.
    ///
    /// Returns the number of entries taken from `other`.
    pub fn merge_latest(&mut self, other: &Self) -> usize
    where
        V: Clone,
        T: Clone + Ord,
    {
        let mut assigned = 0;
        let mut skipped = 0;

        let entries = other.store.shared_pairs().zip(other.timestamps.shared_pairs());
        for ((key, value), (_, timestamp)) in entries {
            let newer = match self.timestamps.lookup(&**key) {
                Some(current) => timestamp >= current,
                None => true,
            };

            if newer {
                self.assign_shared(Rc::clone(key), value.clone(), timestamp.clone());
                assigned += 1;
            } else {
                log::trace!("keeping local entry, incoming timestamp is older");
                skipped += 1;
            }
        }

        log::debug!("merged {assigned} entries, kept {skipped} newer local entries");
        assigned
    }
}

impl<K, V, T, S> Clone for TimestampedOrderedMap<K, V, T, S>
where
    V: Clone,
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            timestamps: self.timestamps.clone(),
        }
    }
}

impl<K, V, T, S> Default for TimestampedOrderedMap<K, V, T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, T, S> fmt::Debug for TimestampedOrderedMap<K, V, T, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampedOrderedMap")
            .field("store", &self.store)
            .field("timestamps", &self.timestamps)
            .finish()
    }
}
