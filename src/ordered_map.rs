//! Insertion ordered map backed by a list of `(key, value)` tuples.
//!
//! The tuple list is the source of truth. Every assignment appends a new tuple, so a key
//! that is assigned twice shows up twice in [`OrderedMap::keys`] until one of the tuples
//! is removed. Single key reads go through a lookup index built lazily from the tuple list;
//! it resolves each key to its *last* tuple, while [`OrderedMap::remove`] drops the *first*.

mod lookup_index;

use std::{
    borrow::Borrow,
    cell::RefCell,
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    rc::Rc,
};

use nohash_hasher::BuildNoHashHasher;

use crate::error::{Error, Result};

use self::lookup_index::LookupIndex;

pub struct OrderedMap<K, V, S = RandomState> {
    sequence: Vec<(Rc<K>, V)>,
    index: RefCell<LookupIndex<K, S>>,
}

/// Ordered map for integer keys, hashed with the identity hasher.
pub type IntOrderedMap<K, V> = OrderedMap<K, V, BuildNoHashHasher<K>>;

impl<K, V, S> OrderedMap<K, V, S> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sequence: Vec::with_capacity(capacity),
            index: RefCell::new(LookupIndex::Invalid),
        }
    }

    /// Number of tuples, counting every duplicate assignment.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (&K, &V)> {
        self.sequence.iter().map(|(k, v)| (&**k, v))
    }

    pub fn keys(&self) -> impl '_ + Iterator<Item = &K> {
        self.sequence.iter().map(|(k, _)| &**k)
    }

    pub fn values(&self) -> impl '_ + Iterator<Item = &V> {
        self.sequence.iter().map(|(_, v)| v)
    }

    pub fn for_each_pair(&self, mut visitor: impl FnMut(&K, &V)) {
        self.iter().for_each(|(k, v)| visitor(k, v));
    }

    pub fn for_each_key(&self, visitor: impl FnMut(&K)) {
        self.keys().for_each(visitor);
    }

    pub fn for_each_value(&self, visitor: impl FnMut(&V)) {
        self.values().for_each(visitor);
    }

    pub(crate) fn shared_pairs(&self) -> impl '_ + Iterator<Item = (&Rc<K>, &V)> {
        self.sequence.iter().map(|(k, v)| (k, v))
    }

    /// Replaces every tuple with the tuples of `other`, in `other`'s order.
    pub fn replace_with(&mut self, other: Self) {
        log::trace!(
            "replacing {} tuples with {}",
            self.sequence.len(),
            other.sequence.len()
        );
        self.sequence = other.sequence;
        self.index.get_mut().invalidate();
    }

    pub fn reversed(&self) -> Self
    where
        V: Clone,
    {
        Self {
            sequence: self.sequence.iter().rev().cloned().collect(),
            index: RefCell::new(LookupIndex::Invalid),
        }
    }
}

impl<K, V, S> OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    pub fn from_pairs(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let pairs = pairs.into_iter();
        let mut map = Self::with_capacity(pairs.size_hint().0);
        for (key, value) in pairs {
            map.assign(key, value);
        }
        map
    }

    /// Appends `(key, value)`. A valid lookup index is patched instead of rebuilt.
    pub fn assign(&mut self, key: K, value: V) {
        self.assign_shared(Rc::new(key), value);
    }

    pub(crate) fn assign_shared(&mut self, key: Rc<K>, value: V) {
        self.index.get_mut().record(&key, self.sequence.len());
        self.sequence.push((key, value));
    }

    fn position<Q: ?Sized>(&self, key: &Q) -> Option<usize>
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.index.borrow_mut().position(&self.sequence, key)
    }

    pub fn lookup<Q: ?Sized>(&self, key: &Q) -> Option<&V>
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let position = self.position(key)?;
        self.sequence.get(position).map(|(_, v)| v)
    }

    pub fn fetch<Q: ?Sized>(&self, key: &Q) -> Result<&V>
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.lookup(key).ok_or(Error::NotFound)
    }

    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> bool
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        self.position(key).is_some()
    }

    /// Removes the first tuple for `key` and returns its value.
    ///
    /// When `key` was assigned more than once, the later tuples survive and
    /// [`lookup`](Self::lookup) keeps returning the last of them.
    pub fn remove<Q: ?Sized>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq,
    {
        let position = self
            .sequence
            .iter()
            .position(|(k, _)| Borrow::<Q>::borrow(&**k) == key)?;
        let (removed, value) = self.sequence.remove(position);
        self.index.get_mut().forget_position(&removed, position);
        Some(value)
    }

    // Drops every tuple for which `doomed` holds, given the tuple's position before filtering.
    // The index stays invalid while `doomed` runs, so a panicking predicate leaves a
    // consistent map behind.
    pub(crate) fn filter_positions(
        &mut self,
        mut doomed: impl FnMut(usize, &K, &V) -> bool,
    ) -> usize {
        let before = self.sequence.len();
        let index = self.index.get_mut();
        let was_valid = index.is_valid();
        index.invalidate();

        let mut position = 0;
        self.sequence.retain(|(key, value)| {
            let keep = !doomed(position, &**key, value);
            position += 1;
            keep
        });

        if was_valid {
            self.index.get_mut().rebuild(&self.sequence);
        }
        before - self.sequence.len()
    }

    /// Removes every tuple matching `predicate`, returning how many were removed.
    pub fn remove_if(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) -> usize {
        self.filter_positions(|_, key, value| predicate(key, value))
    }

    /// Same filter as [`remove_if`](Self::remove_if); returns whether anything was removed.
    pub fn retain_except(&mut self, predicate: impl FnMut(&K, &V) -> bool) -> bool {
        self.remove_if(predicate) > 0
    }

    pub fn rejected(&self, predicate: impl FnMut(&K, &V) -> bool) -> Self
    where
        V: Clone,
    {
        let mut copy = self.clone();
        copy.remove_if(predicate);
        copy
    }

    pub fn clear(&mut self) {
        self.sequence.clear();
        self.index.get_mut().clear();
    }

    /// Removes and returns the first tuple.
    ///
    /// This shifts every remaining tuple (and every cached position), so it costs O(n);
    /// draining a whole map this way is quadratic.
    pub fn pop_front(&mut self) -> Result<(K, V)>
    where
        K: Clone,
    {
        if self.sequence.is_empty() {
            return Err(Error::EmptyContainer);
        }

        let (key, value) = self.sequence.remove(0);
        self.index.get_mut().forget_position(&key, 0);
        Ok((Rc::unwrap_or_clone(key), value))
    }

    pub fn merge_from(&mut self, other: &Self)
    where
        V: Clone,
    {
        self.sequence.reserve(other.sequence.len());
        for (key, value) in &other.sequence {
            self.assign_shared(Rc::clone(key), value.clone());
        }
    }

    pub fn merge_copy(&self, other: &Self) -> Self
    where
        V: Clone,
    {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }
}

impl<T, S> OrderedMap<T, T, S>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Builds a map from an alternating `key, value, key, value, ...` list.
    pub fn from_flat(items: impl IntoIterator<Item = T>) -> Result<Self> {
        let items: Vec<T> = items.into_iter().collect();
        if items.len() % 2 != 0 {
            return Err(Error::InvalidArgumentCount(items.len()));
        }

        let mut map = Self::with_capacity(items.len() / 2);
        let mut items = items.into_iter();
        while let (Some(key), Some(value)) = (items.next(), items.next()) {
            map.assign(key, value);
        }
        Ok(map)
    }
}

// The copy shares keys with the original but never its lookup index.
impl<K, V, S> Clone for OrderedMap<K, V, S>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            sequence: self.sequence.clone(),
            index: RefCell::new(LookupIndex::Invalid),
        }
    }
}

impl<K, V, S> Default for OrderedMap<K, V, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> PartialEq for OrderedMap<K, V, S>
where
    K: PartialEq,
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl<K: Eq, V: Eq, S> Eq for OrderedMap<K, V, S> {}

impl<K, V, S> fmt::Debug for OrderedMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> FromIterator<(K, V)> for OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl<K, V, S> Extend<(K, V)> for OrderedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.assign(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use crate::error::Error;

    use super::{IntOrderedMap, OrderedMap};

    fn map(pairs: &[(&'static str, i32)]) -> OrderedMap<&'static str, i32> {
        pairs.iter().copied().collect()
    }

    fn keys(map: &OrderedMap<&'static str, i32>) -> Vec<&'static str> {
        map.keys().copied().collect()
    }

    #[test]
    fn test_keys_in_assignment_order() {
        let map = map(&[("c", 1), ("a", 2), ("b", 3)]);

        assert_eq!(keys(&map), vec!["c", "a", "b"]);
        assert_eq!(map.values().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_reassignment_appends_and_lookup_sees_last() {
        let map = map(&[("a", 1), ("b", 2), ("a", 3)]);

        assert_eq!(map.lookup(&"a"), Some(&3));
        assert_eq!(keys(&map), vec!["a", "b", "a"]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_assign_patches_valid_index() {
        let mut map = map(&[("a", 1)]);
        assert_eq!(map.lookup(&"a"), Some(&1));
        assert!(map.index.borrow().is_valid());

        map.assign("a", 2);
        map.assign("b", 3);

        assert!(map.index.borrow().is_valid());
        assert_eq!(map.lookup(&"a"), Some(&2));
        assert_eq!(map.lookup(&"b"), Some(&3));
    }

    #[test]
    fn test_remove_drops_first_occurrence() {
        let mut map = map(&[("k", 1), ("x", 0), ("k", 2)]);

        assert_eq!(map.remove(&"k"), Some(1));
        assert_eq!(map.lookup(&"k"), Some(&2));
        assert_eq!(keys(&map), vec!["x", "k"]);
    }

    #[test]
    fn test_remove_with_valid_index_keeps_later_duplicate() {
        let mut map = map(&[("k", 1), ("x", 0), ("k", 2)]);
        assert_eq!(map.lookup(&"k"), Some(&2));

        assert_eq!(map.remove(&"k"), Some(1));
        assert_eq!(map.lookup(&"k"), Some(&2));
        assert_eq!(map.lookup(&"x"), Some(&0));

        assert_eq!(map.remove(&"k"), Some(2));
        assert_eq!(map.lookup(&"k"), None);
        assert!(map.index.borrow().is_valid());
    }

    #[test]
    fn test_remove_missing() {
        let mut map = map(&[("a", 1)]);

        assert_eq!(map.remove(&"z"), None);
        assert_eq!(map.lookup(&"z"), None);
        assert_eq!(map.fetch(&"z"), Err(Error::NotFound));
        assert_eq!(map.fetch(&"a"), Ok(&1));
    }

    #[test]
    fn test_remove_if_keeps_index_valid() {
        let mut map = map(&[("a", 1), ("b", 2), ("c", 3), ("b", 4)]);
        assert_eq!(map.lookup(&"c"), Some(&3));

        assert_eq!(map.remove_if(|_, v| v % 2 == 0), 2);

        assert!(map.index.borrow().is_valid());
        assert_eq!(keys(&map), vec!["a", "c"]);
        assert_eq!(map.lookup(&"b"), None);
        assert_eq!(map.lookup(&"c"), Some(&3));
    }

    #[test]
    fn test_remove_if_exposes_earlier_duplicate() {
        let mut map = map(&[("a", 1), ("a", 2)]);
        assert_eq!(map.lookup(&"a"), Some(&2));

        map.remove_if(|_, v| *v == 2);

        assert_eq!(map.lookup(&"a"), Some(&1));
    }

    #[test]
    fn test_panicking_predicate_keeps_unvisited_tuples() {
        let mut map: OrderedMap<i32, i32> = [(1, 1), (2, 2), (3, 3)].into_iter().collect();
        assert_eq!(map.lookup(&1), Some(&1));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            map.remove_if(|k, _| match k {
                1 => true,
                3 => panic!("predicate failed"),
                _ => false,
            })
        }));

        assert!(result.is_err());
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(map.lookup(&1), None);
        assert_eq!(map.lookup(&2), Some(&2));
        assert_eq!(map.lookup(&3), Some(&3));
    }

    #[test]
    fn test_mutations_before_first_lookup() {
        let mut map = map(&[("a", 1), ("b", 2), ("a", 3), ("c", 4)]);

        assert_eq!(map.pop_front(), Ok(("a", 1)));
        assert_eq!(map.remove_if(|k, _| *k == "c"), 1);
        assert_eq!(map.remove(&"b"), Some(2));
        assert!(!map.index.borrow().is_valid());

        assert_eq!(map.lookup(&"a"), Some(&3));
        assert_eq!(map.lookup(&"b"), None);
        assert_eq!(map.lookup(&"c"), None);
    }

    #[test]
    fn test_retain_except_reports_change() {
        let mut map = map(&[("a", 1), ("b", 2)]);

        assert!(!map.retain_except(|k, _| *k == "z"));
        assert!(map.retain_except(|k, _| *k == "a"));
        assert_eq!(keys(&map), vec!["b"]);
    }

    #[test]
    fn test_rejected_leaves_original() {
        let map = map(&[("a", 1), ("b", 2)]);

        let copy = map.rejected(|k, _| *k == "a");

        assert_eq!(keys(&copy), vec!["b"]);
        assert_eq!(keys(&map), vec!["a", "b"]);
    }

    #[test]
    fn test_clear() {
        let mut map = map(&[("a", 1), ("b", 2)]);
        map.lookup(&"a");

        map.clear();

        assert!(map.is_empty());
        assert_eq!(map.lookup(&"a"), None);
        map.assign("c", 3);
        assert_eq!(map.lookup(&"c"), Some(&3));
    }

    #[test]
    fn test_pop_front() {
        let mut map = map(&[("a", 1), ("b", 2), ("a", 3)]);
        map.lookup(&"a");

        assert_eq!(map.pop_front(), Ok(("a", 1)));
        assert_eq!(map.lookup(&"a"), Some(&3));
        assert_eq!(map.pop_front(), Ok(("b", 2)));
        assert_eq!(map.lookup(&"b"), None);
        assert_eq!(map.pop_front(), Ok(("a", 3)));
        assert_eq!(map.pop_front(), Err(Error::EmptyContainer));
    }

    #[test]
    fn test_pop_front_empty() {
        let mut map: OrderedMap<&str, i32> = OrderedMap::new();

        assert_eq!(map.pop_front(), Err(Error::EmptyContainer));
    }

    #[test]
    fn test_merge_from_appends_in_other_order() {
        let mut left = map(&[("a", 1), ("b", 2)]);
        let right = map(&[("c", 3), ("a", 4)]);

        left.merge_from(&right);

        assert_eq!(keys(&left), vec!["a", "b", "c", "a"]);
        assert_eq!(left.lookup(&"a"), Some(&4));
        assert_eq!(keys(&right), vec!["c", "a"]);
    }

    #[test]
    fn test_merge_copy_leaves_self() {
        let left = map(&[("a", 1)]);
        let right = map(&[("a", 2)]);

        let merged = left.merge_copy(&right);

        assert_eq!(merged.lookup(&"a"), Some(&2));
        assert_eq!(left.lookup(&"a"), Some(&1));
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn test_replace_with_takes_other_order() {
        let mut replaced = map(&[("a", 1), ("b", 2), ("c", 3)]);
        replaced.lookup(&"a");

        replaced.replace_with(map(&[("c", 30), ("z", 0), ("a", 10)]));

        assert!(!replaced.index.borrow().is_valid());
        assert_eq!(keys(&replaced), vec!["c", "z", "a"]);
        assert_eq!(replaced.lookup(&"b"), None);
        assert_eq!(replaced.lookup(&"a"), Some(&10));
    }

    #[test]
    fn test_reversed() {
        let map: OrderedMap<i32, &str> = [(1, "a"), (2, "b"), (3, "c")].into_iter().collect();

        let reversed = map.reversed();

        assert_eq!(
            reversed.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(3, "c"), (2, "b"), (1, "a")]
        );
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = map(&[("a", 1)]);
        original.lookup(&"a");

        let mut copy = original.clone();
        assert!(!copy.index.borrow().is_valid());

        copy.assign("a", 2);
        original.assign("b", 3);

        assert_eq!(copy.lookup(&"a"), Some(&2));
        assert_eq!(copy.lookup(&"b"), None);
        assert_eq!(original.lookup(&"a"), Some(&1));
        assert_eq!(original.lookup(&"b"), Some(&3));
    }

    #[test]
    fn test_from_flat() {
        let map: OrderedMap<&str, &str> = OrderedMap::from_flat(["x", "1", "y", "2"]).unwrap();

        assert_eq!(map.lookup(&"x"), Some(&"1"));
        assert_eq!(map.lookup(&"y"), Some(&"2"));
    }

    #[test]
    fn test_from_flat_odd_count() {
        let result: Result<OrderedMap<&str, &str>, Error> = OrderedMap::from_flat(["x", "1", "y"]);

        assert_eq!(result.err(), Some(Error::InvalidArgumentCount(3)));
    }

    #[test]
    fn test_for_each_visits_in_order() {
        let map = map(&[("a", 1), ("b", 2)]);
        let mut pairs = Vec::new();
        let mut seen_keys = Vec::new();
        let mut total = 0;

        map.for_each_pair(|k, v| pairs.push((*k, *v)));
        map.for_each_key(|k| seen_keys.push(*k));
        map.for_each_value(|v| total += v);

        assert_eq!(pairs, vec![("a", 1), ("b", 2)]);
        assert_eq!(seen_keys, vec!["a", "b"]);
        assert_eq!(total, 3);
    }

    #[test]
    fn test_int_keys_use_identity_hash() {
        let mut map: IntOrderedMap<u64, &str> = IntOrderedMap::new();
        map.assign(42, "a");
        map.assign(7, "b");

        assert_eq!(map.lookup(&42), Some(&"a"));
        assert!(map.contains_key(&7));
        assert!(!map.contains_key(&8));
    }

    #[test]
    fn test_debug_shows_raw_tuples() {
        let map = map(&[("a", 1), ("a", 2)]);

        assert_eq!(format!("{map:?}"), r#"{"a": 1, "a": 2}"#);
    }
}
