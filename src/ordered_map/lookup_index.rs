use std::{
    borrow::Borrow,
    collections::HashMap,
    hash::{BuildHasher, Hash},
    rc::Rc,
};

/// Position of the last tuple for every distinct key of the owning sequence.
pub(super) enum LookupIndex<K, S> {
    Valid(HashMap<Rc<K>, usize, S>),
    Invalid,
}

impl<K, S> LookupIndex<K, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn build<V>(sequence: &[(Rc<K>, V)]) -> HashMap<Rc<K>, usize, S> {
        let mut index = HashMap::with_capacity_and_hasher(sequence.len(), S::default());
        for (position, (key, _)) in sequence.iter().enumerate() {
            index.insert(Rc::clone(key), position);
        }
        index
    }

    pub(super) fn position<V, Q: ?Sized>(
        &mut self,
        sequence: &[(Rc<K>, V)],
        key: &Q,
    ) -> Option<usize>
    where
        Rc<K>: Borrow<Q>,
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        if let Self::Invalid = self {
            self.rebuild(sequence);
        }

        match self {
            Self::Valid(index) => index.get(key).copied(),
            Self::Invalid => None,
        }
    }

    pub(super) fn record(&mut self, key: &Rc<K>, position: usize) {
        if let Self::Valid(index) = self {
            index.insert(Rc::clone(key), position);
        }
    }

    // The tuple that was at `removed` is gone and every later tuple moved down by one.
    pub(super) fn forget_position(&mut self, key: &K, removed: usize) {
        let Self::Valid(index) = self else {
            return;
        };

        match index.get(key).copied() {
            Some(last) if last == removed => {
                index.remove(key);
            }
            Some(last) => {
                log::debug!("removed shadowed tuple at {removed}, key still resolves to {last}");
            }
            None => {}
        }

        for position in index.values_mut() {
            if *position > removed {
                *position -= 1;
            }
        }
    }

    pub(super) fn clear(&mut self) {
        if let Self::Valid(index) = self {
            index.clear();
        }
    }

    pub(super) fn rebuild<V>(&mut self, sequence: &[(Rc<K>, V)]) {
        log::trace!("rebuilding lookup index over {} tuples", sequence.len());
        *self = Self::Valid(Self::build(sequence));
    }
}

impl<K, S> LookupIndex<K, S> {
    pub(super) fn invalidate(&mut self) {
        *self = Self::Invalid;
    }

    pub(super) fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}
