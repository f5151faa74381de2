use super::{KeyFn, Selected, Selection};
use crate::types::FitnessRecord;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Consecutive duplicates after which a distinct stream gives up
pub const DEFAULT_PATIENCE: usize = 10_000;

/// Keys already emitted, shareable between sibling selections
#[derive(Debug, Clone, Default)]
pub struct SeenSet(Arc<Mutex<HashSet<String>>>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if the key was not seen before
    pub fn insert(&self, key: String) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).insert(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).contains(key)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drops candidates whose key was already emitted, keeping first occurrences.
///
/// A `Distinct` built with `new` owns its seen-set and clears it on every
/// call. One built with `sharing` leaves clearing to an enclosing
/// `DistinctScope`, so siblings jointly emit disjoint keys.
pub struct Distinct<C, S> {
    source: S,
    key: KeyFn<C>,
    seen: SeenSet,
    owned: bool,
    patience: usize,
}

impl<C, S> Distinct<C, S> {
    pub fn new(source: S, key: KeyFn<C>) -> Self {
        Self {
            source,
            key,
            seen: SeenSet::new(),
            owned: true,
            patience: DEFAULT_PATIENCE,
        }
    }

    pub fn sharing(source: S, key: KeyFn<C>, seen: SeenSet) -> Self {
        Self {
            source,
            key,
            seen,
            owned: false,
            patience: DEFAULT_PATIENCE,
        }
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience.max(1);
        self
    }
}

impl<C, S> Selection<C> for Distinct<C, S>
where
    C: Send,
    S: Selection<C>,
{
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        if self.owned {
            self.seen.clear();
        }
        let Self {
            source,
            key,
            seen,
            patience,
            ..
        } = self;
        let patience = *patience;
        let key = &**key;
        let mut inner = source.select(records);
        let mut misses = 0;
        let stream = std::iter::from_fn(move || loop {
            match inner.next()? {
                Ok(candidate) => {
                    let k = key(&candidate);
                    if seen.insert(k.clone()) {
                        misses = 0;
                        return Some(Ok(candidate));
                    }
                    debug!("duplicate skipped: {}", k);
                    misses += 1;
                    if misses >= patience {
                        debug!("giving up after {} consecutive duplicates", patience);
                        return None;
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        });
        Box::new(stream.fuse())
    }
}

/// Clears a shared seen-set at the start of every call, then delegates
pub struct DistinctScope<S> {
    source: S,
    seen: SeenSet,
}

impl<S> DistinctScope<S> {
    pub fn new(seen: SeenSet, source: S) -> Self {
        Self { source, seen }
    }
}

impl<C, S: Selection<C>> Selection<C> for DistinctScope<S> {
    fn select<'a>(&'a mut self, records: &'a [FitnessRecord<C>]) -> Selected<'a, C> {
        self.seen.clear();
        self.source.select(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::selection::{Compound, Elite, Roulette, SelectionExt};

    #[test]
    fn test_patience_ends_an_endless_source() {
        let records = vec![FitnessRecord::new(1.0, 'a'), FitnessRecord::new(2.0, 'b')];
        let mut distinct = Roulette::new(3).distinct(|c: &char| c.to_string()).with_patience(50);
        let mut picks: Vec<char> = distinct.select(&records).map(Result::unwrap).collect();
        picks.sort_unstable();
        assert_eq!(picks, vec!['a', 'b']);
    }

    #[test]
    fn test_siblings_share_seen_keys() {
        let seen = SeenSet::new();
        let key = |c: &char| c.to_string();
        let records = vec![
            FitnessRecord::new(1.0, 'a'),
            FitnessRecord::new(2.0, 'b'),
            FitnessRecord::new(3.0, 'c'),
        ];
        let parts = vec![
            Distinct::sharing(Elite.limit(2), Box::new(key), seen.clone()).boxed(),
            Distinct::sharing(Elite, Box::new(key), seen.clone()).boxed(),
        ];
        let mut scoped = DistinctScope::new(seen.clone(), Compound::new(parts));

        for _ in 0..2 {
            let out: Vec<char> = scoped.select(&records).map(Result::unwrap).collect();
            assert_eq!(out, vec!['a', 'b', 'c']);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_owned_set_resets_each_call() {
        let records = vec![FitnessRecord::new(1.0, 'a')];
        let mut distinct = Elite.distinct(|c: &char| c.to_string());
        assert_eq!(distinct.select(&records).count(), 1);
        assert_eq!(distinct.select(&records).count(), 1);
    }
}
