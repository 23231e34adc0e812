use std::{borrow::Cow, collections::HashSet, fmt::Display, hash::BuildHasherDefault, sync::Arc};

use nohash_hasher::IntMap;
use rayon::prelude::*;

use crate::hash::Variant;

/// A string together with the state reached by hashing it.
/// Cloning a candidate doesn't copy its text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    text: Arc<[u8]>,
    hash: u64,
}

impl Candidate {
    /// Creates a new candidate.
    pub fn new(text: impl Into<Arc<[u8]>>, hash: u64) -> Self {
        Self {
            text: text.into(),
            hash,
        }
    }

    /// Returns the text of the candidate.
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Returns the state associated to the text.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Returns the text, with invalid UTF-8 replaced.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

impl Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text_lossy())
    }
}

/// How a table consumes its search space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Segments are hashed in order with the loop stage, from a seed.
    Forward,
    /// Segments are un-hashed in reverse order with the inverse loop stage, from a target
    /// state whose final stage was already removed.
    Backward,
}

/// A table mapping hash states to every candidate reaching them.
///
/// For a forward table, the loop stage takes the start state to a candidate's hash when fed
/// its text. For a backward table, it takes the candidate's hash to the start state.
#[derive(Clone, Debug)]
pub struct Table {
    /// Hash states are evenly distributed, so they don't need to be hashed again.
    entries: IntMap<u64, Vec<Candidate>>,
    /// Every candidate of the table, to drop duplicates without scanning a bucket.
    seen: HashSet<Candidate>,
    start_state: u64,
    direction: Direction,
    complete: bool,
}

impl Table {
    /// Creates an empty table.
    pub fn new(start_state: u64, direction: Direction) -> Self {
        Self::with_capacity(start_state, direction, 0)
    }

    /// Creates an empty table with room for `capacity` candidates.
    pub fn with_capacity(start_state: u64, direction: Direction, capacity: usize) -> Self {
        Self {
            entries: IntMap::with_capacity_and_hasher(capacity, BuildHasherDefault::default()),
            seen: HashSet::with_capacity(capacity),
            start_state,
            direction,
            complete: true,
        }
    }

    /// Inserts a candidate.
    /// Returns false if the very same candidate was already present.
    #[inline]
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if !self.seen.insert(candidate.clone()) {
            return false;
        }

        self.entries.entry(candidate.hash).or_default().push(candidate);
        true
    }

    /// Returns all the candidates reaching the given state.
    #[inline]
    pub fn get(&self, hash: u64) -> &[Candidate] {
        self.entries.get(&hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns true if at least one candidate reaches the given state.
    pub fn contains_key(&self, hash: u64) -> bool {
        self.entries.contains_key(&hash)
    }

    /// Returns the number of candidates stored in the table.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns the number of distinct states.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of states reached by more than one candidate.
    pub fn collisions(&self) -> usize {
        self.entries.values().filter(|bucket| bucket.len() > 1).count()
    }

    /// Returns an iterator over the distinct states.
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    /// Returns an iterator over the states and the candidates reaching them.
    /// The states are not returned in a particular order.
    pub fn buckets(&self) -> impl Iterator<Item = (u64, &[Candidate])> + '_ {
        self.entries
            .iter()
            .map(|(&hash, bucket)| (hash, bucket.as_slice()))
    }

    /// Parallel version of [`Table::buckets`].
    pub fn par_buckets(&self) -> impl ParallelIterator<Item = (u64, &[Candidate])> + '_ {
        self.entries
            .par_iter()
            .map(|(&hash, bucket)| (hash, bucket.as_slice()))
    }

    /// Returns an iterator over all the candidates.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.entries.values().flatten()
    }

    /// Returns the state the table was built from.
    pub fn start_state(&self) -> u64 {
        self.start_state
    }

    /// Returns the direction the table was built in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns false if the construction stopped before the whole search space was covered.
    /// The candidates of an incomplete table are still valid.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn mark_incomplete(&mut self) {
        self.complete = false;
    }

    /// Moves all the candidates of `other` into this table.
    pub fn merge(&mut self, mut other: Table) {
        debug_assert_eq!(self.direction, other.direction);
        debug_assert_eq!(self.start_state, other.start_state);

        // insert the smallest table into the biggest one
        if other.len() > self.len() {
            std::mem::swap(self, &mut other);
        }

        for candidate in other.entries.into_values().flatten() {
            self.insert(candidate);
        }
        self.complete &= other.complete;
    }

    /// Recomputes the state of every candidate and checks it against the table.
    pub fn verify(&self, variant: &Variant) -> bool {
        if variant.check(self.start_state).is_err() {
            return false;
        }

        self.buckets().all(|(hash, bucket)| {
            bucket.iter().all(|candidate| {
                candidate.hash == hash
                    && match self.direction {
                        Direction::Forward => {
                            variant.extend(self.start_state, &candidate.text) == hash
                        }
                        Direction::Backward => {
                            variant.extend(hash, &candidate.text) == self.start_state
                        }
                    }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::hash::Preset;

    fn forward(texts: &[&str]) -> Table {
        let variant = Preset::OneAtATime32.variant();
        let mut table = Table::new(0, Direction::Forward);
        for text in texts {
            table.insert(Candidate::new(
                text.as_bytes(),
                variant.extend(0, text.as_bytes()),
            ));
        }
        table
    }

    #[test]
    fn test_collisions_are_kept() {
        let table = forward(&["aqaa", "elue", "foo"]);

        assert_eq!(3, table.len());
        assert_eq!(2, table.key_count());
        assert_eq!(1, table.collisions());

        let texts = table
            .get(0x7E204D41)
            .iter()
            .map(|candidate| candidate.text_lossy().into_owned())
            .sorted()
            .collect_vec();
        assert_eq!(vec!["aqaa", "elue"], texts);
    }

    #[test]
    fn test_duplicates_are_stored_once() {
        let mut table = forward(&["foo"]);
        let duplicate = table.iter().next().unwrap().clone();

        assert!(!table.insert(duplicate));
        assert_eq!(1, table.len());
    }

    #[test]
    fn test_missing_key() {
        let table = forward(&["foo"]);
        assert!(table.get(0xDEAD).is_empty());
        assert!(!table.contains_key(0xDEAD));
    }

    #[test]
    fn test_merge() {
        let mut a = forward(&["foo", "bar", "aqaa"]);
        let mut b = forward(&["bar", "baz", "elue"]);
        b.mark_incomplete();
        a.merge(b);

        assert_eq!(5, a.len());
        assert_eq!(4, a.key_count());
        assert_eq!(1, a.collisions());
        assert!(!a.is_complete());
        assert_eq!(a.len(), a.iter().count());
    }

    #[test]
    fn test_large_bucket() {
        let mut table = Table::new(0, Direction::Forward);
        for i in 0..100_000u32 {
            assert!(table.insert(Candidate::new(i.to_le_bytes().as_slice(), 0)));
        }
        assert!(!table.insert(Candidate::new(7u32.to_le_bytes().as_slice(), 0)));

        assert_eq!(100_000, table.len());
        assert_eq!(1, table.key_count());
        assert_eq!(100_000, table.get(0).len());
    }

    #[test]
    fn test_merge_large_buckets() {
        let bucket = |range: std::ops::Range<u32>| {
            let mut table = Table::new(0, Direction::Forward);
            for i in range {
                table.insert(Candidate::new(i.to_le_bytes().as_slice(), u64::from(i % 2)));
            }
            table
        };

        let mut a = bucket(0..60_000);
        a.merge(bucket(40_000..100_000));

        assert_eq!(100_000, a.len());
        assert_eq!(2, a.key_count());
        assert_eq!(50_000, a.get(1).len());
        assert!(a.is_complete());
    }

    #[test]
    fn test_verify() {
        let variant = Preset::OneAtATime32.variant();
        let mut table = forward(&["foo", "bar"]);
        assert!(table.verify(&variant));

        table.insert(Candidate::new(b"baz".as_slice(), 42));
        assert!(!table.verify(&variant));
    }
}
