use std::{
    cmp::Ordering as CmpOrdering,
    fmt::Display,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use rayon::prelude::*;
use tracing::{debug, debug_span};

use crate::{
    budget::Budget,
    table::{Candidate, Direction, Table},
};

/// A prefix and a suffix meeting at the same state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MatchResult {
    prefix: Candidate,
    suffix: Candidate,
}

impl MatchResult {
    /// Creates a new match.
    /// Both candidates are expected to share the same state.
    pub fn new(prefix: Candidate, suffix: Candidate) -> Self {
        debug_assert_eq!(prefix.hash(), suffix.hash());

        Self { prefix, suffix }
    }

    /// Returns the prefix candidate, from the forward table.
    pub fn prefix(&self) -> &Candidate {
        &self.prefix
    }

    /// Returns the suffix candidate, from the backward table.
    pub fn suffix(&self) -> &Candidate {
        &self.suffix
    }

    /// Returns the state where the prefix and the suffix meet.
    pub fn state(&self) -> u64 {
        self.prefix.hash()
    }

    /// Returns the full text of the match.
    pub fn text(&self) -> Vec<u8> {
        [self.prefix.text(), self.suffix.text()].concat()
    }

    /// Returns the full text, with invalid UTF-8 replaced.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text()).into_owned()
    }

    fn cmp_text(&self, other: &Self) -> CmpOrdering {
        self.prefix
            .text()
            .iter()
            .chain(self.suffix.text())
            .cmp(other.prefix.text().iter().chain(other.suffix.text()))
            .then_with(|| self.prefix.text().len().cmp(&other.prefix.text().len()))
    }
}

impl Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.suffix)
    }
}

/// The order of the matches returned by a join.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MatchOrder {
    /// No particular order. The fastest.
    #[default]
    Unordered,
    /// Sorted by full text, then by prefix length.
    Lexicographic,
}

/// The matches found by a join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchSet {
    matches: Vec<MatchResult>,
    complete: bool,
}

impl MatchSet {
    /// Returns the number of matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Returns true if no match was found.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Returns false if the join or one of the tables stopped early,
    /// in which case some matches may be missing.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Iterates over the matches, in the order of the join.
    pub fn iter(&self) -> std::slice::Iter<'_, MatchResult> {
        self.matches.iter()
    }

    /// Returns the matches as a slice.
    pub fn as_slice(&self) -> &[MatchResult] {
        &self.matches
    }

    /// Consumes the set and returns its matches.
    pub fn into_vec(self) -> Vec<MatchResult> {
        self.matches
    }
}

impl IntoIterator for MatchSet {
    type Item = MatchResult;
    type IntoIter = std::vec::IntoIter<MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a MatchResult;
    type IntoIter = std::slice::Iter<'a, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Joins a forward table and a backward table on their states.
#[derive(Clone, Debug)]
pub struct Matcher {
    order: MatchOrder,
    parallel: bool,
    budget: Budget,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            order: MatchOrder::default(),
            parallel: true,
            budget: Budget::default(),
        }
    }
}

impl Matcher {
    /// Creates a new matcher with the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the order of the returned matches.
    pub fn order(mut self, order: MatchOrder) -> Self {
        self.order = order;

        self
    }

    /// Partitions the join by state on the rayon thread pool.
    /// Enabled by default.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;

        self
    }

    /// Limits the number of emitted matches, or the time spent joining.
    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;

        self
    }

    /// Emits every pair of a prefix candidate and a suffix candidate sharing a state.
    ///
    /// The table with the fewest states is iterated and the other one is probed,
    /// but the roles of the candidates are always kept.
    pub fn join(&self, prefix: &Table, suffix: &Table) -> MatchSet {
        debug_assert_eq!(Direction::Forward, prefix.direction());
        debug_assert_eq!(Direction::Backward, suffix.direction());

        let small_is_prefix = prefix.key_count() <= suffix.key_count();
        let (small, large) = if small_is_prefix {
            (prefix, suffix)
        } else {
            (suffix, prefix)
        };

        let _span = debug_span!(
            "join",
            probes = small.key_count(),
            parallel = self.parallel
        )
        .entered();

        let emitted = AtomicUsize::new(0);
        let stopped = AtomicBool::new(false);
        let probe = |found: &mut Vec<MatchResult>, (hash, bucket): (u64, &[Candidate])| {
            if stopped.load(Ordering::Relaxed) {
                return;
            }

            for candidate in bucket {
                for other in large.get(hash) {
                    if !self.budget.allows(emitted.fetch_add(1, Ordering::Relaxed)) {
                        stopped.store(true, Ordering::Relaxed);
                        return;
                    }

                    let (prefix, suffix) = if small_is_prefix {
                        (candidate, other)
                    } else {
                        (other, candidate)
                    };
                    found.push(MatchResult::new(prefix.clone(), suffix.clone()));
                }
            }
        };

        let mut matches = if self.parallel {
            small
                .par_buckets()
                .fold(Vec::new, |mut found, bucket| {
                    probe(&mut found, bucket);
                    found
                })
                .reduce(Vec::new, |mut matches, mut found| {
                    matches.append(&mut found);
                    matches
                })
        } else {
            let mut found = Vec::new();
            for bucket in small.buckets() {
                probe(&mut found, bucket);
                if stopped.load(Ordering::Relaxed) {
                    break;
                }
            }
            found
        };

        if self.order == MatchOrder::Lexicographic {
            if self.parallel {
                matches.par_sort_unstable_by(MatchResult::cmp_text);
            } else {
                matches.sort_unstable_by(MatchResult::cmp_text);
            }
        }

        let complete =
            !stopped.load(Ordering::Relaxed) && prefix.is_complete() && suffix.is_complete();
        debug!(matches = matches.len(), complete, "join done");

        MatchSet { matches, complete }
    }
}

/// Returns every match between a forward table and a backward table, in no particular order.
pub fn find_matches(prefix: &Table, suffix: &Table) -> Vec<MatchResult> {
    Matcher::default().join(prefix, suffix).into_vec()
}
