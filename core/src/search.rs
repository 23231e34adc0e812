use std::time::{Duration, Instant};

use itertools::Itertools;
use tracing::{info, info_span};

use crate::{
    budget::Budget,
    builder::{table_entries, TableBuilder},
    error::MitmResult,
    hash::Variant,
    matching::{MatchOrder, MatchResult, MatchSet, Matcher},
    space::SearchSpace,
    table::{Candidate, Direction},
    DEFAULT_SEED,
};

/// A meet-in-the-middle search for the strings of `prefix × suffix` hashing to a target.
#[derive(Clone, Debug)]
pub struct Search {
    variant: Variant,
    seed: u64,
    target: u64,
    prefix: SearchSpace,
    suffix: SearchSpace,
    parallel: bool,
    order: MatchOrder,
    budget: Budget,
}

impl Search {
    /// Creates a new search.
    pub fn new(
        variant: Variant,
        seed: u64,
        target: u64,
        prefix: SearchSpace,
        suffix: SearchSpace,
    ) -> Self {
        Self {
            variant,
            seed,
            target,
            prefix,
            suffix,
            parallel: true,
            order: MatchOrder::default(),
            budget: Budget::default(),
        }
    }

    /// Creates a new search from the default seed.
    pub fn from_default_seed(
        variant: Variant,
        target: u64,
        prefix: SearchSpace,
        suffix: SearchSpace,
    ) -> Self {
        Self::new(variant, DEFAULT_SEED, target, prefix, suffix)
    }

    /// Uses the rayon thread pool to build the tables and to join them.
    /// Enabled by default.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;

        self
    }

    /// Sets the order of the matches.
    pub fn order(mut self, order: MatchOrder) -> Self {
        self.order = order;

        self
    }

    /// Limits the work done by the search.
    /// The entry limit applies to each table and to the join separately.
    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;

        self
    }

    /// Runs the search.
    pub fn run(&self) -> MitmResult<SearchOutcome> {
        let start = Instant::now();
        let _span = info_span!(
            "search",
            width = self.variant.width(),
            seed = format_args!("{:#x}", self.seed),
            target = format_args!("{:#x}", self.target)
        )
        .entered();

        self.variant.check(self.seed)?;
        let meeting_state = self.variant.inverse_final_stage(self.target)?;
        self.prefix.validate()?;
        self.suffix.validate()?;
        table_entries(&self.prefix)?;
        table_entries(&self.suffix)?;

        let builder = TableBuilder::new(self.variant)
            .parallel(self.parallel)
            .budget(self.budget.clone());

        let (prefix_table, suffix_table) = if self.parallel {
            rayon::join(
                || builder.build(self.seed, &self.prefix, Direction::Forward),
                || builder.build(meeting_state, &self.suffix, Direction::Backward),
            )
        } else {
            (
                builder.build(self.seed, &self.prefix, Direction::Forward),
                builder.build(meeting_state, &self.suffix, Direction::Backward),
            )
        };
        let (prefix_table, suffix_table) = (prefix_table?, suffix_table?);

        let matches = Matcher::new()
            .order(self.order)
            .parallel(self.parallel)
            .budget(self.budget.clone())
            .join(&prefix_table, &suffix_table);

        debug_assert!(matches
            .iter()
            .all(|m| self.variant.forward_hash(self.seed, &m.text()) == Ok(self.target)));

        let outcome = SearchOutcome {
            matches,
            prefix_entries: prefix_table.len(),
            suffix_entries: suffix_table.len(),
            elapsed: start.elapsed(),
        };

        info!(
            matches = outcome.matches.len(),
            prefix_entries = outcome.prefix_entries,
            suffix_entries = outcome.suffix_entries,
            complete = outcome.is_complete(),
            elapsed = ?outcome.elapsed,
            "search done"
        );

        Ok(outcome)
    }
}

/// The result of a search.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// The matches found, and whether the join covered both tables.
    pub matches: MatchSet,
    /// Number of candidates in the forward table.
    pub prefix_entries: usize,
    /// Number of candidates in the backward table.
    pub suffix_entries: usize,
    /// Wall-clock time of the whole search, validation included.
    pub elapsed: Duration,
}

impl SearchOutcome {
    /// Returns false if the search stopped before covering both search spaces.
    pub fn is_complete(&self) -> bool {
        self.matches.is_complete()
    }
}

/// Hashes every string of `prefix × suffix` and keeps those reaching `target`.
/// Much slower than [`Search`], but trivially correct.
/// The matches are sorted by text, then by prefix length.
pub fn brute_force(
    variant: &Variant,
    seed: u64,
    target: u64,
    prefix: &SearchSpace,
    suffix: &SearchSpace,
) -> MitmResult<Vec<MatchResult>> {
    variant.check(seed)?;
    let meeting_state = variant.inverse_final_stage(target)?;
    prefix.validate()?;
    suffix.validate()?;

    let prefixes = prefix.texts().unique().collect_vec();
    let suffixes = suffix.texts().unique().collect_vec();

    let mut matches = Vec::new();
    for prefix in &prefixes {
        let state = variant.loop_stage(seed, prefix)?;
        for suffix in &suffixes {
            let text = [prefix.as_slice(), suffix.as_slice()].concat();
            if variant.forward_hash(seed, &text)? != target {
                continue;
            }

            let suffix_state = variant.inverse_loop_stage(meeting_state, suffix)?;
            matches.push(MatchResult::new(
                Candidate::new(prefix.as_slice(), state),
                Candidate::new(suffix.as_slice(), suffix_state),
            ));
        }
    }

    matches.sort_unstable_by(|a, b| {
        a.text()
            .cmp(&b.text())
            .then_with(|| a.prefix().text().len().cmp(&b.prefix().text().len()))
    });

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::MitmError, hash::Preset, space::SegmentSet};

    #[test]
    fn test_search() {
        let outcome = Search::new(
            Preset::OneAtATime32.variant(),
            0,
            0xDA5F1F08,
            "(foo|bar|baz)(spam|ham|eggs)".parse().unwrap(),
            "(alpha|beta|gamma)[0-9]".parse().unwrap(),
        )
        .run()
        .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(9, outcome.prefix_entries);
        assert_eq!(30, outcome.suffix_entries);
        assert_eq!(1, outcome.matches.len());
        assert_eq!("bazspamalpha6", outcome.matches.as_slice()[0].text_lossy());
    }

    #[test]
    fn test_brute_force() {
        let variant = Preset::OneAtATime32.variant();
        let matches = brute_force(
            &variant,
            0,
            0xDA5F1F08,
            &"(foo|bar|baz)(spam|ham|eggs)".parse::<SearchSpace>().unwrap(),
            &"(alpha|beta|gamma)[0-9]".parse::<SearchSpace>().unwrap(),
        )
        .unwrap();

        assert_eq!(1, matches.len());
        assert_eq!("bazspam", matches[0].prefix().text_lossy());
        assert_eq!("alpha6", matches[0].suffix().text_lossy());
        assert_eq!(variant.loop_stage(0, b"bazspam"), Ok(matches[0].state()));
        assert_eq!(matches[0].prefix().hash(), matches[0].suffix().hash());
    }

    #[test]
    fn test_target_too_wide() {
        let search = Search::from_default_seed(
            Preset::OneAtATime32.variant(),
            1 << 40,
            "a".parse().unwrap(),
            "b".parse().unwrap(),
        );

        assert_eq!(
            Err(MitmError::WidthMismatch {
                value: 1 << 40,
                width: 32
            }),
            search.run().map(|outcome| outcome.matches.len())
        );
    }

    fn every_byte(segments: usize) -> SearchSpace {
        (0..segments)
            .map(|_| SegmentSet::new((0..=255u8).map(|byte| [byte])))
            .collect()
    }

    #[test]
    fn test_space_too_large() {
        let variant = Preset::OneAtATime32.variant();
        let small: SearchSpace = "(foo|bar)".parse().unwrap();

        // 2^72 combinations fit a u128 but not a usize, 2^512 fit neither
        for huge in [every_byte(9), every_byte(64)] {
            for (prefix, suffix) in [(small.clone(), huge.clone()), (huge.clone(), small.clone())] {
                assert_eq!(
                    Err(MitmError::SearchSpaceTooLarge),
                    Search::new(variant, 0, 0xDA5F1F08, prefix, suffix)
                        .run()
                        .map(|outcome| outcome.matches.len())
                );
            }
        }
    }
}
