use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use crossbeam_channel::{unbounded, Sender};
use rayon::prelude::*;
use tracing::{debug, debug_span, trace};

use crate::{
    budget::Budget,
    error::{MitmError, MitmResult},
    event::{Event, TableHandle},
    hash::Variant,
    space::{Combinations, SearchSpace, SegmentSet},
    table::{Candidate, Direction, Table},
    MAX_PREALLOCATED_ENTRIES, PROGRESS_INTERVAL,
};

/// Returns the number of entries of a table built over `space`.
/// Fails when it doesn't fit in memory addresses.
pub(crate) fn table_entries(space: &SearchSpace) -> MitmResult<usize> {
    space
        .cardinality()
        .and_then(|entries| usize::try_from(entries).ok())
        .ok_or(MitmError::SearchSpaceTooLarge)
}

/// Builds the table of every string of a search space, keyed by the state it hashes to.
#[derive(Clone, Debug)]
pub struct TableBuilder {
    variant: Variant,
    parallel: bool,
    budget: Budget,
}

impl TableBuilder {
    /// Creates a new builder for the given hash variant.
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            parallel: true,
            budget: Budget::default(),
        }
    }

    /// Splits the construction into shards built on the rayon thread pool.
    /// Enabled by default.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;

        self
    }

    /// Limits the work done by the construction.
    pub fn budget(mut self, budget: Budget) -> Self {
        self.budget = budget;

        self
    }

    /// Builds a table over `space`, starting from `start_state`.
    ///
    /// Going forward, `start_state` is the seed of the hash. Going backward, it is the target
    /// state with the final stage already removed.
    pub fn build(
        &self,
        start_state: u64,
        space: &SearchSpace,
        direction: Direction,
    ) -> MitmResult<Table> {
        let entries = self.validate(start_state, space)?;
        Ok(self.build_impl(start_state, space, direction, entries, None))
    }

    /// Builds a table on another thread.
    /// Returns an handle to get events related to the construction and to get the built table.
    pub fn spawn(
        self,
        start_state: u64,
        space: SearchSpace,
        direction: Direction,
    ) -> MitmResult<TableHandle> {
        let entries = self.validate(start_state, &space)?;
        let (sender, receiver) = unbounded();
        let thread_handle = thread::spawn(move || {
            Ok(self.build_impl(start_state, &space, direction, entries, Some(sender)))
        });

        Ok(TableHandle {
            thread_handle,
            receiver,
        })
    }

    /// Fails on invalid inputs before any work is done.
    /// Returns the number of combinations of the search space.
    fn validate(&self, start_state: u64, space: &SearchSpace) -> MitmResult<usize> {
        self.variant.check(start_state)?;
        space.validate()?;

        table_entries(space)
    }

    fn build_impl(
        &self,
        start_state: u64,
        space: &SearchSpace,
        direction: Direction,
        entries: usize,
        events: Option<Sender<Event>>,
    ) -> Table {
        let _span = debug_span!(
            "build_table",
            ?direction,
            start_state = format_args!("{start_state:#x}"),
            entries
        )
        .entered();

        // the segments in the order they are consumed
        let order: Vec<&SegmentSet> = match direction {
            Direction::Forward => space.segments().iter().collect(),
            Direction::Backward => space.segments().iter().rev().collect(),
        };
        let produced = AtomicUsize::new(0);

        let table = match order.first() {
            // one shard per candidate of the first consumed segment
            Some(first) if self.parallel && first.len() > 1 => {
                let shard_count = first.len();
                let shards_done = AtomicUsize::new(0);
                let capacity = (entries / shard_count).min(MAX_PREALLOCATED_ENTRIES);
                debug!(shard_count, "building table shards");

                (0..shard_count)
                    .into_par_iter()
                    .map(|shard| {
                        let mut table = Table::with_capacity(start_state, direction, capacity);
                        self.fill(&mut table, &order, Some(shard), &produced, None);

                        if let Some(sender) = &events {
                            let done = shards_done.fetch_add(1, Ordering::Relaxed) + 1;
                            sender
                                .send(Event::ShardDone {
                                    shard,
                                    shard_count,
                                    entries: table.len(),
                                })
                                .ok();
                            sender
                                .send(Event::Progress(
                                    done as f64 / shard_count as f64 * 100.,
                                ))
                                .ok();
                        }

                        table
                    })
                    .reduce_with(|mut table, shard_table| {
                        table.merge(shard_table);
                        table
                    })
                    .unwrap_or_else(|| Table::new(start_state, direction))
            }

            _ => {
                let capacity = entries.min(MAX_PREALLOCATED_ENTRIES);
                let mut table = Table::with_capacity(start_state, direction, capacity);
                let progress = events.as_ref().map(|sender| (sender, entries));
                self.fill(&mut table, &order, None, &produced, progress);

                if let Some(sender) = &events {
                    sender.send(Event::Progress(100.)).ok();
                }

                table
            }
        };

        debug!(
            entries = table.len(),
            keys = table.key_count(),
            collisions = table.collisions(),
            complete = table.is_complete(),
            "table built"
        );

        table
    }

    /// Hashes every combination of `order` into `table`.
    /// With a shard, the first consumed segment is pinned to that candidate.
    fn fill(
        &self,
        table: &mut Table,
        order: &[&SegmentSet],
        shard: Option<usize>,
        produced: &AtomicUsize,
        progress: Option<(&Sender<Event>, usize)>,
    ) {
        let direction = table.direction();

        let mut radices: Vec<usize> = order.iter().map(|segment| segment.len()).collect();
        if shard.is_some() {
            radices[0] = 1;
        }
        let mut combinations = Combinations::new(radices);

        // states[k] is the state reached after consuming the first k segments
        let mut states = vec![table.start_state(); order.len() + 1];
        let text_capacity = order.iter().map(|segment| segment.max_len()).sum();

        while let Some(changed) = combinations.advance() {
            let count = produced.fetch_add(1, Ordering::Relaxed);
            if !self.budget.allows(count) {
                trace!(count, "budget exhausted");
                table.mark_incomplete();
                return;
            }

            let indices = combinations.current();
            let segment_at = |k: usize| {
                match (k, shard) {
                    (0, Some(shard)) => &order[0][shard],
                    _ => &order[k][indices[k]],
                }
            };

            // only the segments after the leftmost change need to be hashed again
            for k in changed..order.len() {
                states[k + 1] = match direction {
                    Direction::Forward => self.variant.extend(states[k], segment_at(k)),
                    Direction::Backward => self.variant.retract(states[k], segment_at(k)),
                };
            }

            // the text always reads in the order of the search space
            let mut text = Vec::with_capacity(text_capacity);
            match direction {
                Direction::Forward => {
                    (0..order.len()).for_each(|k| text.extend_from_slice(segment_at(k)))
                }
                Direction::Backward => (0..order.len())
                    .rev()
                    .for_each(|k| text.extend_from_slice(segment_at(k))),
            }

            table.insert(Candidate::new(text, states[order.len()]));

            if let Some((sender, total)) = progress {
                if (count + 1) % PROGRESS_INTERVAL == 0 {
                    sender
                        .send(Event::Progress((count + 1) as f64 / total as f64 * 100.))
                        .ok();
                }
            }
        }
    }
}

/// Builds the table of `space` from `start_state` with the default options.
pub fn build_table(
    variant: &Variant,
    start_state: u64,
    space: &SearchSpace,
    direction: Direction,
) -> MitmResult<Table> {
    TableBuilder::new(*variant).build(start_state, space, direction)
}
