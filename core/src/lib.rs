//! Meet-in-the-middle preimage search on invertible one-at-a-time hashes.
//!
//! The hash is split into a loop stage, applied once per input byte, and a final stage.
//! Both stages are bijections of the state, so a target can be walked back through the final
//! stage and through any suffix. A search builds a table of every prefix hashed forward from
//! the seed and a table of every suffix un-hashed backward from the target, and joins them
//! on the state where they meet.

mod budget;
mod builder;
mod error;
mod event;
mod hash;
mod inverse;
mod matching;
mod search;
mod space;
mod table;

pub use {
    budget::Budget,
    builder::{build_table, TableBuilder},
    error::{MitmError, MitmResult},
    event::{Event, TableHandle},
    hash::{Preset, Shifts, Variant, VariantBuilder, ONE_AT_A_TIME_SHIFTS},
    inverse::{compute_inverse, is_inverse, shift_add_multiplier, width_mask, MAX_WIDTH},
    matching::{find_matches, MatchOrder, MatchResult, MatchSet, Matcher},
    search::{brute_force, Search, SearchOutcome},
    space::{Combinations, SearchSpace, SegmentSet},
    table::{Candidate, Direction, Table},
};

/// The default hash variant.
pub const DEFAULT_PRESET: Preset = Preset::OneAtATime32;

/// The default seed of the hash.
pub const DEFAULT_SEED: u64 = 0;

/// The number of combinations between two progress events of a sequential table construction.
pub const PROGRESS_INTERVAL: usize = 1 << 16;

/// Tables never reserve room for more states than this upfront.
pub const MAX_PREALLOCATED_ENTRIES: usize = 1 << 24;
