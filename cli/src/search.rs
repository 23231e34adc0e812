use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};
use human_repr::{HumanCount, HumanDuration};
use mitmhash_core::{brute_force, Budget, MatchOrder, MatchResult, Preset, Variant};
use tracing::{info, warn};

use crate::{format_state, Search};

pub fn search(s: Search) -> Result<()> {
    let variant = Variant::from(Preset::from(s.preset));
    info!(
        width = variant.width(),
        prefixes = ?s.prefix.cardinality(),
        suffixes = ?s.suffix.cardinality(),
        brute_force = s.brute_force,
        "starting the search"
    );

    if s.brute_force {
        let start = Instant::now();
        let matches = brute_force(&variant, s.seed, s.target, &s.prefix, &s.suffix)
            .context("Unable to run the brute force search")?;

        display_matches(&matches, variant.width());
        eprintln!(
            "{} match(es) found by brute force in {}",
            matches.len(),
            start.elapsed().as_secs_f64().human_duration()
        );

        return Ok(());
    }

    let mut budget = Budget::unlimited();
    if let Some(timeout) = s.timeout {
        let timeout = Duration::try_from_secs_f64(timeout)
            .context("The timeout should be a positive number of seconds")?;
        budget = budget.timeout(timeout);
    }
    if let Some(max_entries) = s.max_entries {
        budget = budget.max_entries(max_entries);
    }

    let order = if s.sorted {
        MatchOrder::Lexicographic
    } else {
        MatchOrder::Unordered
    };

    let outcome = mitmhash_core::Search::new(variant, s.seed, s.target, s.prefix, s.suffix)
        .parallel(!s.sequential)
        .order(order)
        .budget(budget)
        .run()
        .context("Unable to run the search")?;

    display_matches(outcome.matches.as_slice(), variant.width());
    eprintln!(
        "{} match(es) found in {} ({} prefixes, {} suffixes)",
        outcome.matches.len(),
        outcome.elapsed.as_secs_f64().human_duration(),
        outcome.prefix_entries.human_count_bare(),
        outcome.suffix_entries.human_count_bare(),
    );

    if !outcome.is_complete() {
        warn!(timeout = ?s.timeout, max_entries = ?s.max_entries, "search budget exhausted");
        eprintln!("The search stopped early, some matches may be missing");
    }

    Ok(())
}

/// Prints the matches as a table.
fn display_matches(matches: &[MatchResult], width: u32) {
    if matches.is_empty() {
        eprintln!("No match found");
        return;
    }

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec!["Text", "Prefix", "Suffix", "Meeting state"]);

    for m in matches {
        display_table.add_row(vec![
            Cell::new(m.text_lossy()).fg(Color::Green),
            Cell::new(m.prefix()),
            Cell::new(m.suffix()),
            Cell::new(format_state(m.state(), width)).fg(Color::Grey),
        ]);
    }

    println!("{display_table}");
}
