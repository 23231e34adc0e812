mod hash;
mod inverse;
mod search;
mod unhash;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mitmhash_core::{Preset, SearchSpace, DEFAULT_SEED};
use tracing_subscriber::EnvFilter;

use hash::hash;
use inverse::inverse;
use search::search;
use unhash::unhash;

/// All the hash variants supported.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum PresetArg {
    /// Jenkins' one-at-a-time hash on 32-bit words.
    Oaat32,
    /// Jenkins' one-at-a-time hash on 64-bit words.
    Oaat64,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Oaat32 => Preset::OneAtATime32,
            PresetArg::Oaat64 => Preset::OneAtATime64,
        }
    }
}

/// Meet-in-the-middle preimage search on invertible one-at-a-time hashes.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increases the verbosity of the logs. Can be repeated.
    /// The RUST_LOG environment variable takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Inverse(Inverse),
    Hash(Hash),
    Unhash(Unhash),
    Search(Search),
}

/// Compute the multiplicative inverse of an odd constant modulo 2^width.
#[derive(Args)]
pub struct Inverse {
    /// The odd constant to invert, in decimal or 0x-prefixed hexadecimal.
    #[arg(value_parser = parse_u64)]
    constant: u64,

    /// The width of the words, in bits.
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=64), default_value_t = 64)]
    width: u32,
}

/// Hash a text with the full hash.
#[derive(Args)]
pub struct Hash {
    /// The text to hash.
    text: String,

    /// The seed of the hash, in decimal or 0x-prefixed hexadecimal.
    #[arg(short, long, value_parser = parse_u64, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// The hash variant.
    #[arg(short, long, value_enum, default_value_t = PresetArg::Oaat32)]
    preset: PresetArg,

    /// The text is given in hexadecimal.
    #[arg(long)]
    hex: bool,
}

/// Recover the seed that hashes a text to a target.
#[derive(Args)]
pub struct Unhash {
    /// The hashed text.
    text: String,

    /// The hash of the text, in decimal or 0x-prefixed hexadecimal.
    #[arg(value_parser = parse_u64)]
    target: u64,

    /// The hash variant.
    #[arg(short, long, value_enum, default_value_t = PresetArg::Oaat32)]
    preset: PresetArg,

    /// The text is given in hexadecimal.
    #[arg(long)]
    hex: bool,
}

/// Find every prefix and suffix whose concatenation hashes to a target.
///
/// Search spaces are patterns made of literal text, groups of alternatives like
/// `(foo|bar|)` and character classes like `[a-z0-9_]`.
#[derive(Args)]
pub struct Search {
    /// The search space of the prefixes.
    #[arg(long, value_parser = parse_space)]
    prefix: SearchSpace,

    /// The search space of the suffixes.
    #[arg(long, value_parser = parse_space)]
    suffix: SearchSpace,

    /// The hash to find a preimage of, in decimal or 0x-prefixed hexadecimal.
    #[arg(short, long, value_parser = parse_u64)]
    target: u64,

    /// The seed of the hash, in decimal or 0x-prefixed hexadecimal.
    #[arg(short, long, value_parser = parse_u64, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// The hash variant.
    #[arg(short, long, value_enum, default_value_t = PresetArg::Oaat32)]
    preset: PresetArg,

    /// Sort the matches by text.
    #[arg(long)]
    sorted: bool,

    /// Use a single thread.
    #[arg(long)]
    sequential: bool,

    /// Stop the search after this many seconds and show what was found so far.
    #[arg(long)]
    timeout: Option<f64>,

    /// Stop each table and the join after this many entries.
    #[arg(long)]
    max_entries: Option<usize>,

    /// Hash every combination instead of meeting in the middle.
    /// Much slower, useful to double-check results.
    #[arg(long, conflicts_with_all = ["timeout", "max_entries"])]
    brute_force: bool,
}

/// Parses a number in decimal or in 0x-prefixed hexadecimal.
fn parse_u64(number: &str) -> Result<u64> {
    match number
        .strip_prefix("0x")
        .or_else(|| number.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16)
            .with_context(|| format!("{number} is not a valid hexadecimal number")),
        None => number
            .parse()
            .with_context(|| format!("{number} is not a valid number")),
    }
}

fn parse_space(pattern: &str) -> Result<SearchSpace> {
    pattern
        .parse()
        .with_context(|| format!("Invalid search pattern {pattern:?}"))
}

/// Decodes a text given on the command line.
fn text_bytes(text: &str, is_hex: bool) -> Result<Vec<u8>> {
    if is_hex {
        hex::decode(text).context("The text is not valid hexadecimal")
    } else {
        Ok(text.as_bytes().to_vec())
    }
}

/// Formats a state with as many digits as the width requires.
fn format_state(state: u64, width: u32) -> String {
    format!("{state:#0digits$x}", digits = width.div_ceil(4) as usize + 2)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.commands {
        Commands::Inverse(inv) => inverse(inv)?,
        Commands::Hash(h) => hash(h)?,
        Commands::Unhash(unh) => unhash(unh)?,
        Commands::Search(s) => search(s)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64() {
        assert_eq!(3662618376, parse_u64("0xDA5F1F08").unwrap());
        assert_eq!(3662618376, parse_u64("0Xda5f1f08").unwrap());
        assert_eq!(42, parse_u64("42").unwrap());
        assert!(parse_u64("0xZZ").is_err());
        assert!(parse_u64("-1").is_err());
    }

    #[test]
    fn test_format_state() {
        assert_eq!("0xda5f1f08", format_state(0xDA5F1F08, 32));
        assert_eq!("0x0000000000000001", format_state(1, 64));
        assert_eq!("0x8d", format_state(0x8D, 8));
    }

    #[test]
    fn test_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::try_parse_from([
            "mitmhash",
            "search",
            "--prefix",
            "(foo|bar|baz)(spam|ham|eggs)",
            "--suffix",
            "(alpha|beta|gamma)[0-9]",
            "--target",
            "0xDA5F1F08",
        ])
        .unwrap();

        let Commands::Search(args) = cli.commands else {
            panic!("expected the search command");
        };
        assert_eq!(0xDA5F1F08, args.target);
        assert_eq!(DEFAULT_SEED, args.seed);
        assert_eq!(2, args.prefix.len());
        assert_eq!(2, args.suffix.len());
    }

    #[test]
    fn test_search_with_logs() {
        let cli = Cli::try_parse_from([
            "mitmhash",
            "-vv",
            "search",
            "--prefix",
            "(foo|bar|baz)(spam|ham|eggs)",
            "--suffix",
            "(alpha|beta|gamma)[0-9]",
            "--target",
            "0xDA5F1F08",
            "--max-entries",
            "4",
        ])
        .unwrap();
        assert_eq!(2, cli.verbose);

        let Commands::Search(args) = cli.commands else {
            panic!("expected the search command");
        };
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || search(args)).unwrap();
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Cli::try_parse_from([
            "mitmhash", "search", "--prefix", "(foo", "--suffix", "a", "--target", "1",
        ])
        .is_err());
    }
}
