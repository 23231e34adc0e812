use anyhow::{Context, Result};
use mitmhash_core::{Preset, Variant};
use tracing::debug;

use crate::{format_state, text_bytes, Unhash};

pub fn unhash(unh: Unhash) -> Result<()> {
    let variant = Variant::from(Preset::from(unh.preset));
    let text = text_bytes(&unh.text, unh.hex)?;
    debug!(width = variant.width(), target = unh.target, bytes = text.len(), "unhashing");

    let seed = variant
        .inverse_hash(&text, unh.target)
        .context("Unable to recover the seed")?;

    println!("{}", format_state(seed, variant.width()));

    Ok(())
}
