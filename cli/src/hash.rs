use anyhow::{Context, Result};
use mitmhash_core::{Preset, Variant};
use tracing::debug;

use crate::{format_state, text_bytes, Hash};

pub fn hash(h: Hash) -> Result<()> {
    let variant = Variant::from(Preset::from(h.preset));
    let text = text_bytes(&h.text, h.hex)?;
    debug!(width = variant.width(), seed = h.seed, bytes = text.len(), "hashing");

    let digest = variant
        .forward_hash(h.seed, &text)
        .context("Unable to hash the text")?;

    println!("{}", format_state(digest, variant.width()));

    Ok(())
}
