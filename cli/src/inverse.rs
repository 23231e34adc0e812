use anyhow::{Context, Result};
use mitmhash_core::compute_inverse;
use tracing::debug;

use crate::{format_state, Inverse};

pub fn inverse(inv: Inverse) -> Result<()> {
    let inverse = compute_inverse(inv.constant, inv.width)
        .with_context(|| format!("Unable to invert {:#x}", inv.constant))?;

    debug!(constant = inv.constant, inverse, width = inv.width, "inverted");
    println!("{}", format_state(inverse, inv.width));

    Ok(())
}
