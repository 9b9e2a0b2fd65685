//! get command - print one block

use std::fmt::Display;

use anyhow::{Context as _, Result};
use shardmat::Element;

use super::{parse_dims, with_dtype, Context};

/// Execute the get command
///
/// # Errors
/// Returns an error if the coordinate does not parse or the block cannot
/// be read.
pub async fn execute(ctx: &Context, name: &str, coord: &str, symmetric: bool) -> Result<()> {
    let coord = parse_dims(coord)?;
    let header = ctx.header(name).await?;
    with_dtype!(header.dtype, print_block(ctx, name, &coord, symmetric))
}

async fn print_block<T: Element + Display>(
    ctx: &Context,
    name: &str,
    coord: &[usize],
    symmetric: bool,
) -> Result<()> {
    let matrix = ctx.open::<T>(name, symmetric).await?;
    let block = matrix
        .get_block(coord)
        .await
        .with_context(|| format!("Failed to read block {coord:?} of {matrix}"))?;

    let ranges = matrix.geometry().real_ranges(coord)?;
    tracing::debug!(coord = ?coord, shape = ?block.shape(), "Read block");
    println!(
        "{matrix} block {coord:?} ({})",
        ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(" x ")
    );
    println!("{block}");
    Ok(())
}
