//! create command - declare a matrix by writing its header

use anyhow::{Context as _, Result};
use console::{Term, style};
use shardmat::{BigMatrix, Dtype, Element};

use super::{parse_dims, with_dtype, Context};

/// Execute the create command
///
/// # Errors
/// Returns an error if the dimensions do not parse, the geometry is invalid
/// or the header cannot be written.
pub async fn execute(
    ctx: &Context,
    name: &str,
    shape: &str,
    shard_sizes: &str,
    dtype: Dtype,
    symmetric: bool,
) -> Result<()> {
    let shape = parse_dims(shape)?;
    let shard_sizes = parse_dims(shard_sizes)?;
    with_dtype!(dtype, create(ctx, name, shape, shard_sizes, symmetric))
}

async fn create<T: Element>(
    ctx: &Context,
    name: &str,
    shape: Vec<usize>,
    shard_sizes: Vec<usize>,
    symmetric: bool,
) -> Result<()> {
    let matrix = BigMatrix::<T>::builder(ctx.store.clone(), name)
        .config(ctx.config.clone())
        .shape(shape)
        .shard_sizes(shard_sizes)
        .symmetric(symmetric)
        .write_header(true)
        .open()
        .await
        .with_context(|| format!("Failed to create matrix '{name}'"))?;

    Term::stdout().write_line(&format!(
        "{} Created {} {:?} in {:?} shards ({}, {} shards)",
        style("[OK]").green(),
        style(&matrix).green(),
        matrix.shape(),
        matrix.shard_sizes(),
        matrix.dtype(),
        matrix.block_coordinates().len()
    ))?;
    Ok(())
}
