//! info command - show geometry and shard counts

use anyhow::Result;
use shardmat::Element;

use super::{with_dtype, Context};

/// Execute the info command
///
/// # Errors
/// Returns an error if the matrix has no header or the store cannot be listed.
pub async fn execute(ctx: &Context, name: &str, symmetric: bool) -> Result<()> {
    let header = ctx.header(name).await?;
    with_dtype!(header.dtype, info(ctx, name, symmetric))
}

async fn info<T: Element>(ctx: &Context, name: &str, symmetric: bool) -> Result<()> {
    let matrix = ctx.open::<T>(name, symmetric).await?;
    let total = matrix.block_coordinates().len();
    let stored = matrix.existing_block_coordinates().await?.len();

    println!("Matrix {matrix}");
    println!("{}", "=".repeat(50));
    println!("  Bucket:       {}", matrix.bucket());
    println!("  Prefix:       {}", matrix.prefix());
    println!("  Dtype:        {}", matrix.dtype());
    println!("  Shape:        {:?}", matrix.shape());
    println!("  Shard sizes:  {:?}", matrix.shard_sizes());
    println!("  Grid:         {:?}", matrix.geometry().grid());
    println!();
    println!("  Shards:       {total}");
    println!("  Stored:       {stored}");
    println!("  Missing:      {}", total - stored);
    Ok(())
}
