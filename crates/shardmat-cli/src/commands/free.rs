//! free command - delete every shard, keeping the header

use anyhow::Result;
use console::{Term, style};
use shardmat::Element;

use super::{with_dtype, Context};

/// Execute the free command
///
/// # Errors
/// Returns an error if the matrix has no header or a delete fails. Running
/// the command again resumes a partial free.
pub async fn execute(ctx: &Context, name: &str) -> Result<()> {
    let header = ctx.header(name).await?;
    with_dtype!(header.dtype, free(ctx, name))
}

async fn free<T: Element>(ctx: &Context, name: &str) -> Result<()> {
    let matrix = ctx.open::<T>(name, false).await?;
    let deleted = matrix.free().await?;
    Term::stdout().write_line(&format!(
        "{} Freed {} shards of {}",
        style("[OK]").green(),
        deleted,
        style(&matrix).green()
    ))?;
    Ok(())
}
