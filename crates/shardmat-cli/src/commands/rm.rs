//! rm command - delete every shard and the header

use anyhow::Result;
use console::{Term, style};
use shardmat::Element;

use super::{with_dtype, Context};

/// Execute the rm command
///
/// # Errors
/// Returns an error if the matrix has no header or a delete fails.
pub async fn execute(ctx: &Context, name: &str) -> Result<()> {
    let header = ctx.header(name).await?;
    with_dtype!(header.dtype, remove(ctx, name))
}

async fn remove<T: Element>(ctx: &Context, name: &str) -> Result<()> {
    let matrix = ctx.open::<T>(name, false).await?;
    matrix.delete().await?;
    Term::stdout().write_line(&format!(
        "{} Removed {}",
        style("[OK]").green(),
        style(&matrix).red()
    ))?;
    Ok(())
}
