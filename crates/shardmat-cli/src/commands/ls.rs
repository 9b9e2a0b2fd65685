//! ls command - list stored or missing shard coordinates

use anyhow::Result;
use console::style;
use shardmat::Element;

use super::{with_dtype, Context};

/// Execute the ls command
///
/// # Errors
/// Returns an error if the matrix has no header or the store cannot be listed.
pub async fn execute(ctx: &Context, name: &str, missing: bool, symmetric: bool) -> Result<()> {
    let header = ctx.header(name).await?;
    with_dtype!(header.dtype, list(ctx, name, missing, symmetric))
}

async fn list<T: Element>(ctx: &Context, name: &str, missing: bool, symmetric: bool) -> Result<()> {
    let matrix = ctx.open::<T>(name, symmetric).await?;
    let coords = if missing {
        matrix.missing_block_coordinates().await?
    } else {
        matrix.existing_block_coordinates().await?
    };

    if coords.is_empty() {
        let what = if missing { "missing" } else { "stored" };
        println!("{}", style(format!("No {what} shards in {matrix}")).yellow());
        return Ok(());
    }

    println!("{:<16} {:<24} {}", "COORD", "RANGES", "KEY");
    for coord in &coords {
        let ranges = matrix
            .geometry()
            .real_ranges(coord)?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" x ");
        let key = matrix.shard_key(coord)?;
        println!("{:<16} {:<24} {}", format!("{coord:?}"), ranges, key);
    }
    Ok(())
}
