//! shardmat CLI - inspect and maintain shard-addressable matrices

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shardmat::Dtype;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "shardmat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory backing the object store
    #[arg(long, global = true, default_value = "./shardmat-data")]
    root: PathBuf,

    /// Bucket override (else SHARDMAT_BUCKET or the default)
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// Key prefix override (else SHARDMAT_PREFIX or the default)
    #[arg(long, global = true)]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Declare a matrix by writing its header
    Create {
        /// Matrix name
        name: String,
        /// Shape, comma separated (e.g. 4096,4096)
        #[arg(long)]
        shape: String,
        /// Shard size per axis, comma separated (e.g. 1024,1024)
        #[arg(long)]
        shard_sizes: String,
        /// Element type
        #[arg(long, default_value = "float64")]
        dtype: Dtype,
        /// Validate as a symmetric matrix
        #[arg(long)]
        symmetric: bool,
    },
    /// Show geometry and shard counts
    Info {
        /// Matrix name
        name: String,
        /// Fold mirror shards
        #[arg(long)]
        symmetric: bool,
    },
    /// List stored shard coordinates and their keys
    Ls {
        /// Matrix name
        name: String,
        /// List missing coordinates instead
        #[arg(long)]
        missing: bool,
        /// Fold mirror shards
        #[arg(long)]
        symmetric: bool,
    },
    /// Print one block
    Get {
        /// Matrix name
        name: String,
        /// Block coordinate, comma separated (e.g. 0,1)
        coord: String,
        /// Read mirror blocks through their canonical shard
        #[arg(long)]
        symmetric: bool,
    },
    /// Delete every shard, keeping the header
    Free {
        /// Matrix name
        name: String,
    },
    /// Delete every shard and the header
    Rm {
        /// Matrix name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ctx = commands::Context::connect(&cli.root, cli.bucket, cli.prefix).await?;

    match cli.command {
        Commands::Create { name, shape, shard_sizes, dtype, symmetric } => {
            commands::create::execute(&ctx, &name, &shape, &shard_sizes, dtype, symmetric).await
        }
        Commands::Info { name, symmetric } => commands::info::execute(&ctx, &name, symmetric).await,
        Commands::Ls { name, missing, symmetric } => {
            commands::ls::execute(&ctx, &name, missing, symmetric).await
        }
        Commands::Get { name, coord, symmetric } => {
            commands::get::execute(&ctx, &name, &coord, symmetric).await
        }
        Commands::Free { name } => commands::free::execute(&ctx, &name).await,
        Commands::Rm { name } => commands::rm::execute(&ctx, &name).await,
    }
}
