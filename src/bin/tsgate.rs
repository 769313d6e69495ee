//! Gateway binary

use clap::{Parser, Subcommand};
use tsgate::{Config, Gateway};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tsgate")]
#[command(about = "Sharded time-series gateway: token coordination and query merging")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Bind address for HTTP
        #[arg(long, default_value = "0.0.0.0:8086")]
        bind: String,

        /// Coordination store endpoints (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "http://localhost:2379")]
        store: Vec<String>,

        /// Cluster namespace in the coordination store
        #[arg(long, default_value = "tsgate-cluster")]
        namespace: String,

        /// Number of tokens on the hash ring
        #[arg(long, default_value = "256")]
        tokens: u64,

        /// Per-shard query timeout in milliseconds
        #[arg(long, default_value = "10000")]
        shard_timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            store,
            namespace,
            tokens,
            shard_timeout_ms,
        } => {
            let config = Config {
                bind_addr: bind.parse()?,
                store_endpoints: store,
                namespace,
                num_tokens: tokens,
                shard_timeout_ms,
                ..Config::default()
            };
            Gateway::new(config).serve().await?;
        }
    }

    Ok(())
}
