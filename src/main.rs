//! keywheel - credential-rotating proxy for OpenAI-compatible chat APIs
//!
//! A local proxy that forwards chat completion requests upstream while
//! rotating through a pool of (token, checksum) credential pairs.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keywheel::config::Config;
use keywheel::proxy::run_server;

#[derive(Parser)]
#[command(name = "keywheel")]
#[command(about = "Credential-rotating proxy for OpenAI-compatible chat APIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keywheel=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = %config, "Loading configuration");
            let mut config = Config::from_file(&config)?;

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let config = Config::from_file(&config)?;
            println!("Configuration OK");
            println!("  listen:          {}", config.server.listen);
            println!("  max concurrency: {}", config.server.max_concurrency);
            println!("  upstream:        {}", config.upstream.base_url);
            println!("  pool path:       {}", config.pool.path);
            Ok(())
        }
    }
}
