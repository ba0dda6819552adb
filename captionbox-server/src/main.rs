mod config;
use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod server;
use server::run_server;

#[derive(Parser)]
#[command(name = "captionbox")]
#[command(about = "Store images together with their text descriptions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Server {
        /// Path to configuration file (optional)
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Override server.bind_addr
        #[arg(long)]
        bind: Option<String>,

        /// Override storage.data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "captionbox=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            config,
            bind,
            data_dir,
        } => {
            tracing::info!("Starting Captionbox server with config: {}", config);

            let mut cfg = match Config::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            if let Some(bind) = bind {
                cfg.server.bind_addr = bind;
            }
            if let Some(data_dir) = data_dir {
                cfg.storage.data_dir = data_dir;
            }

            if let Err(e) = cfg.validate() {
                tracing::error!("Invalid configuration: {}", e);
                std::process::exit(1);
            }

            tracing::info!(
                "Bind: {}, Data dir: {:?}, Index: {:?}",
                cfg.server.bind_addr,
                cfg.storage.data_dir,
                cfg.storage.index_path()
            );

            if let Err(e) = run_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
