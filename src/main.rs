use std::sync::Arc;

use clap::{Parser, Subcommand};
use meshwarn::{
    cmd::send_once::{self, SendOnceArgs},
    config::AppConfig,
    feeds::{SmhiFeed, VmaFeed},
    http_client::build_feed_http_client,
    supervisor::Supervisor,
    transport::{Transport, UdpRadio},
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the relay daemon.
    Run {
        /// Configuration directory (defaults to `configs`).
        #[arg(short, long)]
        config_dir: Option<String>,
    },
    /// Chunks and broadcasts a single message, bypassing deduplication.
    SendOnce(SendOnceArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config_dir } => run_daemon(config_dir.as_deref()).await?,
        Commands::SendOnce(args) => send_once::execute(args).await?,
    }

    Ok(())
}

async fn run_daemon(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(config_dir)?;
    tracing::info!(
        group = %config.radio.multicast_group,
        port = config.radio.multicast_port,
        node = %config.radio.node_id,
        "configuration loaded"
    );

    let radio = UdpRadio::bind(&config.radio).await?;
    let receiver_socket = radio.socket();
    let transport: Arc<dyn Transport> = Arc::new(radio);

    // Announce ourselves before the feeds start talking.
    transport.send_presence().await?;

    let http_client = build_feed_http_client(&config.http_retry)?;

    let mut builder = Supervisor::builder()
        .config(config.clone())
        .transport(transport)
        .receiver_socket(receiver_socket);
    if config.feeds.vma.enabled {
        builder = builder.feed(
            Arc::new(VmaFeed::new(http_client.clone(), config.feeds.vma.clone())),
            config.feeds.vma.interval_secs,
        );
    }
    if config.feeds.smhi.enabled {
        builder = builder.feed(
            Arc::new(SmhiFeed::new(http_client.clone(), config.feeds.smhi.clone())),
            config.feeds.smhi.interval_secs,
        );
    }
    let supervisor = builder.build()?;

    tracing::info!("supervisor initialized, starting relay");
    supervisor.run().await?;

    Ok(())
}
