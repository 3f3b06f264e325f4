//! One-shot broadcast of an operator-supplied message.
//!
//! Chunks the message exactly as the daemon would and sends the frames on
//! the configured channel, bypassing deduplication. Useful for verifying a
//! deployment from the field.

use clap::Parser;
use thiserror::Error;

use crate::{
    chunker::MessageChunker,
    config::AppConfig,
    transport::{Transport, TransportError, UdpRadio},
};

/// Errors raised by the `send-once` subcommand.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    /// The radio transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Arguments of the `send-once` subcommand.
#[derive(Parser, Debug)]
pub struct SendOnceArgs {
    /// Message text to chunk and broadcast.
    #[arg(short, long)]
    message: String,

    /// Configuration directory (defaults to `configs`).
    #[arg(short, long)]
    config_dir: Option<String>,
}

/// Executes the subcommand.
pub async fn execute(args: SendOnceArgs) -> Result<(), Error> {
    let config = AppConfig::new(args.config_dir.as_deref())?;
    let radio = UdpRadio::bind(&config.radio).await?;
    let chunker = MessageChunker::new(config.radio.max_bytes, config.radio.max_messages);

    let frames = chunker.chunk(&args.message);
    tracing::info!(frames = frames.len(), "broadcasting message");
    for frame in &frames {
        radio.send(frame).await?;
        println!("sent: {frame}");
    }
    Ok(())
}
