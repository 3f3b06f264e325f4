//! UDP multicast implementation of the radio transport.
//!
//! Frames travel as JSON envelopes in single datagrams on a LAN multicast
//! group. Loopback is enabled so that co-located instances (and the sending
//! instance itself) overhear every broadcast, which is what feeds the
//! dedup engine's cancellation path.

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::{Envelope, FrameKind, InboundFrame, Transport, TransportError, WIRE_VERSION, classify_datagram};
use crate::{config::RadioConfig, router::DedupRouter};

/// Outbound half of the multicast radio channel.
pub struct UdpRadio {
    socket: Arc<UdpSocket>,
    group: SocketAddr,
    node_id: String,
    long_name: String,
    short_name: String,
}

impl UdpRadio {
    /// Binds the multicast socket and joins the configured group.
    pub async fn bind(config: &RadioConfig) -> Result<Self, TransportError> {
        let socket =
            UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.multicast_port)).await?;
        socket.join_multicast_v4(config.multicast_group, Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_multicast_ttl_v4(config.hop_limit)?;
        tracing::info!(
            group = %config.multicast_group,
            port = config.multicast_port,
            node = %config.node_id,
            "radio transport bound"
        );
        Ok(Self {
            socket: Arc::new(socket),
            group: SocketAddr::V4(SocketAddrV4::new(
                config.multicast_group,
                config.multicast_port,
            )),
            node_id: config.node_id.clone(),
            long_name: config.long_name.clone(),
            short_name: config.short_name.clone(),
        })
    }

    /// Shared handle to the bound socket, for the receive loop.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    async fn broadcast(&self, kind: FrameKind, body: String) -> Result<(), TransportError> {
        let envelope = Envelope { v: WIRE_VERSION, node: self.node_id.clone(), kind, body };
        let payload = serde_json::to_vec(&envelope)?;
        self.socket.send_to(&payload, self.group).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for UdpRadio {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        self.broadcast(FrameKind::Text, frame.to_string()).await
    }

    async fn send_presence(&self) -> Result<(), TransportError> {
        self.broadcast(
            FrameKind::Presence,
            format!("{} ({})", self.long_name, self.short_name),
        )
        .await
    }
}

/// Inbound half: reads datagrams off the shared socket and feeds decoded
/// text frames into the router as "seen" events until shutdown.
pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
    router: DedupRouter,
    shutdown: CancellationToken,
}

impl UdpReceiver {
    /// Creates a receiver over an already-bound multicast socket.
    pub fn new(socket: Arc<UdpSocket>, router: DedupRouter, shutdown: CancellationToken) -> Self {
        Self { socket, router, shutdown }
    }

    /// Runs the receive loop. Decode failures never stop the loop; only a
    /// shutdown request does.
    pub async fn run(self) {
        tracing::info!("radio receiver started");
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::info!("radio receiver shutting down");
                    break;
                }

                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, addr)) => match classify_datagram(&buf[..len]) {
                        InboundFrame::Decoded(text) => {
                            tracing::debug!(%addr, "overheard text frame");
                            self.router.mark_seen(&text);
                        }
                        InboundFrame::Ignored(reason) => {
                            tracing::debug!(%addr, reason, "ignoring datagram");
                        }
                        InboundFrame::Malformed => {
                            tracing::debug!(%addr, "dropping malformed datagram");
                        }
                    },
                    Err(error) => {
                        tracing::warn!(error = %error, "radio socket receive error");
                    }
                }
            }
        }
    }
}
