#![warn(missing_docs)]
//! Meshwarn relays weather and emergency alerts fetched from public feeds
//! onto a shared, lossy, low-bandwidth multicast radio channel.
//!
//! Any number of redundant instances may share the channel. Each instance
//! remembers what it has already transmitted or overheard, and holds off for
//! a deterministic per-message delay before transmitting, so that across the
//! whole population each distinct alert is broadcast at most once within a
//! configurable memory window. Instances coordinate purely by overhearing
//! each other; there is no central coordinator and no peer discovery.

pub mod cache;
pub mod chunker;
pub mod cmd;
pub mod config;
pub mod feeds;
pub mod http_client;
pub mod router;
pub mod supervisor;
pub mod test_helpers;
pub mod transport;
