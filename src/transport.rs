//! Transport engine seam
//!
//! The tunnel itself (DNS encoding, QUIC framing, retransmission) lives in an
//! external transport engine. This module defines what the bootstrap hands
//! that engine: validated, immutable session descriptions and the quinn
//! transport tuning that goes with them.

use crate::congestion::CongestionControl;
use crate::resolver::ResolverAddressSet;
use async_trait::async_trait;
use quinn::{TransportConfig, VarInt};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Connection-level flow control window (15 MB)
pub const CONNECTION_WINDOW: u32 = 15_000_000;

/// Per-stream receive window (10 MB)
pub const STREAM_RECEIVE_WINDOW: u32 = 10_000_000;

/// Concurrent bidirectional streams per connection
pub const MAX_CONCURRENT_BIDI_STREAMS: u32 = 2048;

/// Everything the engine needs to run a tunnel client
#[derive(Debug, Clone, Serialize)]
pub struct ClientSession {
    pub listen_port: u16,
    pub resolvers: ResolverAddressSet,
    pub domain: String,
    pub congestion_control: CongestionControl,
    pub gso: bool,
    #[serde(with = "humantime_serde")]
    pub keep_alive: Option<Duration>,
}

impl ClientSession {
    /// Local UDP address matching the resolvers' family
    pub fn local_bind_addr(&self) -> SocketAddr {
        self.resolvers.local_bind_addr()
    }

    pub fn transport_config(&self) -> TransportConfig {
        transport_config(self.congestion_control, self.gso, self.keep_alive)
    }
}

/// Everything the engine needs to run a tunnel server
#[derive(Debug, Clone, Serialize)]
pub struct ServerSession {
    pub dns_listen_port: u16,
    pub target: SocketAddr,
    pub domain: String,
    pub congestion_control: CongestionControl,
    pub gso: bool,
    #[serde(with = "humantime_serde")]
    pub keep_alive: Option<Duration>,
}

impl ServerSession {
    pub fn transport_config(&self) -> TransportConfig {
        transport_config(self.congestion_control, self.gso, self.keep_alive)
    }
}

/// Build quinn transport parameters for a tunnel session
///
/// Windows are sized for the high bandwidth-delay product of a DNS carrier.
pub fn transport_config(congestion_control: CongestionControl, gso: bool, keep_alive: Option<Duration>) -> TransportConfig {
    let mut transport = TransportConfig::default();
    transport.max_concurrent_bidi_streams(VarInt::from_u32(MAX_CONCURRENT_BIDI_STREAMS));
    transport.send_window(u64::from(CONNECTION_WINDOW));
    transport.receive_window(VarInt::from_u32(CONNECTION_WINDOW));
    transport.stream_receive_window(VarInt::from_u32(STREAM_RECEIVE_WINDOW));
    transport.keep_alive_interval(keep_alive);
    transport.enable_segmentation_offload(gso);
    transport.congestion_controller_factory(congestion_control.factory());
    transport
}

/// External transport engine
///
/// Both entry points run a session to completion and return the process
/// exit status.
#[async_trait]
pub trait TransportEngine: Send + Sync {
    async fn run_client(&self, session: ClientSession) -> i32;

    async fn run_server(&self, session: ServerSession) -> i32;
}

/// Engine that prints the session plan as JSON instead of running it
///
/// Used when no transport engine is linked, and to check configurations.
#[derive(Debug, Default)]
pub struct SessionPlanEngine;

impl SessionPlanEngine {
    fn emit<T: Serialize>(role: &str, session: &T) -> i32 {
        let plan = serde_json::json!({ "role": role, "session": session });
        match serde_json::to_string_pretty(&plan) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(e) => {
                log::error!("Failed to serialize {} session plan: {}", role, e);
                1
            }
        }
    }
}

#[async_trait]
impl TransportEngine for SessionPlanEngine {
    async fn run_client(&self, session: ClientSession) -> i32 {
        Self::emit("client", &session)
    }

    async fn run_server(&self, session: ServerSession) -> i32 {
        Self::emit("server", &session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ResolverAddress, ResolverAddressSet};

    fn session(keep_alive: Option<Duration>) -> ClientSession {
        let resolvers = ResolverAddressSet::from_addresses(vec![ResolverAddress {
            raw: "1.1.1.1".into(),
            addr: "1.1.1.1:53".parse().unwrap(),
        }])
        .unwrap();

        ClientSession {
            listen_port: 5201,
            resolvers,
            domain: "tunnel.example.com".into(),
            congestion_control: CongestionControl::default(),
            gso: false,
            keep_alive,
        }
    }

    #[test]
    fn test_local_bind_follows_resolver_family() {
        assert_eq!(session(None).local_bind_addr(), "0.0.0.0:0".parse().unwrap());
    }

    #[test]
    fn test_session_serializes_plan() {
        let value = serde_json::to_value(session(Some(Duration::from_millis(400)))).unwrap();
        assert_eq!(value["congestion_control"], "dcubic");
        assert_eq!(value["keep_alive"], "400ms");
        assert_eq!(value["resolvers"]["family"], "ipv4");
        assert_eq!(value["resolvers"]["addrs"][0]["addr"], "1.1.1.1:53");
    }

    #[test]
    fn test_transport_config_builds_for_every_algorithm() {
        for name in CongestionControl::NAMES {
            let cc: CongestionControl = name.parse().unwrap();
            let _ = transport_config(cc, true, Some(Duration::from_millis(400)));
        }
    }

    #[tokio::test]
    async fn test_plan_engine_exits_cleanly() {
        assert_eq!(SessionPlanEngine.run_client(session(None)).await, 0);
    }
}
