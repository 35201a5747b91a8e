//! Slipstream: bootstrap layer for a QUIC-over-DNS covert channel
//!
//! Slipstream tunnels a QUIC connection through DNS queries and responses.
//! The tunnel itself runs inside an external transport engine; this crate
//! prepares everything that engine is handed.
//!
//! ## Features
//!
//! - **Resolver targets**: parse `host`, `host:port` and `[v6]:port` resolver
//!   strings, resolve them, and enforce a single address family per run
//! - **Unthrottled server paths**: a congestion controller that keeps the
//!   window open, leaving pacing to the DNS query/response cadence
//! - **Algorithm selection**: `newreno`, `cubic`, `dcubic`, `bbr` and
//!   `slipstream_server`, each backed by a quinn controller factory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slipstream::{run_client, ClientConfig, SessionPlanEngine, SystemResolver};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig {
//!         domain: "tunnel.example.com".into(),
//!         resolvers: vec!["1.1.1.1".into(), "8.8.8.8:53".into()],
//!         ..ClientConfig::default()
//!     };
//!
//!     let code = run_client(&config, &SystemResolver, &SessionPlanEngine).await;
//!     std::process::exit(code);
//! }
//! ```
//!
//! ### As a Command-Line Tool
//!
//! ```bash
//! slipstream client --domain tunnel.example.com --resolver 1.1.1.1 --resolver 8.8.8.8:53
//! slipstream server --domain tunnel.example.com --target-address 127.0.0.1:5201
//! ```

pub mod client;
pub mod config;
pub mod congestion;
pub mod resolver;
pub mod server;
pub mod transport;

// Re-export core types
pub use client::{prepare_client_session, run_client};
pub use config::{ClientConfig, ServerConfig};
pub use congestion::{
    CongestionAlgorithm, CongestionControl, Notification, Observation, PathCongestion, Unthrottled,
    UnthrottledConfig, UnthrottledController, UnknownCongestionControl,
};
pub use resolver::{
    build_address_set, parse_endpoint, resolve, AddressFamily, ConfigError, NameResolver, ParseError,
    ResolutionError, ResolverAddress, ResolverAddressSet, ResolverEndpoint, ResolverError, SystemResolver,
};
pub use server::{prepare_server_session, run_server};
pub use transport::{ClientSession, ServerSession, SessionPlanEngine, TransportEngine};

/// Slipstream error types
#[derive(Debug, thiserror::Error)]
pub enum SlipstreamError {
    /// Invalid configuration
    #[error("{0}")]
    InvalidConfig(String),

    /// Resolver list could not be turned into targets
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Unknown congestion control algorithm
    #[error(transparent)]
    CongestionControl(#[from] UnknownCongestionControl),
}

impl SlipstreamError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_exit_with_one() {
        let errors = vec![
            SlipstreamError::InvalidConfig("Missing required --domain option".into()),
            SlipstreamError::Resolver(ConfigError::Empty.into()),
            SlipstreamError::CongestionControl(UnknownCongestionControl("vegas".into())),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 1, "{}", err);
        }
    }

    #[test]
    fn test_error_messages() {
        let err = SlipstreamError::from(ResolverError::from(ConfigError::MixedFamily));
        assert_eq!(err.to_string(), "cannot mix IPv4 and IPv6 resolver addresses");
    }
}
