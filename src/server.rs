//! Server bootstrap
//!
//! The server answers DNS queries for the tunnel domain and forwards
//! tunnelled streams to a target address. Its paths run the unthrottled
//! congestion controller unless configured otherwise.

use crate::config::{ServerConfig, DEFAULT_LISTEN_PORT};
use crate::congestion::CongestionControl;
use crate::resolver::{parse_endpoint, resolve, NameResolver, ResolverError};
use crate::transport::{ServerSession, TransportEngine};
use crate::SlipstreamError;
use log::{error, info, warn};

/// Turn a server configuration into a validated session
pub async fn prepare_server_session<R>(config: &ServerConfig, resolver: &R) -> Result<ServerSession, SlipstreamError>
where
    R: NameResolver + ?Sized,
{
    config.validate().map_err(SlipstreamError::InvalidConfig)?;

    let congestion_control: CongestionControl = config.congestion_control.parse()?;
    if congestion_control != CongestionControl::Unthrottled {
        warn!(
            "Server paths will use {} instead of {}; the DNS carrier already paces traffic",
            congestion_control,
            CongestionControl::Unthrottled
        );
    }

    let endpoint = parse_endpoint(&config.target_address, DEFAULT_LISTEN_PORT).map_err(|source| ResolverError::Parse {
        raw: config.target_address.clone(),
        source,
    })?;
    let (target, _) = resolve(resolver, &endpoint).await.map_err(ResolverError::from)?;

    Ok(ServerSession {
        dns_listen_port: config.dns_listen_port,
        target,
        domain: config.domain.clone(),
        congestion_control,
        gso: config.gso,
        keep_alive: config.keep_alive(),
    })
}

/// Run the tunnel server and return the process exit status
pub async fn run_server<R, E>(config: &ServerConfig, resolver: &R, engine: &E) -> i32
where
    R: NameResolver + ?Sized,
    E: TransportEngine + ?Sized,
{
    let session = match prepare_server_session(config, resolver).await {
        Ok(session) => session,
        Err(e) => {
            error!("Server error: {}", e);
            return e.exit_code();
        }
    };

    info!(
        "Starting slipstream server on DNS port {} for {} -> {}",
        session.dns_listen_port, session.domain, session.target
    );

    engine.run_server(session).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SystemResolver;

    fn config() -> ServerConfig {
        ServerConfig {
            domain: "tunnel.example.com".into(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_default_server_session() {
        let session = prepare_server_session(&config(), &SystemResolver).await.unwrap();
        assert_eq!(session.dns_listen_port, 53);
        assert_eq!(session.target, "127.0.0.1:5201".parse().unwrap());
        assert_eq!(session.congestion_control, CongestionControl::Unthrottled);
    }

    #[tokio::test]
    async fn test_target_without_port_uses_default() {
        let config = ServerConfig {
            target_address: "[::1]".into(),
            ..config()
        };
        let session = prepare_server_session(&config, &SystemResolver).await.unwrap();
        assert_eq!(session.target, "[::1]:5201".parse().unwrap());
    }

    #[tokio::test]
    async fn test_bad_target_rejected() {
        let config = ServerConfig {
            target_address: "127.0.0.1:65536".into(),
            ..config()
        };
        let err = prepare_server_session(&config, &SystemResolver).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(matches!(err, SlipstreamError::Resolver(ResolverError::Parse { .. })));
    }
}
