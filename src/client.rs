//! Client bootstrap
//!
//! Validates the client configuration, resolves the resolver list and hands
//! the resulting session to the transport engine.

use crate::config::ClientConfig;
use crate::congestion::CongestionControl;
use crate::resolver::{build_address_set, NameResolver};
use crate::transport::{ClientSession, TransportEngine};
use crate::SlipstreamError;
use log::{error, info};

/// Turn a client configuration into a validated session
pub async fn prepare_client_session<R>(config: &ClientConfig, resolver: &R) -> Result<ClientSession, SlipstreamError>
where
    R: NameResolver + ?Sized,
{
    config.validate().map_err(SlipstreamError::InvalidConfig)?;

    let congestion_control: CongestionControl = config.congestion_control.parse()?;
    let resolvers = build_address_set(resolver, &config.resolvers).await?;

    info!(
        "{} {} resolver(s) for domain {}",
        resolvers.len(),
        resolvers.family(),
        config.domain
    );

    Ok(ClientSession {
        listen_port: config.listen_port,
        resolvers,
        domain: config.domain.clone(),
        congestion_control,
        gso: config.gso,
        keep_alive: config.keep_alive(),
    })
}

/// Run the tunnel client and return the process exit status
///
/// Configuration and resolver errors are logged and map to exit status 1;
/// otherwise the engine's own status is returned unchanged.
pub async fn run_client<R, E>(config: &ClientConfig, resolver: &R, engine: &E) -> i32
where
    R: NameResolver + ?Sized,
    E: TransportEngine + ?Sized,
{
    let session = match prepare_client_session(config, resolver).await {
        Ok(session) => session,
        Err(e) => {
            error!("Client error: {}", e);
            return e.exit_code();
        }
    };

    info!(
        "Starting slipstream client on port {} (congestion control: {}, keep-alive: {})",
        session.listen_port,
        session.congestion_control,
        session
            .keep_alive
            .map(|d| humantime::format_duration(d).to_string())
            .unwrap_or_else(|| "off".to_string())
    );

    engine.run_client(session).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{AddressFamily, ConfigError, ResolverError, SystemResolver};
    use crate::transport::ServerSession;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine recording the session it was given
    #[derive(Default)]
    struct RecordingEngine {
        status: i32,
        seen: Mutex<Option<ClientSession>>,
    }

    #[async_trait]
    impl TransportEngine for RecordingEngine {
        async fn run_client(&self, session: ClientSession) -> i32 {
            *self.seen.lock().unwrap() = Some(session);
            self.status
        }

        async fn run_server(&self, _session: ServerSession) -> i32 {
            unreachable!("client bootstrap never starts a server")
        }
    }

    fn config(resolvers: &[&str]) -> ClientConfig {
        ClientConfig {
            domain: "tunnel.example.com".into(),
            resolvers: resolvers.iter().map(|r| r.to_string()).collect(),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_session_carries_config() {
        let session = prepare_client_session(&config(&["1.1.1.1", "8.8.8.8:53"]), &SystemResolver)
            .await
            .unwrap();

        assert_eq!(session.listen_port, 5201);
        assert_eq!(session.resolvers.family(), AddressFamily::Ipv4);
        assert_eq!(session.resolvers.len(), 2);
        assert_eq!(session.congestion_control, CongestionControl::DelayCubic);
        assert_eq!(session.keep_alive, Some(std::time::Duration::from_millis(400)));
    }

    #[tokio::test]
    async fn test_mixed_families_rejected() {
        let err = prepare_client_session(&config(&["1.1.1.1", "[2001:db8::1]:53"]), &SystemResolver)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SlipstreamError::Resolver(ResolverError::Config(ConfigError::MixedFamily))
        ));
    }

    #[tokio::test]
    async fn test_engine_status_propagates() {
        let engine = RecordingEngine {
            status: 7,
            ..Default::default()
        };
        let code = run_client(&config(&["[2001:db8::1]:5353"]), &SystemResolver, &engine).await;
        assert_eq!(code, 7);

        let seen = engine.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.local_bind_addr(), "[::]:0".parse().unwrap());
    }

    #[tokio::test]
    async fn test_validation_errors_exit_with_one() {
        let engine = RecordingEngine::default();

        let mut no_domain = config(&["1.1.1.1"]);
        no_domain.domain.clear();
        assert_eq!(run_client(&no_domain, &SystemResolver, &engine).await, 1);

        assert_eq!(run_client(&config(&[]), &SystemResolver, &engine).await, 1);
        assert_eq!(run_client(&config(&["1.1.1.1:0"]), &SystemResolver, &engine).await, 1);

        let mut bad_cc = config(&["1.1.1.1"]);
        bad_cc.congestion_control = "vegas".into();
        assert_eq!(run_client(&bad_cc, &SystemResolver, &engine).await, 1);

        assert!(engine.seen.lock().unwrap().is_none());
    }
}
