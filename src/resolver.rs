//! Resolver target acquisition and validation
//!
//! Turns user-supplied resolver strings (`1.1.1.1`, `dns.example:5353`,
//! `[2001:db8::1]:53`) into resolved socket addresses and checks that the
//! whole list shares one address family. The tunnel client binds a single
//! local socket, so a list mixing IPv4 and IPv6 resolvers cannot be served.

use async_trait::async_trait;
use log::{debug, error};
use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Port used when a resolver string carries none
pub const DEFAULT_RESOLVER_PORT: u16 = 53;

/// Longest accepted host token, in bytes
pub const MAX_HOST_LEN: usize = 255;

/// Address family of a resolved endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Family of a socket address
    pub fn of(addr: &SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(_) => AddressFamily::Ipv4,
            SocketAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Unspecified local address of this family
    pub fn unspecified(self) -> IpAddr {
        match self {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Malformed resolver string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing closing ']' in '{0}'")]
    UnclosedBracket(String),

    #[error("'{0}' is not an IPv6 literal")]
    InvalidIpv6Literal(String),

    #[error("unexpected characters after ']' in '{0}'")]
    TrailingCharacters(String),

    #[error("empty host in '{0}'")]
    EmptyHost(String),

    #[error("host is {len} bytes long, limit is {}", MAX_HOST_LEN)]
    HostTooLong { len: usize },

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("port {0} is outside 1-65535")]
    PortOutOfRange(u64),
}

/// Host that could not be turned into a usable address
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("cannot resolve '{host}' port {port}: {source}")]
    Lookup {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("'{host}' port {port} resolved to no addresses")]
    NoAddress { host: String, port: u16 },

    #[error("'{host}' resolved to {found} but the literal requires {expected}")]
    FamilyMismatch {
        host: String,
        expected: AddressFamily,
        found: AddressFamily,
    },
}

/// Structural problem with the resolver list as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one resolver is required")]
    Empty,

    #[error("cannot mix IPv4 and IPv6 resolver addresses")]
    MixedFamily,
}

impl ConfigError {
    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Empty => "empty",
            ConfigError::MixedFamily => "mixed-family",
        }
    }
}

/// Any failure while building a resolver address set
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("invalid resolver address '{raw}': {source}")]
    Parse {
        raw: String,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parsed, not yet resolved, resolver string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEndpoint {
    host: String,
    port: u16,
    family_hint: Option<AddressFamily>,
}

impl ResolverEndpoint {
    fn new(host: &str, port: u16, family_hint: Option<AddressFamily>, raw: &str) -> Result<Self, ParseError> {
        if host.is_empty() {
            return Err(ParseError::EmptyHost(raw.to_string()));
        }
        if host.len() > MAX_HOST_LEN {
            return Err(ParseError::HostTooLong { len: host.len() });
        }

        Ok(Self {
            host: host.to_string(),
            port,
            family_hint,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Family implied by the syntax alone (bracketed literals are IPv6)
    pub fn family_hint(&self) -> Option<AddressFamily> {
        self.family_hint
    }
}

impl fmt::Display for ResolverEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.family_hint == Some(AddressFamily::Ipv6) {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(text: &str) -> Result<u16, ParseError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidPort(text.to_string()));
    }
    let value: u64 = text
        .parse()
        .map_err(|_| ParseError::InvalidPort(text.to_string()))?;
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ParseError::PortOutOfRange(value)),
    }
}

/// Split a resolver string into host and port
///
/// Accepts `host`, `host:port`, a bare IPv6 literal, `[v6]` and `[v6]:port`.
/// A missing port falls back to `default_port`.
pub fn parse_endpoint(raw: &str, default_port: u16) -> Result<ResolverEndpoint, ParseError> {
    if default_port == 0 {
        return Err(ParseError::PortOutOfRange(0));
    }

    if let Some(rest) = raw.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| ParseError::UnclosedBracket(raw.to_string()))?;
        let host = &rest[..close];
        let tail = &rest[close + 1..];

        let port = if tail.is_empty() {
            default_port
        } else if let Some(port) = tail.strip_prefix(':') {
            parse_port(port)?
        } else {
            return Err(ParseError::TrailingCharacters(raw.to_string()));
        };

        let endpoint = ResolverEndpoint::new(host, port, Some(AddressFamily::Ipv6), raw)?;
        if host.parse::<Ipv6Addr>().is_err() {
            return Err(ParseError::InvalidIpv6Literal(host.to_string()));
        }
        return Ok(endpoint);
    }

    match raw.rsplit_once(':') {
        // More than one colon: an unbracketed IPv6 literal, which cannot carry a port
        Some((host, _)) if host.contains(':') => ResolverEndpoint::new(raw, default_port, None, raw),
        Some((host, port)) => ResolverEndpoint::new(host, parse_port(port)?, None, raw),
        None => ResolverEndpoint::new(raw, default_port, None, raw),
    }
}

/// Name resolution backend
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Look up all socket addresses for `host`
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl NameResolver for SystemResolver {
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }
        Ok(tokio::net::lookup_host((host, port)).await?.collect())
    }
}

/// A resolver endpoint together with the address it resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverAddress {
    /// The resolver string as the user wrote it
    pub raw: String,
    pub addr: SocketAddr,
}

impl ResolverAddress {
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.addr)
    }
}

/// Resolve a parsed endpoint to exactly one socket address
pub async fn resolve<R>(resolver: &R, endpoint: &ResolverEndpoint) -> Result<(SocketAddr, AddressFamily), ResolutionError>
where
    R: NameResolver + ?Sized,
{
    let host = endpoint.host();
    let port = endpoint.port();

    let addrs = resolver
        .lookup(host, port)
        .await
        .map_err(|source| ResolutionError::Lookup {
            host: host.to_string(),
            port,
            source,
        })?;

    let addr = addrs.into_iter().next().ok_or_else(|| ResolutionError::NoAddress {
        host: host.to_string(),
        port,
    })?;
    let family = AddressFamily::of(&addr);

    if let Some(expected) = endpoint.family_hint() {
        if expected != family {
            return Err(ResolutionError::FamilyMismatch {
                host: host.to_string(),
                expected,
                found: family,
            });
        }
    }

    debug!("Resolver {} -> {} ({})", endpoint, addr, family);
    Ok((addr, family))
}

/// Ordered, non-empty, single-family list of resolver addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverAddressSet {
    family: AddressFamily,
    addrs: Vec<ResolverAddress>,
}

impl ResolverAddressSet {
    /// Validate already-resolved addresses, keeping their order
    pub fn from_addresses(addrs: Vec<ResolverAddress>) -> Result<Self, ConfigError> {
        let family = addrs.first().ok_or(ConfigError::Empty)?.family();
        if addrs.iter().any(|a| a.family() != family) {
            return Err(ConfigError::MixedFamily);
        }
        Ok(Self { family, addrs })
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// Always false: an empty set cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolverAddress> {
        self.addrs.iter()
    }

    /// Socket addresses in preference order
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        self.addrs.iter().map(|a| a.addr).collect()
    }

    /// Local wildcard address of the set's family, ephemeral port
    pub fn local_bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.family.unspecified(), 0)
    }
}

impl<'a> IntoIterator for &'a ResolverAddressSet {
    type Item = &'a ResolverAddress;
    type IntoIter = std::slice::Iter<'a, ResolverAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Parse and resolve every resolver string, in order
///
/// Fails on the first bad entry; no partial set is ever returned.
pub async fn build_address_set<R, S>(resolver: &R, raw_list: &[S]) -> Result<ResolverAddressSet, ResolverError>
where
    R: NameResolver + ?Sized,
    S: AsRef<str>,
{
    if raw_list.is_empty() {
        error!("No resolver addresses configured");
        return Err(ConfigError::Empty.into());
    }

    let mut addrs = Vec::with_capacity(raw_list.len());
    for raw in raw_list {
        let raw = raw.as_ref();
        let endpoint = parse_endpoint(raw, DEFAULT_RESOLVER_PORT).map_err(|source| {
            error!("Invalid resolver address: {}", raw);
            ResolverError::Parse {
                raw: raw.to_string(),
                source,
            }
        })?;
        let (addr, _) = resolve(resolver, &endpoint).await.map_err(|e| {
            error!("{}", e);
            e
        })?;
        addrs.push(ResolverAddress {
            raw: raw.to_string(),
            addr,
        });
    }

    ResolverAddressSet::from_addresses(addrs).map_err(|e| {
        error!("{}", e);
        e.into()
    })
}
