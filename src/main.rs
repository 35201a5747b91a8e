//! Slipstream - QUIC-over-DNS covert channel
//!
//! Command-line front end: loads configuration, validates resolver targets
//! and hands the session to the transport engine.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use slipstream::{run_client, run_server, ClientConfig, ServerConfig, SessionPlanEngine, SystemResolver};

#[derive(Parser)]
#[command(name = "slipstream")]
#[command(version)]
#[command(about = "A high-performance covert channel over DNS", long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as a client (local TCP listener tunnelled through resolvers)
    Client(ClientArgs),

    /// Run as a server (authoritative DNS endpoint for the tunnel domain)
    Server(ServerArgs),
}

#[derive(Args)]
struct ClientArgs {
    /// Local TCP port to accept connections on [default: 5201]
    #[arg(short, long)]
    listen_port: Option<u16>,

    /// Resolver address, repeatable (host, host:port or [ipv6]:port)
    #[arg(short, long = "resolver", value_name = "ADDR")]
    resolvers: Vec<String>,

    /// Congestion control algorithm [default: dcubic]
    #[arg(long)]
    congestion_control: Option<String>,

    /// Enable generic segmentation offload
    #[arg(short, long)]
    gso: bool,

    /// Tunnel domain
    #[arg(short, long)]
    domain: Option<String>,

    /// Keep-alive interval in milliseconds, 0 disables [default: 400]
    #[arg(short, long)]
    keep_alive_interval: Option<u64>,
}

#[derive(Args)]
struct ServerArgs {
    /// UDP port for the DNS listener [default: 53]
    #[arg(short = 'l', long)]
    dns_listen_port: Option<u16>,

    /// Address tunnelled streams are forwarded to [default: 127.0.0.1:5201]
    #[arg(short, long)]
    target_address: Option<String>,

    /// Tunnel domain
    #[arg(short, long)]
    domain: Option<String>,

    /// Congestion control algorithm [default: slipstream_server]
    #[arg(long)]
    congestion_control: Option<String>,

    /// Enable generic segmentation offload
    #[arg(short, long)]
    gso: bool,

    /// Keep-alive interval in milliseconds, 0 disables [default: 400]
    #[arg(short, long)]
    keep_alive_interval: Option<u64>,
}

impl ClientArgs {
    fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if !self.resolvers.is_empty() {
            config.resolvers = self.resolvers;
        }
        if let Some(cc) = self.congestion_control {
            config.congestion_control = cc;
        }
        config.gso |= self.gso;
        if let Some(domain) = self.domain {
            config.domain = domain;
        }
        if let Some(interval) = self.keep_alive_interval {
            config.keep_alive_interval = interval;
        }
        config
    }
}

impl ServerArgs {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.dns_listen_port {
            config.dns_listen_port = port;
        }
        if let Some(target) = self.target_address {
            config.target_address = target;
        }
        if let Some(domain) = self.domain {
            config.domain = domain;
        }
        if let Some(cc) = self.congestion_control {
            config.congestion_control = cc;
        }
        config.gso |= self.gso;
        if let Some(interval) = self.keep_alive_interval {
            config.keep_alive_interval = interval;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let code = match cli.command {
        Commands::Client(args) => {
            let config = match &cli.config {
                Some(path) => ClientConfig::from_file(path)
                    .with_context(|| format!("Failed to load client config {}", path.display()))?,
                None => ClientConfig::default(),
            };
            run_client(&args.apply(config), &SystemResolver, &SessionPlanEngine).await
        }
        Commands::Server(args) => {
            let config = match &cli.config {
                Some(path) => ServerConfig::from_file(path)
                    .with_context(|| format!("Failed to load server config {}", path.display()))?,
                None => ServerConfig::default(),
            };
            run_server(&args.apply(config), &SystemResolver, &SessionPlanEngine).await
        }
    };

    std::process::exit(code);
}
