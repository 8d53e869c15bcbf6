//! ipconfd - interface configuration daemon.
//!
//! Static, then DHCP, then IPv4 link-local, with a remote override.

use anyhow::{Result, bail};
use clap::Parser;
use ipconfd::utils::network::{InterfaceConfig, is_valid_netmask};
use ipconfd::{Config, initialize_services};
use log::{error, info, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interface configuration daemon.
#[derive(Parser)]
#[command(name = "ipconfd")]
#[command(version = VERSION)]
#[command(about = "Keeps one interface configured: static, DHCP or link-local")]
struct Args {
    /// Interface to manage
    #[arg(long, default_value = "eth0")]
    interface: String,

    /// Hostname sent to the DHCP server (defaults to the system hostname)
    #[arg(long)]
    hostname: Option<String>,

    /// Static address to use instead of DHCP
    #[arg(long)]
    ip: Option<Ipv4Addr>,

    /// Netmask for --ip
    #[arg(long, alias = "mask")]
    subnet: Option<Ipv4Addr>,

    /// Default router for --ip
    #[arg(long)]
    router: Option<Ipv4Addr>,

    /// DNS servers for --ip, comma separated
    #[arg(long, value_delimiter = ',')]
    dns: Vec<Ipv4Addr>,

    /// File holding the persisted static configuration
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// DHCP client program
    #[arg(long)]
    dhcp_client: Option<PathBuf>,

    /// Script passed to the DHCP client
    #[arg(long)]
    dhcp_script: Option<PathBuf>,

    /// Seconds between DHCP probes while on a link-local address
    #[arg(long)]
    ip4ll_retry_secs: Option<u64>,

    /// UDP address to accept remote-control commands on
    #[arg(long)]
    remote_listen: Option<SocketAddr>,

    /// LED class device used as status light
    #[arg(long)]
    led: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    info!("ipconfd v{} starting", VERSION);

    let args = Args::parse();
    let config = build_config(args)?;

    let services = initialize_services(config).await?;

    // Log every status announcement
    let mut announcements = services.announcements;
    tokio::spawn(async move {
        loop {
            match announcements.recv().await {
                Ok(announcement) => match serde_json::to_string(&announcement) {
                    Ok(json) => info!("Status: {}", json),
                    Err(e) => warn!("Status: unserializable announcement: {}", e),
                },
                Err(RecvError::Lagged(n)) => warn!("Status: missed {} announcements", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut manager = services.manager;

    info!("ipconfd ready, entering main loop");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
        result = &mut manager => {
            if let Err(e) = result {
                error!("Config manager stopped: {}", e);
            }
        }
    }

    if let Some(remote) = services.remote {
        remote.abort();
    }

    info!("ipconfd shutting down");
    Ok(())
}

fn build_config(args: Args) -> Result<Config> {
    let mut config = Config {
        interface: args.interface,
        ..Config::default()
    };

    if let Some(hostname) = args.hostname {
        config.hostname = hostname;
    }
    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }
    if let Some(dhcp_client) = args.dhcp_client {
        config.dhcp_client = dhcp_client;
    }
    if let Some(secs) = args.ip4ll_retry_secs {
        config.link_local_retry = Duration::from_secs(secs);
    }
    config.dhcp_script = args.dhcp_script;
    config.remote_listen = args.remote_listen;
    config.led = args.led;

    config.seed = match (args.ip, args.subnet) {
        (Some(_), Some(mask)) if !is_valid_netmask(mask) => {
            bail!("--subnet {} is not a netmask", mask)
        }
        (Some(ip), Some(mask)) => Some(
            InterfaceConfig::new(ip, mask)
                .with_router(args.router)
                .with_dns(args.dns),
        ),
        (Some(_), None) => bail!("--ip requires --subnet"),
        (None, _) => {
            if args.router.is_some() || !args.dns.is_empty() {
                warn!("--router/--dns ignored without --ip");
            }
            None
        }
    };

    Ok(config)
}
