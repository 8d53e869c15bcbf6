//! ipconfd - keeps one network interface configured without an administrator.
//!
//! Addressing is resolved through a priority chain:
//!
//! 1. a persisted static configuration (or one given at startup),
//! 2. DHCP through an external `udhcpc`-compatible client,
//! 3. a deterministic IPv4 link-local address in `169.254.0.0/16`.
//!
//! ## Architecture
//!
//! - **Config Service**: single actor owning the interface state machine
//! - **Remote Service**: text command router for set/clear static IP
//! - **Network utils**: link-local derivation, DHCP output parsing, netlink

pub mod error;
pub mod services;
pub mod store;
pub mod test_util;
pub mod utils;

use crate::services::config::{
    self as config_service, Backends, ConfigHandle, LogIndicator, ManagerSettings,
    StatusAnnouncement, StatusIndicator, SysfsLed,
};
use crate::services::remote::{self, RemoteCommandRouter};
use crate::store::JsonFileStore;
use crate::utils::network::{Interface, InterfaceConfig, NetlinkApplier, UdhcpcClient};
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Configuration for the daemon.
pub struct Config {
    /// Interface to manage.
    pub interface: String,
    /// Hostname sent as DHCP client identifier.
    pub hostname: String,
    /// Static override given at startup.
    pub seed: Option<InterfaceConfig>,
    /// Where remote static configs are persisted.
    pub state_file: PathBuf,
    /// DHCP client program.
    pub dhcp_client: PathBuf,
    /// Script handed to the DHCP client (`-s`).
    pub dhcp_script: Option<PathBuf>,
    /// Re-probe interval while on a link-local address.
    pub link_local_retry: Duration,
    /// UDP address for remote-control commands (disabled if None).
    pub remote_listen: Option<SocketAddr>,
    /// LED class device for the status light (log only if None).
    pub led: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "ipconfd".to_string());

        Self {
            interface: "eth0".to_string(),
            hostname,
            seed: None,
            state_file: PathBuf::from("/var/lib/ipconfd/static.json"),
            dhcp_client: PathBuf::from("udhcpc"),
            dhcp_script: None,
            link_local_retry: config_service::DEFAULT_LINK_LOCAL_RETRY,
            remote_listen: None,
            led: None,
        }
    }
}

/// Handles for the running services.
pub struct Services {
    pub config: ConfigHandle,
    pub announcements: broadcast::Receiver<StatusAnnouncement>,
    pub manager: JoinHandle<()>,
    pub remote: Option<JoinHandle<()>>,
}

/// Initialize all services.
pub async fn initialize_services(config: Config) -> anyhow::Result<Services> {
    info!("Initializing services for {}", config.interface);

    let iface = Interface::lookup(&config.interface)?;
    info!(
        "Interface {} index {} mac {}",
        iface.name,
        iface.index,
        iface
            .mac
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    );

    let indicator: Box<dyn StatusIndicator> = match &config.led {
        Some(name) => Box::new(SysfsLed::new(name)),
        None => Box::new(LogIndicator),
    };
    let store = JsonFileStore::new(config.state_file);
    info!("Static config store at {}", store.path().display());

    let backends = Backends {
        dhcp: Box::new(UdhcpcClient::new(config.dhcp_client, config.dhcp_script)),
        applier: Box::new(NetlinkApplier::new().await?),
        indicator,
        store: Box::new(store),
    };

    let settings = ManagerSettings {
        interface: iface.name,
        hostname: config.hostname,
        mac: iface.mac,
        seed: config.seed,
        link_local_retry: config.link_local_retry,
    };

    // Initialize Config Service
    let service = config_service::start(settings, backends);
    info!("Config Service initialized");

    // Initialize Remote Service
    let remote = match config.remote_listen {
        Some(addr) => {
            let socket = UdpSocket::bind(addr).await?;
            let router = RemoteCommandRouter::new(service.handle.clone());
            info!("Remote Service initialized");
            Some(tokio::spawn(remote::serve(socket, router)))
        }
        None => None,
    };

    Ok(Services {
        config: service.handle,
        announcements: service.announcements,
        manager: service.task,
        remote,
    })
}
