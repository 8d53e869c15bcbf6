//! Config Service - the interface configuration state machine.
//!
//! A single [`ConfigManager`] task owns the interface state. Remote commands,
//! timer firings and snapshot queries all arrive through one ordered inbox,
//! so only one event is ever processed at a time.

mod dispatcher;
pub mod indicator;

pub use dispatcher::{Backends, ConfigManager, DEFAULT_LINK_LOCAL_RETRY, ManagerSettings};
pub use indicator::{LedPattern, LogIndicator, StatusIndicator, SysfsLed};

use crate::error::ConfigError;
use crate::utils::network::InterfaceConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Configuration status of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Init,
    Request,
    Bound,
    Renew,
    Static,
    Ip4ll,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Init => "init",
            Status::Request => "request",
            Status::Bound => "bound",
            Status::Renew => "renew",
            Status::Static => "static",
            Status::Ip4ll => "ip4ll",
        };
        f.write_str(s)
    }
}

/// State owned by the config manager.
///
/// `config` is set exactly when `status` is `static`, `bound`, `renew` or
/// `ip4ll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceState {
    pub interface: String,
    pub hostname: String,
    pub status: Status,
    pub config: Option<InterfaceConfig>,
}

impl InterfaceState {
    pub fn new(interface: String, hostname: String) -> Self {
        Self {
            interface,
            hostname,
            status: Status::Init,
            config: None,
        }
    }
}

/// Published on every transition, keyed by interface name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusAnnouncement {
    pub interface: String,
    pub status: Status,
    #[serde(flatten)]
    pub config: Option<InterfaceConfig>,
}

impl From<&InterfaceState> for StatusAnnouncement {
    fn from(state: &InterfaceState) -> Self {
        Self {
            interface: state.interface.clone(),
            status: state.status,
            config: state.config.clone(),
        }
    }
}

pub type TimerId = u64;

/// A scheduled one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: TimerId,
    pub after: Duration,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: InterfaceState,
    pub lease_timer: Option<PendingTimer>,
    pub retry_timer: Option<PendingTimer>,
}

type Responder = oneshot::Sender<Result<(), ConfigError>>;

/// Commands that can be sent to the Config Service.
#[derive(Debug)]
pub enum Command {
    StaticPut {
        params: HashMap<String, String>,
        responder: Responder,
    },
    StaticDelete {
        responder: Responder,
    },
    AutoPut {
        params: HashMap<String, String>,
        responder: Responder,
    },
    AutoDelete {
        responder: Responder,
    },
    Snapshot {
        responder: oneshot::Sender<Snapshot>,
    },
    LeaseExpired {
        timer: TimerId,
    },
    LinkLocalRetry {
        timer: TimerId,
    },
}

/// Cloneable handle to a running config manager.
#[derive(Clone)]
pub struct ConfigHandle {
    command_tx: mpsc::Sender<Command>,
}

impl ConfigHandle {
    pub async fn static_put(&self, params: HashMap<String, String>) -> Result<(), ConfigError> {
        self.request(|responder| Command::StaticPut { params, responder })
            .await
    }

    pub async fn static_delete(&self) -> Result<(), ConfigError> {
        self.request(|responder| Command::StaticDelete { responder })
            .await
    }

    pub async fn auto_put(&self, params: HashMap<String, String>) -> Result<(), ConfigError> {
        self.request(|responder| Command::AutoPut { params, responder })
            .await
    }

    pub async fn auto_delete(&self) -> Result<(), ConfigError> {
        self.request(|responder| Command::AutoDelete { responder })
            .await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, ConfigError> {
        let (responder, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Snapshot { responder })
            .await
            .map_err(|_| ConfigError::Unavailable)?;
        rx.await.map_err(|_| ConfigError::Unavailable)
    }

    async fn request(
        &self,
        build: impl FnOnce(Responder) -> Command,
    ) -> Result<(), ConfigError> {
        let (responder, rx) = oneshot::channel();
        self.command_tx
            .send(build(responder))
            .await
            .map_err(|_| ConfigError::Unavailable)?;
        rx.await.map_err(|_| ConfigError::Unavailable)?
    }
}

/// A started config manager.
pub struct ConfigService {
    pub handle: ConfigHandle,
    pub announcements: broadcast::Receiver<StatusAnnouncement>,
    pub task: JoinHandle<()>,
}

/// Spawn a config manager; it resolves the startup configuration before
/// serving its inbox.
///
/// The manager stops once every [`ConfigHandle`] is dropped.
pub fn start(settings: ManagerSettings, backends: Backends) -> ConfigService {
    let (command_tx, command_rx) = mpsc::channel::<Command>(32);
    let (announce_tx, announcements) = broadcast::channel::<StatusAnnouncement>(32);

    let manager = ConfigManager::new(
        settings,
        backends,
        command_rx,
        command_tx.downgrade(),
        announce_tx,
    );
    let task = tokio::spawn(async move {
        manager.run().await;
    });

    ConfigService {
        handle: ConfigHandle { command_tx },
        announcements,
        task,
    }
}
