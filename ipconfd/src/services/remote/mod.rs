//! Remote Service - maps decoded remote-control commands onto the config
//! manager.

mod listener;

pub use listener::{decode, serve};

use super::config::ConfigHandle;
use crate::error::ConfigError;
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Put,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Put => f.write_str("put"),
            Verb::Delete => f.write_str("delete"),
        }
    }
}

/// Resources the router knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    StaticIp,
    AutoIp,
}

impl Resource {
    /// Map a wire resource (`sys/ip/static`, `/sys/ip/auto`) or an internal
    /// name (`static-ip`, `auto-ip`).
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().trim_start_matches('/') {
            "sys/ip/static" | "static-ip" => Some(Resource::StaticIp),
            "sys/ip/auto" | "auto-ip" => Some(Resource::AutoIp),
            _ => None,
        }
    }
}

/// A decoded remote-control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub verb: Verb,
    pub resource: String,
    pub parameters: HashMap<String, String>,
}

/// What the router did with a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored,
    Rejected(ConfigError),
}

/// Routes remote commands to a config manager.
#[derive(Clone)]
pub struct RemoteCommandRouter {
    config: ConfigHandle,
}

impl RemoteCommandRouter {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    pub async fn dispatch(&self, cmd: RemoteCommand) -> Outcome {
        let Some(resource) = Resource::from_wire(&cmd.resource) else {
            warn!("Remote: Ignoring {} {}", cmd.verb, cmd.resource);
            return Outcome::Ignored;
        };

        info!("Remote: {} {}", cmd.verb, cmd.resource);
        let result = match (cmd.verb, resource) {
            (Verb::Put, Resource::StaticIp) => self.config.static_put(cmd.parameters).await,
            (Verb::Put, Resource::AutoIp) => self.config.auto_put(cmd.parameters).await,
            (Verb::Delete, Resource::StaticIp) => self.config.static_delete().await,
            (Verb::Delete, Resource::AutoIp) => self.config.auto_delete().await,
        };

        match result {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                warn!("Remote: {} {} rejected: {}", cmd.verb, cmd.resource, e);
                Outcome::Rejected(e)
            }
        }
    }
}
