//! Persisted static configuration.
//!
//! A single versioned JSON record. A missing file means "no static
//! override" and is not an error.

use crate::error::StoreError;
use crate::utils::network::{InterfaceConfig, is_valid_netmask};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const RECORD_VERSION: u32 = 1;

/// On-disk static configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStaticConfig {
    pub version: u32,
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    #[serde(default)]
    pub router: Option<Ipv4Addr>,
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,
}

impl From<&InterfaceConfig> for PersistedStaticConfig {
    fn from(config: &InterfaceConfig) -> Self {
        Self {
            version: RECORD_VERSION,
            ip: config.address,
            mask: config.mask,
            router: config.router,
            dns: config.dns.clone(),
        }
    }
}

impl From<PersistedStaticConfig> for InterfaceConfig {
    fn from(record: PersistedStaticConfig) -> Self {
        InterfaceConfig::new(record.ip, record.mask)
            .with_router(record.router)
            .with_dns(record.dns)
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl PersistedStaticConfig {
    pub fn decode(data: &str) -> Result<Self, StoreError> {
        let probe: VersionProbe = serde_json::from_str(data)?;
        if probe.version != RECORD_VERSION {
            return Err(StoreError::Version {
                expected: RECORD_VERSION,
                found: probe.version,
            });
        }
        let record: Self = serde_json::from_str(data)?;
        if !is_valid_netmask(record.mask) {
            return Err(StoreError::Netmask(record.mask));
        }
        Ok(record)
    }
}

/// Storage for the static override.
#[async_trait]
pub trait StaticConfigStore: Send + Sync {
    async fn load(&self) -> Result<Option<InterfaceConfig>, StoreError>;
    async fn save(&self, config: &InterfaceConfig) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file store.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StaticConfigStore for JsonFileStore {
    async fn load(&self) -> Result<Option<InterfaceConfig>, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Store: no static config at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record = PersistedStaticConfig::decode(&data)?;
        Ok(Some(record.into()))
    }

    async fn save(&self, config: &InterfaceConfig) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(&PersistedStaticConfig::from(config))?;

        // Readers only ever see a complete record
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
