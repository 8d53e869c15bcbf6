//! In-memory collaborators for exercising the config manager without a
//! kernel, a DHCP server or a status light.

use crate::error::{NetworkError, StoreError};
use crate::services::config::{LedPattern, StatusIndicator};
use crate::store::StaticConfigStore;
use crate::utils::network::{DhcpClient, InterfaceApplier, InterfaceConfig, LeaseRecord};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeDhcpState {
    responses: VecDeque<String>,
    calls: usize,
    fail: bool,
    delay: Duration,
}

/// DHCP client replaying scripted client output, one entry per attempt.
/// Once the script runs out every attempt yields no lease.
#[derive(Clone, Default)]
pub struct FakeDhcp {
    inner: Arc<Mutex<FakeDhcpState>>,
}

impl FakeDhcp {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fake = Self::default();
        for output in responses {
            fake.push(output);
        }
        fake
    }

    /// A client whose program cannot be started.
    pub fn failing() -> Self {
        let fake = Self::default();
        fake.inner.lock().unwrap().fail = true;
        fake
    }

    /// Make every attempt take `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().delay = delay;
        self
    }

    pub fn push(&self, output: impl Into<String>) {
        self.inner.lock().unwrap().responses.push_back(output.into());
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }
}

#[async_trait]
impl DhcpClient for FakeDhcp {
    async fn request_lease(
        &self,
        _interface: &str,
        _hostname: &str,
    ) -> Result<LeaseRecord, NetworkError> {
        let delay = self.inner.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.lock().unwrap();
        state.calls += 1;
        if state.fail {
            return Err(NetworkError::DhcpSpawn {
                program: "fake-udhcpc".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
            });
        }
        let output = state.responses.pop_front().unwrap_or_default();
        Ok(LeaseRecord::parse(&output))
    }
}

#[derive(Default)]
struct ApplierState {
    applied: Vec<(String, InterfaceConfig)>,
    fail: bool,
}

/// Applier that records every configuration it is asked to apply.
#[derive(Clone, Default)]
pub struct RecordingApplier {
    inner: Arc<Mutex<ApplierState>>,
}

impl RecordingApplier {
    pub fn applied(&self) -> Vec<(String, InterfaceConfig)> {
        self.inner.lock().unwrap().applied.clone()
    }

    /// Report a netlink failure on every subsequent apply.
    pub fn fail(&self, fail: bool) {
        self.inner.lock().unwrap().fail = fail;
    }
}

#[async_trait]
impl InterfaceApplier for RecordingApplier {
    async fn apply(&self, interface: &str, config: &InterfaceConfig) -> Result<(), NetworkError> {
        let mut state = self.inner.lock().unwrap();
        state.applied.push((interface.to_string(), config.clone()));
        if state.fail {
            return Err(NetworkError::NetlinkError("Operation not permitted".to_string()));
        }
        Ok(())
    }
}

/// Indicator that records the patterns it was asked to show.
#[derive(Clone, Default)]
pub struct RecordingIndicator {
    patterns: Arc<Mutex<Vec<LedPattern>>>,
}

impl RecordingIndicator {
    pub fn patterns(&self) -> Vec<LedPattern> {
        self.patterns.lock().unwrap().clone()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn show(&self, pattern: LedPattern) {
        self.patterns.lock().unwrap().push(pattern);
    }
}

/// Static config store kept in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    config: Arc<Mutex<Option<InterfaceConfig>>>,
}

impl MemoryStore {
    pub fn with(config: InterfaceConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(Some(config))),
        }
    }

    pub fn current(&self) -> Option<InterfaceConfig> {
        self.config.lock().unwrap().clone()
    }
}

#[async_trait]
impl StaticConfigStore for MemoryStore {
    async fn load(&self) -> Result<Option<InterfaceConfig>, StoreError> {
        Ok(self.current())
    }

    async fn save(&self, config: &InterfaceConfig) -> Result<(), StoreError> {
        *self.config.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.config.lock().unwrap() = None;
        Ok(())
    }
}
