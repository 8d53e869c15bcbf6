//! Test helpers for ipconfd integration tests.

use ipconfd::services::config::{
    self, Backends, ConfigHandle, ManagerSettings, StatusAnnouncement,
};
use ipconfd::test_util::{FakeDhcp, MemoryStore, RecordingApplier, RecordingIndicator};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
pub const RETRY: Duration = Duration::from_secs(60);

pub fn bound(ip: &str, lease: u64) -> String {
    format!(
        "udhcpc: started\n[\nstatus='deconfig'\ninterface='eth0'\n]\n[\nstatus='bound'\ninterface='eth0'\nip='{ip}'\nsubnet='255.255.255.0'\nrouter='10.0.0.1'\ndns='10.0.0.1'\nlease='{lease}'\n]\n"
    )
}

/// A config manager wired to in-memory collaborators.
pub struct TestDaemon {
    pub handle: ConfigHandle,
    pub announcements: broadcast::Receiver<StatusAnnouncement>,
    pub dhcp: FakeDhcp,
    pub applier: RecordingApplier,
    pub indicator: RecordingIndicator,
    pub store: MemoryStore,
    pub task: JoinHandle<()>,
}

impl TestDaemon {
    pub fn start(dhcp: FakeDhcp, store: MemoryStore) -> Self {
        let applier = RecordingApplier::default();
        let indicator = RecordingIndicator::default();

        let service = config::start(
            ManagerSettings {
                interface: "eth0".to_string(),
                hostname: "sensor-7".to_string(),
                mac: MAC,
                seed: None,
                link_local_retry: RETRY,
            },
            Backends {
                dhcp: Box::new(dhcp.clone()),
                applier: Box::new(applier.clone()),
                indicator: Box::new(indicator.clone()),
                store: Box::new(store.clone()),
            },
        );

        Self {
            handle: service.handle,
            announcements: service.announcements,
            dhcp,
            applier,
            indicator,
            store,
            task: service.task,
        }
    }

    /// Collect announcements published so far.
    pub fn drain_announcements(&mut self) -> Vec<StatusAnnouncement> {
        let mut out = Vec::new();
        while let Ok(a) = self.announcements.try_recv() {
            out.push(a);
        }
        out
    }
}
