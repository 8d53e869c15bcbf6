//! Config Service Dispatcher - the state machine actor.

use super::{
    Command, InterfaceState, LedPattern, PendingTimer, Snapshot, StatusAnnouncement,
    StatusIndicator, Status, TimerId,
};
use crate::error::ConfigError;
use crate::store::StaticConfigStore;
use crate::utils::network::link_local;
use crate::utils::network::{
    DhcpClient, InterfaceApplier, InterfaceConfig, LeaseKey, LeaseRecord, is_valid_netmask,
};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Fixed re-probe interval while on a link-local address.
pub const DEFAULT_LINK_LOCAL_RETRY: Duration = Duration::from_secs(60);

/// Startup settings for one managed interface.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub interface: String,
    pub hostname: String,
    /// Hardware address used for link-local derivation.
    pub mac: [u8; 6],
    /// Static override from the startup configuration.
    pub seed: Option<InterfaceConfig>,
    pub link_local_retry: Duration,
}

/// External collaborators driven by the manager.
pub struct Backends {
    pub dhcp: Box<dyn DhcpClient>,
    pub applier: Box<dyn InterfaceApplier>,
    pub indicator: Box<dyn StatusIndicator>,
    pub store: Box<dyn StaticConfigStore>,
}

/// A DHCP result worth binding to.
struct Lease {
    status: Status,
    config: InterfaceConfig,
    duration: Option<Duration>,
}

impl Lease {
    fn from_record(record: &LeaseRecord) -> Option<Self> {
        if !record.has_lease() {
            return None;
        }
        let status = match record.get(LeaseKey::Status) {
            Some("renew") => Status::Renew,
            _ => Status::Bound,
        };
        let config = record.to_config()?;
        Some(Self {
            status,
            config,
            duration: record.lease_secs().map(Duration::from_secs),
        })
    }
}

/// Config Manager.
/// Owns the interface state and processes one event at a time.
pub struct ConfigManager {
    command_rx: mpsc::Receiver<Command>,
    /// Timers post back through this; it does not keep the inbox open.
    self_tx: mpsc::WeakSender<Command>,
    announce_tx: broadcast::Sender<StatusAnnouncement>,
    backends: Backends,
    state: InterfaceState,
    mac: [u8; 6],
    seed: Option<InterfaceConfig>,
    link_local_retry: Duration,
    next_timer: TimerId,
    lease_timer: Option<PendingTimer>,
    retry_timer: Option<PendingTimer>,
}

impl ConfigManager {
    /// Create a new Config Manager.
    pub fn new(
        settings: ManagerSettings,
        backends: Backends,
        command_rx: mpsc::Receiver<Command>,
        self_tx: mpsc::WeakSender<Command>,
        announce_tx: broadcast::Sender<StatusAnnouncement>,
    ) -> Self {
        Self {
            command_rx,
            self_tx,
            announce_tx,
            backends,
            state: InterfaceState::new(settings.interface, settings.hostname),
            mac: settings.mac,
            seed: settings.seed,
            link_local_retry: settings.link_local_retry,
            next_timer: 0,
            lease_timer: None,
            retry_timer: None,
        }
    }

    /// Resolve the startup configuration, then serve the inbox.
    pub async fn run(mut self) {
        info!(
            "ConfigManager: Running for {} as {}",
            self.state.interface, self.state.hostname
        );

        self.initialize().await;

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("ConfigManager: Channel closed, shutting down");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::StaticPut { params, responder } => {
                info!("ConfigManager: Remote static put");
                let _ = responder.send(self.apply_remote_static_put(&params).await);
            }
            Command::StaticDelete { responder } => {
                info!("ConfigManager: Remote static delete");
                self.apply_remote_static_delete().await;
                let _ = responder.send(Ok(()));
            }
            Command::AutoPut { params, responder } => {
                let _ = responder.send(self.apply_remote_auto_put(&params));
            }
            Command::AutoDelete { responder } => {
                info!("ConfigManager: Remote auto delete");
                self.apply_remote_auto_delete().await;
                let _ = responder.send(Ok(()));
            }
            Command::Snapshot { responder } => {
                let _ = responder.send(self.snapshot());
            }
            Command::LeaseExpired { timer } => {
                self.on_lease_expired(timer).await;
            }
            Command::LinkLocalRetry { timer } => {
                self.on_link_local_retry_tick(timer).await;
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            lease_timer: self.lease_timer,
            retry_timer: self.retry_timer,
        }
    }

    /// Persisted static config, else the startup seed, else DHCP.
    pub async fn initialize(&mut self) {
        match self.backends.store.load().await {
            Ok(Some(config)) => {
                info!(
                    "ConfigManager: Using persisted static config {}/{}",
                    config.address,
                    config.prefix_len()
                );
                self.enter_static(config).await;
                return;
            }
            Ok(None) => debug!("ConfigManager: No persisted static config"),
            Err(e) => warn!("ConfigManager: Ignoring persisted static config: {}", e),
        }

        if let Some(config) = self.seed.take() {
            info!(
                "ConfigManager: Using startup static config {}/{}",
                config.address,
                config.prefix_len()
            );
            self.enter_static(config).await;
            return;
        }

        self.attempt_dynamic_configuration().await;
    }

    /// Ask the DHCP client for a lease, falling back to link-local.
    ///
    /// The client call blocks this task until it returns.
    pub async fn attempt_dynamic_configuration(&mut self) {
        self.apply_and_announce(Status::Request, None).await;

        match self.request_lease().await {
            Some(lease) => self.on_dhcp_bound(lease).await,
            None => self.enter_link_local().await,
        }
    }

    async fn request_lease(&self) -> Option<Lease> {
        let record = match self
            .backends
            .dhcp
            .request_lease(&self.state.interface, &self.state.hostname)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!("ConfigManager: DHCP attempt failed: {}", e);
                return None;
            }
        };

        let lease = Lease::from_record(&record);
        if lease.is_none() {
            info!(
                "ConfigManager: No DHCP lease on {} (status {:?})",
                self.state.interface,
                record.get(LeaseKey::Status)
            );
        }
        lease
    }

    async fn on_dhcp_bound(&mut self, lease: Lease) {
        info!(
            "ConfigManager: DHCP {} {}/{} router {:?} lease {:?}",
            lease.status,
            lease.config.address,
            lease.config.prefix_len(),
            lease.config.router,
            lease.duration
        );

        self.retry_timer = None;
        self.lease_timer = lease
            .duration
            .map(|after| self.schedule(after, |timer| Command::LeaseExpired { timer }));

        self.apply_and_announce(lease.status, Some(lease.config))
            .await;
    }

    async fn on_lease_expired(&mut self, timer: TimerId) {
        if self.lease_timer.map(|t| t.id) != Some(timer) {
            debug!("ConfigManager: Ignoring stale lease timer {}", timer);
            return;
        }
        self.lease_timer = None;

        if self.state.status == Status::Static {
            info!("ConfigManager: Lease expired under static config, keeping it");
            return;
        }

        info!("ConfigManager: Lease expired, requesting a new one");
        self.attempt_dynamic_configuration().await;
    }

    async fn enter_link_local(&mut self) {
        let config = link_local::derive_config(&self.mac);
        info!(
            "ConfigManager: Falling back to link-local {} on {}",
            config.address, self.state.interface
        );

        self.lease_timer = None;
        self.apply_and_announce(Status::Ip4ll, Some(config)).await;
        self.schedule_link_local_retry();
    }

    fn schedule_link_local_retry(&mut self) {
        let after = self.link_local_retry;
        self.retry_timer =
            Some(self.schedule(after, |timer| Command::LinkLocalRetry { timer }));
    }

    async fn on_link_local_retry_tick(&mut self, timer: TimerId) {
        if self.retry_timer.map(|t| t.id) != Some(timer) {
            debug!("ConfigManager: Ignoring stale link-local retry {}", timer);
            return;
        }
        self.retry_timer = None;

        if self.state.status != Status::Ip4ll {
            debug!(
                "ConfigManager: Link-local retry while {}, nothing to do",
                self.state.status
            );
            return;
        }

        debug!("ConfigManager: Link-local retry, probing for DHCP");
        match self.request_lease().await {
            Some(lease) => self.on_dhcp_bound(lease).await,
            None => self.schedule_link_local_retry(),
        }
    }

    async fn apply_remote_static_put(
        &mut self,
        params: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        let config = static_config_from_params(params)?;

        if let Err(e) = self.backends.store.save(&config).await {
            warn!("ConfigManager: Failed to persist static config: {}", e);
        }
        self.enter_static(config).await;
        Ok(())
    }

    async fn apply_remote_static_delete(&mut self) {
        self.relinquish_static().await;
    }

    async fn apply_remote_auto_delete(&mut self) {
        self.relinquish_static().await;
    }

    fn apply_remote_auto_put(
        &mut self,
        _params: &HashMap<String, String>,
    ) -> Result<(), ConfigError> {
        warn!("ConfigManager: auto-ip put is not implemented");
        Err(ConfigError::Unimplemented("auto-ip put"))
    }

    async fn relinquish_static(&mut self) {
        if let Err(e) = self.backends.store.clear().await {
            warn!("ConfigManager: Failed to clear static config: {}", e);
        }
        self.attempt_dynamic_configuration().await;
    }

    async fn enter_static(&mut self, config: InterfaceConfig) {
        self.lease_timer = None;
        self.retry_timer = None;
        self.apply_and_announce(Status::Static, Some(config)).await;
    }

    /// Merge a transition into the state, push it to the OS, publish it and
    /// update the status light.
    async fn apply_and_announce(&mut self, status: Status, config: Option<InterfaceConfig>) {
        let previous = self.state.status;
        self.state.status = status;
        self.state.config = config;

        if let Some(config) = &self.state.config {
            // Failures are reported, not retried
            if let Err(e) = self
                .backends
                .applier
                .apply(&self.state.interface, config)
                .await
            {
                error!(
                    "ConfigManager: Failed to apply {}/{} to {}: {}",
                    config.address,
                    config.prefix_len(),
                    self.state.interface,
                    e
                );
            }
        }

        // No subscribers is fine
        let _ = self.announce_tx.send(StatusAnnouncement::from(&self.state));

        if previous != status {
            info!(
                "ConfigManager: {} status {} -> {}",
                self.state.interface, previous, status
            );
            self.backends
                .indicator
                .show(LedPattern::for_status(status));
        }
    }

    /// Schedule a one-shot self-event. Timers are never revoked; a firing
    /// whose id is no longer current is ignored by its handler.
    fn schedule(&mut self, after: Duration, event: fn(TimerId) -> Command) -> PendingTimer {
        self.next_timer += 1;
        let id = self.next_timer;
        let tx = self.self_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(event(id)).await;
            }
        });

        debug!("ConfigManager: Timer {} scheduled in {:?}", id, after);
        PendingTimer { id, after }
    }
}

fn static_config_from_params(
    params: &HashMap<String, String>,
) -> Result<InterfaceConfig, ConfigError> {
    let address = required_addr(params, "x-ip")?;
    let mask = required_addr(params, "x-subnet")?;
    if !is_valid_netmask(mask) {
        return Err(ConfigError::Malformed(format!("x-subnet: {mask} is not a netmask")));
    }
    let router = match params.get("x-router").map(|r| r.trim()) {
        None | Some("") => None,
        Some(r) => Some(
            r.parse::<Ipv4Addr>()
                .map_err(|_| ConfigError::Malformed(format!("x-router: {r}")))?,
        ),
    };

    Ok(InterfaceConfig::new(address, mask).with_router(router))
}

fn required_addr(params: &HashMap<String, String>, key: &str) -> Result<Ipv4Addr, ConfigError> {
    let value = params
        .get(key)
        .ok_or_else(|| ConfigError::Malformed(format!("missing {key}")))?;
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Malformed(format!("{key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{FakeDhcp, MemoryStore, RecordingApplier, RecordingIndicator};

    const MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
    const BOUND_120: &str = "[\nstatus='bound'\nip='10.0.0.23'\nsubnet='255.255.255.0'\nrouter='10.0.0.1'\nlease='120'\n]";

    struct Harness {
        manager: ConfigManager,
        dhcp: FakeDhcp,
        applier: RecordingApplier,
        indicator: RecordingIndicator,
        store: MemoryStore,
        announcements: broadcast::Receiver<StatusAnnouncement>,
        // Keeps the inbox open for timers
        _command_tx: mpsc::Sender<Command>,
    }

    fn harness(dhcp: FakeDhcp, store: MemoryStore, seed: Option<InterfaceConfig>) -> Harness {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (announce_tx, announcements) = broadcast::channel(32);
        let applier = RecordingApplier::default();
        let indicator = RecordingIndicator::default();

        let manager = ConfigManager::new(
            ManagerSettings {
                interface: "eth0".to_string(),
                hostname: "sensor-7".to_string(),
                mac: MAC,
                seed,
                link_local_retry: DEFAULT_LINK_LOCAL_RETRY,
            },
            Backends {
                dhcp: Box::new(dhcp.clone()),
                applier: Box::new(applier.clone()),
                indicator: Box::new(indicator.clone()),
                store: Box::new(store.clone()),
            },
            command_rx,
            command_tx.downgrade(),
            announce_tx,
        );

        Harness {
            manager,
            dhcp,
            applier,
            indicator,
            store,
            announcements,
            _command_tx: command_tx,
        }
    }

    fn static_params(ip: &str, subnet: &str) -> HashMap<String, String> {
        HashMap::from([
            ("x-ip".to_string(), ip.to_string()),
            ("x-subnet".to_string(), subnet.to_string()),
        ])
    }

    fn link_local_addr() -> Ipv4Addr {
        link_local::derive_address(&MAC)
    }

    #[tokio::test]
    async fn test_persisted_static_short_circuits() {
        let store = MemoryStore::with(InterfaceConfig::new(
            Ipv4Addr::new(192, 168, 1, 20),
            Ipv4Addr::new(255, 255, 255, 0),
        ));
        let mut h = harness(FakeDhcp::new([BOUND_120]), store, None);

        h.manager.initialize().await;

        assert_eq!(h.dhcp.calls(), 0);
        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Static);
        assert_eq!(
            snap.state.config.unwrap().address,
            Ipv4Addr::new(192, 168, 1, 20)
        );
        assert_eq!(h.indicator.patterns(), vec![LedPattern::Solid]);
    }

    #[tokio::test]
    async fn test_seed_static_used_without_persisted_config() {
        let seed = InterfaceConfig::new(Ipv4Addr::new(10, 9, 8, 7), Ipv4Addr::new(255, 0, 0, 0));
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), Some(seed.clone()));

        h.manager.initialize().await;

        assert_eq!(h.dhcp.calls(), 0);
        assert_eq!(h.manager.snapshot().state.config, Some(seed));
        assert_eq!(h.manager.snapshot().state.status, Status::Static);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_lease_schedules_one_expiry() {
        let mut h = harness(FakeDhcp::new([BOUND_120]), MemoryStore::default(), None);

        h.manager.attempt_dynamic_configuration().await;

        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Bound);
        assert_eq!(
            snap.lease_timer.map(|t| t.after),
            Some(Duration::from_secs(120))
        );
        assert_eq!(snap.retry_timer, None);
        assert_eq!(h.dhcp.calls(), 1);

        // request -> bound, both announced
        let first = h.announcements.recv().await.unwrap();
        assert_eq!(first.status, Status::Request);
        assert_eq!(first.config, None);
        let second = h.announcements.recv().await.unwrap();
        assert_eq!(second.status, Status::Bound);
        assert_eq!(
            h.indicator.patterns(),
            vec![LedPattern::HeartbeatPulse, LedPattern::Solid]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expiry_fires_after_lease_time() {
        let mut h = harness(FakeDhcp::new([BOUND_120]), MemoryStore::default(), None);
        h.manager.attempt_dynamic_configuration().await;
        let timer = h.manager.snapshot().lease_timer.unwrap();

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(h.manager.command_rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        match h.manager.command_rx.recv().await {
            Some(Command::LeaseExpired { timer: id }) => assert_eq!(id, timer.id),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expired_restarts_dhcp() {
        let mut h = harness(
            FakeDhcp::new([BOUND_120, BOUND_120]),
            MemoryStore::default(),
            None,
        );
        h.manager.attempt_dynamic_configuration().await;
        let timer = h.manager.snapshot().lease_timer.unwrap();

        h.manager.on_lease_expired(timer.id).await;

        assert_eq!(h.dhcp.calls(), 2);
        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Bound);
        assert_ne!(snap.lease_timer.unwrap().id, timer.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expired_under_static_is_noop() {
        let mut h = harness(FakeDhcp::new([BOUND_120]), MemoryStore::default(), None);
        h.manager.attempt_dynamic_configuration().await;
        let timer = h.manager.snapshot().lease_timer.unwrap();

        h.manager
            .apply_remote_static_put(&static_params("10.0.0.5", "255.255.255.0"))
            .await
            .unwrap();
        let before = h.manager.snapshot().state;

        h.manager.on_lease_expired(timer.id).await;

        assert_eq!(h.manager.snapshot().state, before);
        assert_eq!(h.dhcp.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_lease_falls_back_to_link_local() {
        let mut h = harness(
            FakeDhcp::new(["udhcpc: no lease, failing"]),
            MemoryStore::default(),
            None,
        );

        h.manager.attempt_dynamic_configuration().await;

        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Ip4ll);
        let config = snap.state.config.unwrap();
        assert_eq!(config.address, link_local_addr());
        assert_eq!(config.mask, Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(config.router, None);
        assert_eq!(
            snap.retry_timer.map(|t| t.after),
            Some(DEFAULT_LINK_LOCAL_RETRY)
        );
        assert_eq!(snap.lease_timer, None);
        assert_eq!(
            h.indicator.patterns(),
            vec![LedPattern::HeartbeatPulse, LedPattern::SlowBlinkAlternate]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_without_bound_falls_back() {
        let mut h = harness(
            FakeDhcp::new(["[\nstatus='nak'\nip='10.0.0.23'\nsubnet='255.255.255.0'\n]"]),
            MemoryStore::default(),
            None,
        );
        h.manager.attempt_dynamic_configuration().await;
        assert_eq!(h.manager.snapshot().state.status, Status::Ip4ll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_with_bad_netmask_falls_back() {
        let mut h = harness(
            FakeDhcp::new(["[\nstatus='bound'\nip='10.0.0.23'\nsubnet='255.0.255.0'\n]"]),
            MemoryStore::default(),
            None,
        );
        h.manager.attempt_dynamic_configuration().await;
        assert_eq!(h.manager.snapshot().state.status, Status::Ip4ll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_status_binds() {
        let mut h = harness(
            FakeDhcp::new(["[\nstatus='renew'\nip='10.0.0.23'\nsubnet='255.255.255.0'\n]"]),
            MemoryStore::default(),
            None,
        );
        h.manager.attempt_dynamic_configuration().await;
        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Renew);
        assert_eq!(snap.lease_timer, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dhcp_client_failure_falls_back() {
        let mut h = harness(FakeDhcp::failing(), MemoryStore::default(), None);
        h.manager.attempt_dynamic_configuration().await;
        assert_eq!(h.manager.snapshot().state.status, Status::Ip4ll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_local_retry_failure_reschedules_without_reapply() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);
        h.manager.attempt_dynamic_configuration().await;
        let applied = h.applier.applied().len();
        let timer = h.manager.snapshot().retry_timer.unwrap();

        h.manager.on_link_local_retry_tick(timer.id).await;

        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Ip4ll);
        let next = snap.retry_timer.unwrap();
        assert_ne!(next.id, timer.id);
        assert_eq!(next.after, DEFAULT_LINK_LOCAL_RETRY);
        assert_eq!(h.applier.applied().len(), applied);
        assert_eq!(h.dhcp.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_local_retry_success_binds() {
        let mut h = harness(
            FakeDhcp::new(["", BOUND_120]),
            MemoryStore::default(),
            None,
        );
        h.manager.attempt_dynamic_configuration().await;
        let timer = h.manager.snapshot().retry_timer.unwrap();

        h.manager.on_link_local_retry_tick(timer.id).await;

        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Bound);
        assert_eq!(snap.retry_timer, None);
        assert!(snap.lease_timer.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_put_over_link_local() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);
        h.manager.attempt_dynamic_configuration().await;
        let retry = h.manager.snapshot().retry_timer.unwrap();

        h.manager
            .apply_remote_static_put(&static_params("10.0.0.5", "255.255.255.0"))
            .await
            .unwrap();

        let snap = h.manager.snapshot();
        assert_eq!(snap.state.status, Status::Static);
        let config = snap.state.config.clone().unwrap();
        assert_eq!(config.address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(config.mask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(h.store.current(), Some(config));

        // The old retry timer firing changes nothing
        let calls = h.dhcp.calls();
        h.manager.on_link_local_retry_tick(retry.id).await;
        assert_eq!(h.manager.snapshot().state, snap.state);
        assert_eq!(h.dhcp.calls(), calls);
    }

    #[tokio::test]
    async fn test_static_put_rejects_malformed_params() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);

        let err = h
            .manager
            .apply_remote_static_put(&static_params("10.0.0.300", "255.255.255.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));

        let mut params = static_params("10.0.0.5", "255.255.255.0");
        params.remove("x-subnet");
        assert!(h.manager.apply_remote_static_put(&params).await.is_err());

        let mut params = static_params("10.0.0.5", "255.255.255.0");
        params.insert("x-router".to_string(), "gateway".to_string());
        assert!(h.manager.apply_remote_static_put(&params).await.is_err());

        let err = h
            .manager
            .apply_remote_static_put(&static_params("10.0.0.5", "255.0.255.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));

        assert_eq!(h.manager.snapshot().state.status, Status::Init);
        assert!(h.applier.applied().is_empty());
        assert_eq!(h.store.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_delete_restarts_resolution() {
        let store = MemoryStore::with(InterfaceConfig::new(
            Ipv4Addr::new(192, 168, 1, 20),
            Ipv4Addr::new(255, 255, 255, 0),
        ));
        let mut h = harness(FakeDhcp::new([BOUND_120]), store, None);
        h.manager.initialize().await;

        h.manager.apply_remote_static_delete().await;

        assert_eq!(h.store.current(), None);
        assert_eq!(h.dhcp.calls(), 1);
        assert_eq!(h.manager.snapshot().state.status, Status::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_delete_restarts_resolution() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);
        h.manager
            .apply_remote_static_put(&static_params("10.0.0.5", "255.255.255.0"))
            .await
            .unwrap();

        h.manager.apply_remote_auto_delete().await;

        assert_eq!(h.manager.snapshot().state.status, Status::Ip4ll);
        assert_eq!(h.store.current(), None);
    }

    #[tokio::test]
    async fn test_auto_put_is_unimplemented() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);
        let before = h.manager.snapshot().state;

        let err = h.manager.apply_remote_auto_put(&HashMap::new()).unwrap_err();

        assert_eq!(err, ConfigError::Unimplemented("auto-ip put"));
        assert_eq!(h.manager.snapshot().state, before);
    }

    #[tokio::test]
    async fn test_announcement_matches_applied_config() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);
        let mut params = static_params("10.0.0.5", "255.255.255.0");
        params.insert("x-router".to_string(), "10.0.0.1".to_string());

        h.manager.apply_remote_static_put(&params).await.unwrap();

        let announced = h.announcements.recv().await.unwrap();
        let (interface, applied) = h.applier.applied().pop().unwrap();
        assert_eq!(interface, "eth0");
        assert_eq!(announced.interface, "eth0");
        assert_eq!(announced.status, Status::Static);
        assert_eq!(announced.config, Some(applied));
    }

    #[tokio::test]
    async fn test_indicator_only_on_status_change() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);

        h.manager
            .apply_remote_static_put(&static_params("10.0.0.5", "255.255.255.0"))
            .await
            .unwrap();
        h.manager
            .apply_remote_static_put(&static_params("10.0.0.6", "255.255.255.0"))
            .await
            .unwrap();

        assert_eq!(h.indicator.patterns(), vec![LedPattern::Solid]);
        assert_eq!(h.applier.applied().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_failure_is_not_fatal() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);
        h.applier.fail(true);

        h.manager
            .apply_remote_static_put(&static_params("10.0.0.5", "255.255.255.0"))
            .await
            .unwrap();

        assert_eq!(h.manager.snapshot().state.status, Status::Static);
    }

    #[tokio::test]
    async fn test_stale_timers_ignored() {
        let mut h = harness(FakeDhcp::default(), MemoryStore::default(), None);

        h.manager.on_lease_expired(42).await;
        h.manager.on_link_local_retry_tick(42).await;

        assert_eq!(h.manager.snapshot().state.status, Status::Init);
        assert_eq!(h.dhcp.calls(), 0);
    }
}
