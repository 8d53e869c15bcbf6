//! Applying a resolved configuration to the kernel over netlink.

use super::{InterfaceConfig, is_same_subnet};
use crate::error::NetworkError;
use async_trait::async_trait;
use futures::TryStreamExt;
use log::{debug, info, warn};
use netlink_packet_route::AddressFamily;
use netlink_packet_route::address::AddressMessage;
use rtnetlink::Handle;
use std::net::{IpAddr, Ipv4Addr};

/// Pushes an [`InterfaceConfig`] into the OS network stack.
#[async_trait]
pub trait InterfaceApplier: Send + Sync {
    async fn apply(&self, interface: &str, config: &InterfaceConfig) -> Result<(), NetworkError>;
}

/// rtnetlink-backed applier.
///
/// Replaces every IPv4 address on the link with the configured one and
/// installs a default route through the configured router, if any.
pub struct NetlinkApplier {
    handle: Handle,
}

impl NetlinkApplier {
    /// Create a new netlink connection.
    pub async fn new() -> Result<Self, NetworkError> {
        let (connection, handle, _) =
            rtnetlink::new_connection().map_err(|e| NetworkError::NetlinkError(e.to_string()))?;

        tokio::spawn(connection);

        Ok(Self { handle })
    }

    async fn link_index(&self, name: &str) -> Result<u32, NetworkError> {
        let mut links = self.handle.link().get().match_name(name.to_string()).execute();
        match links.try_next().await {
            Ok(Some(link)) => Ok(link.header.index),
            _ => Err(NetworkError::NoInterface(name.to_string())),
        }
    }

    async fn set_link_up(&self, index: u32) -> Result<(), NetworkError> {
        self.handle
            .link()
            .set(index)
            .up()
            .execute()
            .await
            .map_err(netlink_error)
    }

    async fn flush_addresses_v4(&self, index: u32) -> Result<(), NetworkError> {
        let addresses: Vec<AddressMessage> = self
            .handle
            .address()
            .get()
            .set_link_index_filter(index)
            .execute()
            .try_collect()
            .await
            .map_err(netlink_error)?;

        for msg in addresses
            .into_iter()
            .filter(|msg| msg.header.family == AddressFamily::Inet)
        {
            self.handle
                .address()
                .del(msg)
                .execute()
                .await
                .map_err(netlink_error)?;
        }
        Ok(())
    }

    async fn add_address_v4(
        &self,
        index: u32,
        addr: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<(), NetworkError> {
        self.handle
            .address()
            .add(index, IpAddr::V4(addr), prefix_len)
            .execute()
            .await
            .map_err(netlink_error)
    }

    /// Host route to a gateway outside the configured subnet.
    async fn add_onlink_route_v4(&self, gateway: Ipv4Addr, index: u32) -> Result<(), NetworkError> {
        let result = self
            .handle
            .route()
            .add()
            .v4()
            .destination_prefix(gateway, 32)
            .output_interface(index)
            .execute()
            .await;
        tolerate_exists(result)
    }

    async fn add_default_route_v4(&self, gateway: Ipv4Addr, index: u32) -> Result<(), NetworkError> {
        let result = self
            .handle
            .route()
            .add()
            .v4()
            .gateway(gateway)
            .output_interface(index)
            .execute()
            .await;
        tolerate_exists(result)
    }
}

#[async_trait]
impl InterfaceApplier for NetlinkApplier {
    async fn apply(&self, interface: &str, config: &InterfaceConfig) -> Result<(), NetworkError> {
        let index = self.link_index(interface).await?;
        let prefix_len = config.prefix_len();

        self.set_link_up(index).await?;
        self.flush_addresses_v4(index).await?;
        self.add_address_v4(index, config.address, prefix_len)
            .await?;
        info!(
            "Netlink: {} configured with {}/{}",
            interface, config.address, prefix_len
        );

        if let Some(gw) = config.router {
            if !is_same_subnet(config.address, gw, config.mask) {
                debug!(
                    "Gateway {} not on same subnet as {}/{}, adding on-link route",
                    gw, config.address, prefix_len
                );
                self.add_onlink_route_v4(gw, index).await?;
            }
            self.add_default_route_v4(gw, index).await?;
            info!("Netlink: default route via {} on {}", gw, interface);
        }

        Ok(())
    }
}

fn netlink_error(e: rtnetlink::Error) -> NetworkError {
    NetworkError::NetlinkError(e.to_string())
}

fn tolerate_exists(result: Result<(), rtnetlink::Error>) -> Result<(), NetworkError> {
    match result {
        Ok(()) => Ok(()),
        Err(rtnetlink::Error::NetlinkError(e)) if e.raw_code() == -libc::EEXIST => {
            warn!("Netlink: route already exists");
            Ok(())
        }
        Err(e) => Err(netlink_error(e)),
    }
}
