//! Network configuration utilities.
//!
//! Everything here is a leaf of the configuration state machine: the
//! link-local deriver, the DHCP client boundary and its output parser, and
//! the applier that pushes a resolved configuration into the kernel.

pub mod dhcp;
pub mod interface;
pub mod lease;
pub mod link_local;
pub mod netlink;

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub use dhcp::{DhcpClient, UdhcpcClient};
pub use interface::Interface;
pub use lease::{LeaseKey, LeaseRecord};
pub use netlink::{InterfaceApplier, NetlinkApplier};

/// A resolved IPv4 configuration for one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
    #[serde(default)]
    pub router: Option<Ipv4Addr>,
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,
}

impl InterfaceConfig {
    pub fn new(address: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Self {
            address,
            mask,
            router: None,
            dns: Vec::new(),
        }
    }

    pub fn with_router(mut self, router: Option<Ipv4Addr>) -> Self {
        self.router = router;
        self
    }

    pub fn with_dns(mut self, dns: Vec<Ipv4Addr>) -> Self {
        self.dns = dns;
        self
    }

    pub fn prefix_len(&self) -> u8 {
        netmask_to_prefix_len(self.mask)
    }
}

pub fn netmask_to_prefix_len(netmask: Ipv4Addr) -> u8 {
    let bits = u32::from_be_bytes(netmask.octets());
    bits.count_ones() as u8
}

/// A netmask is valid when its set bits form one leading run.
pub fn is_valid_netmask(netmask: Ipv4Addr) -> bool {
    let bits = u32::from_be_bytes(netmask.octets());
    bits.leading_ones() == bits.count_ones()
}

/// Check if two addresses are on the same subnet
pub fn is_same_subnet(addr1: Ipv4Addr, addr2: Ipv4Addr, netmask: Ipv4Addr) -> bool {
    let mask = u32::from_be_bytes(netmask.octets());
    let a1 = u32::from_be_bytes(addr1.octets());
    let a2 = u32::from_be_bytes(addr2.octets());
    (a1 & mask) == (a2 & mask)
}

/// Parse a whitespace separated list of IPv4 addresses, skipping garbage.
pub fn parse_address_list(s: &str) -> Vec<Ipv4Addr> {
    s.split_whitespace().filter_map(|a| a.parse().ok()).collect()
}
