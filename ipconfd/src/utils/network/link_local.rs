//! IPv4 link-local (169.254.0.0/16) address derivation.
//!
//! The address is a pure function of the hardware address: the first two
//! bytes of its MD5 digest become the last two octets. Hosts never negotiate,
//! so two devices whose digests share a prefix will collide. ARP probing is
//! not done here.

use super::InterfaceConfig;
use md5::{Digest, Md5};
use std::net::Ipv4Addr;

pub const LINK_LOCAL_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 0, 0);
pub const LINK_LOCAL_PREFIX_LEN: u8 = 16;

/// Derive the link-local address for a hardware address.
pub fn derive_address(mac: &[u8]) -> Ipv4Addr {
    let digest = Md5::digest(mac);
    from_digest_prefix(digest[0], digest[1])
}

/// Link-local configuration for a hardware address: derived address, /16, no router.
pub fn derive_config(mac: &[u8]) -> InterfaceConfig {
    InterfaceConfig::new(derive_address(mac), LINK_LOCAL_MASK)
}

fn from_digest_prefix(x: u8, mut y: u8) -> Ipv4Addr {
    // 169.254.255.255 is the subnet broadcast, 169.254.0.0 the network
    if x == 255 && y == 255 {
        y -= 1;
    }
    if x == 0 && y == 0 {
        y += 1;
    }
    Ipv4Addr::new(169, 254, x, y)
}
