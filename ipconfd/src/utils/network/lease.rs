//! Parser for the DHCP client's textual output.
//!
//! The client script prints one bracketed block per event it sees:
//!
//! ```text
//! [
//! status='deconfig'
//! interface='eth0'
//! ]
//! [
//! status='bound'
//! interface='eth0'
//! ip='10.0.0.23'
//! subnet='255.255.255.0'
//! router='10.0.0.1'
//! lease='3600'
//! ]
//! ```
//!
//! Only the last block describes the outcome of the run.

use super::{InterfaceConfig, is_valid_netmask, parse_address_list};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Keys the client may report. Anything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseKey {
    Status,
    Interface,
    Ip,
    Subnet,
    Mask,
    Timezone,
    Router,
    Timesvr,
    Dns,
    Hostname,
    Domain,
    Ipttl,
    Broadcast,
    Ntpsrv,
    Opt53,
    Lease,
    Dhcptype,
    Serverid,
    Message,
}

impl LeaseKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseKey::Status => "status",
            LeaseKey::Interface => "interface",
            LeaseKey::Ip => "ip",
            LeaseKey::Subnet => "subnet",
            LeaseKey::Mask => "mask",
            LeaseKey::Timezone => "timezone",
            LeaseKey::Router => "router",
            LeaseKey::Timesvr => "timesvr",
            LeaseKey::Dns => "dns",
            LeaseKey::Hostname => "hostname",
            LeaseKey::Domain => "domain",
            LeaseKey::Ipttl => "ipttl",
            LeaseKey::Broadcast => "broadcast",
            LeaseKey::Ntpsrv => "ntpsrv",
            LeaseKey::Opt53 => "opt53",
            LeaseKey::Lease => "lease",
            LeaseKey::Dhcptype => "dhcptype",
            LeaseKey::Serverid => "serverid",
            LeaseKey::Message => "message",
        }
    }
}

impl FromStr for LeaseKey {
    type Err = ();

    // Case-sensitive on purpose: `IP=` is not `ip=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "status" => LeaseKey::Status,
            "interface" => LeaseKey::Interface,
            "ip" => LeaseKey::Ip,
            "subnet" => LeaseKey::Subnet,
            "mask" => LeaseKey::Mask,
            "timezone" => LeaseKey::Timezone,
            "router" => LeaseKey::Router,
            "timesvr" => LeaseKey::Timesvr,
            "dns" => LeaseKey::Dns,
            "hostname" => LeaseKey::Hostname,
            "domain" => LeaseKey::Domain,
            "ipttl" => LeaseKey::Ipttl,
            "broadcast" => LeaseKey::Broadcast,
            "ntpsrv" => LeaseKey::Ntpsrv,
            "opt53" => LeaseKey::Opt53,
            "lease" => LeaseKey::Lease,
            "dhcptype" => LeaseKey::Dhcptype,
            "serverid" => LeaseKey::Serverid,
            "message" => LeaseKey::Message,
            _ => return Err(()),
        };
        Ok(key)
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered key/value result of one DHCP client run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseRecord {
    entries: Vec<(LeaseKey, String)>,
}

impl LeaseRecord {
    /// Parse raw client output, keeping only the last bracketed block.
    pub fn parse(output: &str) -> Self {
        let mut record = Self::default();

        for line in last_block(output) {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let Ok(key) = key.trim().parse::<LeaseKey>() else {
                continue;
            };
            record.insert(key, strip_quotes(value.trim()));
        }

        record
    }

    pub fn insert(&mut self, key: LeaseKey, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: LeaseKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (LeaseKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the client reports a usable lease (`bound` or `renew`).
    pub fn has_lease(&self) -> bool {
        matches!(self.get(LeaseKey::Status), Some("bound" | "renew"))
    }

    /// Lease duration in seconds, if reported.
    pub fn lease_secs(&self) -> Option<u64> {
        self.get(LeaseKey::Lease)?.trim().parse().ok()
    }

    /// Build the interface configuration carried by this record.
    ///
    /// `subnet` wins over `mask`; `router` may hold several gateways, the
    /// first one is used.
    pub fn to_config(&self) -> Option<InterfaceConfig> {
        let address: Ipv4Addr = self.get(LeaseKey::Ip)?.parse().ok()?;
        let mask: Ipv4Addr = self
            .get(LeaseKey::Subnet)
            .or_else(|| self.get(LeaseKey::Mask))?
            .parse()
            .ok()
            .filter(|m| is_valid_netmask(*m))?;
        let router = self
            .get(LeaseKey::Router)
            .and_then(|r| parse_address_list(r).into_iter().next());
        let dns = self
            .get(LeaseKey::Dns)
            .map(parse_address_list)
            .unwrap_or_default();

        Some(
            InterfaceConfig::new(address, mask)
                .with_router(router)
                .with_dns(dns),
        )
    }
}

/// Lines of the last block. Blocks open and close on lines that hold only
/// `[` or `]`; brackets anywhere else belong to values or log noise.
fn last_block(output: &str) -> impl Iterator<Item = &str> {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines
        .iter()
        .rposition(|l| l.trim() == "[")
        .map_or(lines.len(), |i| i + 1);

    lines
        .into_iter()
        .skip(start)
        .take_while(|l| l.trim() != "]")
}

fn strip_quotes(value: &str) -> String {
    value
        .trim_matches(|c: char| c == '\'' || c == '"')
        .to_string()
}
