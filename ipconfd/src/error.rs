//! Error types for ipconfd.

use std::io;
use thiserror::Error;

/// Network-related errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Interface not found: {0}")]
    NoInterface(String),
    #[error("Invalid hardware address: {0}")]
    InvalidMac(String),
    #[error("Netlink error: {0}")]
    NetlinkError(String),
    #[error("Failed to run DHCP client {program}: {source}")]
    DhcpSpawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Sysfs {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Persisted static configuration errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported record version {found}, expected {expected}")]
    Version { expected: u32, found: u32 },
    #[error("Invalid netmask {0}")]
    Netmask(std::net::Ipv4Addr),
}

/// Errors reported back to the sender of a configuration command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Malformed command: {0}")]
    Malformed(String),
    #[error("Not implemented: {0}")]
    Unimplemented(&'static str),
    #[error("Config manager unavailable")]
    Unavailable,
}

/// Remote control decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Empty request")]
    Empty,
    #[error("Malformed request line: {0}")]
    RequestLine(String),
    #[error("Unknown verb: {0}")]
    UnknownVerb(String),
    #[error("Malformed header line: {0}")]
    Header(String),
    #[error("Request is not valid UTF-8")]
    Encoding,
}
