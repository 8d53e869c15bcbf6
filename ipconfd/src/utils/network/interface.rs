use crate::error::NetworkError;
use std::fs;
use std::path::Path;

const SYSFS_NET: &str = "/sys/class/net";

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub index: u32,
    pub mac: [u8; 6],
}

impl Interface {
    /// Look up a named interface through sysfs.
    pub fn lookup(name: &str) -> Result<Self, NetworkError> {
        let dir = Path::new(SYSFS_NET).join(name);
        if !dir.exists() {
            return Err(NetworkError::NoInterface(name.to_string()));
        }

        let mac = read_mac_address(name)?;
        let index = read_interface_index(name)?;

        Ok(Self {
            name: name.to_string(),
            index,
            mac,
        })
    }
}

pub fn read_mac_address(name: &str) -> Result<[u8; 6], NetworkError> {
    let path = format!("{SYSFS_NET}/{name}/address");
    let mac_str = read_sysfs(&path)?;

    parse_mac_address(mac_str.trim())
}

pub fn parse_mac_address(s: &str) -> Result<[u8; 6], NetworkError> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(NetworkError::InvalidMac(s.to_string()));
    }

    let mut mac = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        mac[i] =
            u8::from_str_radix(part, 16).map_err(|_| NetworkError::InvalidMac(s.to_string()))?;
    }

    Ok(mac)
}

fn read_interface_index(name: &str) -> Result<u32, NetworkError> {
    let path = format!("{SYSFS_NET}/{name}/ifindex");
    let index_str = read_sysfs(&path)?;

    index_str
        .trim()
        .parse()
        .map_err(|_| NetworkError::NoInterface(name.to_string()))
}

fn read_sysfs(path: &str) -> Result<String, NetworkError> {
    fs::read_to_string(path).map_err(|source| NetworkError::Sysfs {
        path: path.to_string(),
        source,
    })
}
