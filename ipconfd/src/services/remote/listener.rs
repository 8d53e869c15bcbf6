//! UDP transport for remote-control commands.
//!
//! One command per datagram, HTTPU style:
//!
//! ```text
//! PUT /sys/ip/static HTTP/1.1
//! X-IP: 10.0.0.5
//! X-Subnet: 255.255.255.0
//! X-Router: 10.0.0.1
//! ```
//!
//! Header names are lower-cased and become command parameters. Anything
//! after the first blank line is ignored.

use super::{Outcome, RemoteCommand, RemoteCommandRouter, Verb};
use crate::error::{ConfigError, RemoteError};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::UdpSocket;

const MAX_DATAGRAM: usize = 2048;
const RECV_BACKOFF: Duration = Duration::from_millis(500);

/// Decode one datagram into a command.
pub fn decode(datagram: &[u8]) -> Result<RemoteCommand, RemoteError> {
    let text = std::str::from_utf8(datagram).map_err(|_| RemoteError::Encoding)?;
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .skip_while(|l| l.trim().is_empty());

    let request_line = lines.next().ok_or(RemoteError::Empty)?;
    let mut parts = request_line.split_whitespace();
    let verb = match parts.next() {
        Some(v) if v.eq_ignore_ascii_case("put") => Verb::Put,
        Some(v) if v.eq_ignore_ascii_case("delete") => Verb::Delete,
        Some(v) => return Err(RemoteError::UnknownVerb(v.to_string())),
        None => return Err(RemoteError::Empty),
    };
    let resource = parts
        .next()
        .ok_or_else(|| RemoteError::RequestLine(request_line.to_string()))?
        .to_string();

    let mut parameters = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| RemoteError::Header(line.to_string()))?;
        parameters.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    Ok(RemoteCommand {
        verb,
        resource,
        parameters,
    })
}

/// Receive commands on `socket` one at a time until the config manager
/// goes away.
pub async fn serve(socket: UdpSocket, router: RemoteCommandRouter) {
    match socket.local_addr() {
        Ok(addr) => info!("Remote: Listening on {}", addr),
        Err(e) => warn!("Remote: Listening on unknown address: {}", e),
    }

    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                error!("Remote: recv error: {}", e);
                tokio::time::sleep(RECV_BACKOFF).await;
                continue;
            }
        };

        let cmd = match decode(&buf[..len]) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("Remote: Dropping datagram from {}: {}", peer, e);
                continue;
            }
        };

        match router.dispatch(cmd).await {
            Outcome::Applied => debug!("Remote: Command from {} applied", peer),
            Outcome::Ignored => debug!("Remote: Command from {} ignored", peer),
            Outcome::Rejected(ConfigError::Unavailable) => {
                info!("Remote: Config manager gone, stopping listener");
                return;
            }
            Outcome::Rejected(e) => debug!("Remote: Command from {} rejected: {}", peer, e),
        }
    }
}
