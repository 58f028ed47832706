// Network identifiers shared by route destinations and rule sources

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

use crate::error::{AppError, AppResult};

/// Canonical CIDR string (`a.b.c.d/len`) used as the join key between
/// route destinations and rule sources.
pub type NetworkId = String;

/// Build a canonical identifier from an address reported by the kernel.
///
/// `address` may already carry a prefix (`10.0.1.0/24`). Otherwise
/// `prefix_len` is used, defaulting to a host prefix of 32.
/// Returns `None` for anything that is not an IPv4 network.
pub fn network_id(address: &str, prefix_len: Option<u8>) -> Option<NetworkId> {
    let net = if address.contains('/') {
        address.parse::<Ipv4Net>().ok()?
    } else {
        let addr: Ipv4Addr = address.parse().ok()?;
        Ipv4Net::new(addr, prefix_len.unwrap_or(32)).ok()?
    };

    Some(net.trunc().to_string())
}

/// Parse an identifier back into a network before it is used to build a rule
pub fn parse_network_id(id: &str) -> AppResult<Ipv4Net> {
    id.parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|_| AppError::InvalidNetwork(id.to_string()))
}
