// Routes module - route listing and the route scanner

pub mod parser;

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{AppError, AppResult};
use crate::kernel::KernelTables;
use crate::network::{network_id, NetworkId};

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub destination: Option<String>, // CIDR notation, None for default routes
    pub gateway: Option<IpAddr>,
    pub interface: String,
}

impl Route {
    /// Route to `destination` via `gateway`, as the tests build them
    #[cfg(test)]
    pub fn via(destination: &str, gateway: &str) -> Self {
        Route {
            destination: Some(destination.to_string()),
            gateway: gateway.parse().ok(),
            interface: "eth0".to_string(),
        }
    }
}

/// Collect the destinations of every IPv4 route whose next-hop is `next_hop`.
///
/// Routes without a concrete destination (default routes) never match.
/// A failed listing is returned as `AppError::RouteScan` so the caller can
/// skip the pass instead of treating it as "no routes".
pub fn scan_routes(kernel: &dyn KernelTables, next_hop: Ipv4Addr) -> AppResult<HashSet<NetworkId>> {
    let routes = kernel.list_routes().map_err(|e| {
        tracing::error!("Got error when fetching route list: {}", e);
        AppError::RouteScan(e.to_string())
    })?;

    let mut matching = HashSet::new();

    for route in routes {
        let Some(destination) = route.destination.as_deref() else {
            continue;
        };

        if route.gateway != Some(IpAddr::V4(next_hop)) {
            continue;
        }

        match network_id(destination, None) {
            Some(id) => {
                tracing::debug!("Route {} via {} dev {} matches", id, next_hop, route.interface);
                matching.insert(id);
            }
            None => tracing::debug!("Ignoring route with unusable destination '{}'", destination),
        }
    }

    Ok(matching)
}
