// Parsers for `ip route show` output

use super::Route;
use crate::error::{AppError, AppResult};

/// Route types `ip route show` prints in front of the destination
const ROUTE_TYPES: &[&str] = &[
    "unicast",
    "local",
    "broadcast",
    "multicast",
    "throw",
    "unreachable",
    "prohibit",
    "blackhole",
    "nat",
    "anycast",
];

/// Parse JSON output from `ip -json -4 route show`
pub fn parse_ip_json(json_str: &str) -> AppResult<Vec<Route>> {
    // `ip -json` prints nothing at all for an empty table
    if json_str.trim().is_empty() {
        return Ok(Vec::new());
    }

    let routes: Vec<serde_json::Value> = serde_json::from_str(json_str)?;

    let mut parsed_routes = Vec::with_capacity(routes.len());

    for route in routes {
        let destination = route
            .get("dst")
            .and_then(|v| v.as_str())
            .filter(|dst| *dst != "default")
            .map(String::from);

        let gateway = route
            .get("gateway")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok());

        let interface = route
            .get("dev")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        parsed_routes.push(Route {
            destination,
            gateway,
            interface,
        });
    }

    Ok(parsed_routes)
}

/// Parse plain output from `ip -4 route show`
pub fn parse_ip_route(output: &str) -> AppResult<Vec<Route>> {
    let mut routes = Vec::new();

    for line in output.lines() {
        let mut parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first().is_some_and(|p| ROUTE_TYPES.contains(p)) {
            parts.remove(0);
        }

        let destination = match parts.first() {
            Some(&"default") => None,
            Some(dest) => Some(dest.to_string()),
            None => continue,
        };

        let mut gateway = None;
        let mut interface = String::new();

        let mut i = 1;
        while i < parts.len() {
            let value = parts.get(i + 1).copied();
            match (parts[i], value) {
                ("via", Some(gw)) => {
                    let parsed = gw
                        .parse()
                        .map_err(|_| AppError::OutputParse(format!("bad gateway in '{}'", line)))?;
                    gateway = Some(parsed);
                    i += 2;
                }
                ("dev", Some(iface)) => {
                    interface = iface.to_string();
                    i += 2;
                }
                _ => {
                    i += 1;
                }
            }
        }

        routes.push(Route {
            destination,
            gateway,
            interface,
        });
    }

    Ok(routes)
}
