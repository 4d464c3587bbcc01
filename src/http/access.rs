//! Engagement rules: which requests the toolbar looks at.
//!
//! # Responsibilities
//! - Match peer addresses against the configured host list
//! - Exclude the toolbar's own routes and configured prefixes
//! - Decide which finished requests are worth storing

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

use crate::config::ToolbarConfig;

/// Path browsers request on their own; never stored.
pub const FAVICON_PATH: &str = "/favicon.ico";

/// An allowed host: a single address or a CIDR network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostNet(IpNet);

impl FromStr for HostNet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('/') {
            return s
                .parse::<IpNet>()
                .map(Self)
                .map_err(|e| format!("invalid host network {s:?}: {e}"));
        }
        let addr: IpAddr = s.parse().map_err(|_| format!("invalid host address {s:?}"))?;
        let host_len = if addr.is_ipv4() { 32 } else { 128 };
        IpNet::new(addr, host_len)
            .map(Self)
            .map_err(|e| format!("invalid host address {s:?}: {e}"))
    }
}

impl HostNet {
    pub fn network(&self) -> IpNet {
        self.0
    }

    pub fn contains(&self, candidate: IpAddr) -> bool {
        self.0.contains(&normalize(candidate))
    }
}

// IPv4-mapped IPv6 peers (dual-stack listeners) compare as IPv4.
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Compiled engagement rules for one configuration.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    check_host: bool,
    hosts: Vec<HostNet>,
    root_path: String,
    exclude_prefixes: Vec<String>,
}

impl AccessPolicy {
    /// Build from a validated config. Host entries that fail to parse are skipped.
    pub fn from_config(config: &ToolbarConfig) -> Self {
        let hosts = config
            .hosts
            .iter()
            .filter_map(|h| match h.parse() {
                Ok(net) => Some(net),
                Err(e) => {
                    tracing::warn!(host = %h, error = %e, "Ignoring invalid toolbar host");
                    None
                }
            })
            .collect();

        Self {
            check_host: config.check_host,
            hosts,
            root_path: config.root_path().to_string(),
            exclude_prefixes: config.exclude_prefixes.clone(),
        }
    }

    /// True when the path belongs to the toolbar UI or an excluded prefix.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.is_toolbar_path(path) || self.exclude_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn is_toolbar_path(&self, path: &str) -> bool {
        path.starts_with(&self.root_path)
    }

    /// Host check. A missing peer address (unix sockets, in-process calls) never passes.
    pub fn peer_allowed(&self, peer: Option<IpAddr>) -> bool {
        if !self.check_host {
            return true;
        }
        match peer {
            Some(ip) => self.hosts.iter().any(|net| net.contains(ip)),
            None => false,
        }
    }

    /// Whether a finished request should land in the request history.
    pub fn should_record(&self, path: &str) -> bool {
        !self.is_toolbar_path(path) && path != FAVICON_PATH
    }
}
