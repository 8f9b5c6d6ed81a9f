//! Capture filtering: which frames to capture, which flows to track, which exchanges
//! to forward.
//!
//! - [`FilterConfig::capture_expression`] builds the expression handed to the external
//!   capture source, e.g. `tcp and port 80 and host 10.0.0.1`
//! - [`FilterConfig::admits`] checks a flow's endpoints against the configured ip and port
//! - [`HostFilter`] matches the `Host` of a completed exchange, with `*` wildcards

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::flow::FlowKey;
use crate::protocol::SetupError;

/// User supplied capture filter.
///
/// Empty strings and a zero port mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub ip: String,
    pub port: u16,
    pub host: String,
    /// Raw capture expression; overrides `ip` and `port` when set.
    pub bpf: String,
}

impl FilterConfig {
    /// Checks that the configured ip parses.
    pub fn validate(&self) -> Result<(), SetupError> {
        self.parsed_ip().map(|_| ())
    }

    /// The expression restricting which frames the capture source delivers.
    pub fn capture_expression(&self) -> String {
        if !self.bpf.trim().is_empty() {
            return self.bpf.clone();
        }

        let mut rules = vec!["tcp".to_owned()];
        if self.port > 0 {
            rules.push(format!("port {}", self.port));
        }
        if !self.ip.is_empty() {
            rules.push(format!("host {}", self.ip));
        }
        rules.join(" and ")
    }

    /// Returns true if a flow between these endpoints should be tracked.
    ///
    /// With a raw expression the capture source has already filtered, so every flow is
    /// admitted.
    pub fn admits(&self, key: &FlowKey) -> bool {
        if !self.bpf.trim().is_empty() {
            return true;
        }

        let ip_ok = match self.parsed_ip() {
            Ok(Some(ip)) => key.client.ip() == ip || key.server.ip() == ip,
            Ok(None) => true,
            Err(_) => false,
        };
        let port_ok = self.port == 0 || key.client.port() == self.port || key.server.port() == self.port;
        ip_ok && port_ok
    }

    pub fn host_filter(&self) -> HostFilter {
        HostFilter::new(&self.host)
    }

    fn parsed_ip(&self) -> Result<Option<IpAddr>, SetupError> {
        if self.ip.is_empty() {
            return Ok(None);
        }
        self.ip
            .parse::<IpAddr>()
            .map(Some)
            .map_err(|e| SetupError::invalid_filter(format!("invalid ip {:?}: {e}", self.ip)))
    }
}

/// Matches the `Host` header of a request.
///
/// - `""` and `"*"` match every host
/// - `"*.example.com"` matches any host ending in `.example.com`
/// - anything else must equal the host exactly
///
/// The port is stripped from the host before comparing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFilter {
    pattern: String,
}

impl HostFilter {
    pub fn new(pattern: &str) -> Self {
        Self { pattern: pattern.trim().to_owned() }
    }

    pub fn matches(&self, host: &str) -> bool {
        if self.pattern.is_empty() || self.pattern == "*" {
            return true;
        }

        let host = strip_port(host);
        match self.pattern.strip_prefix('*') {
            Some(suffix) => host.ends_with(suffix),
            None => host == self.pattern,
        }
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:8080
        return rest.split_once(']').map_or(host, |(ip, _)| ip);
    }
    match host.rsplit_once(':') {
        // a bare IPv6 address has more than one colon and no port
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(client: &str, server: &str) -> FlowKey {
        FlowKey::new(client.parse().unwrap(), server.parse().unwrap())
    }

    #[test]
    fn host_wildcards() {
        let filter = HostFilter::new("*.example.com");
        assert!(filter.matches("api.example.com"));
        assert!(filter.matches("api.example.com:8080"));
        assert!(!filter.matches("example.org"));

        assert!(HostFilter::new("").matches("anything"));
        assert!(HostFilter::new("*").matches("anything:1"));
    }

    #[test]
    fn host_exact() {
        let filter = HostFilter::new("example.com");
        assert!(filter.matches("example.com"));
        assert!(filter.matches("example.com:443"));
        assert!(!filter.matches("www.example.com"));
    }

    #[test]
    fn ipv6_hosts() {
        assert!(HostFilter::new("::1").matches("[::1]:8080"));
        assert!(HostFilter::new("::1").matches("::1"));
        assert_eq!(strip_port("[fe80::1]"), "fe80::1");
    }

    #[test]
    fn capture_expression() {
        assert_eq!(FilterConfig::default().capture_expression(), "tcp");

        let config = FilterConfig { ip: "10.0.0.1".into(), port: 80, ..FilterConfig::default() };
        assert_eq!(config.capture_expression(), "tcp and port 80 and host 10.0.0.1");

        let config = FilterConfig { bpf: "tcp port 8080".into(), port: 80, ..FilterConfig::default() };
        assert_eq!(config.capture_expression(), "tcp port 8080");
    }

    #[test]
    fn admission() {
        let config = FilterConfig { ip: "10.0.0.2".into(), port: 80, ..FilterConfig::default() };
        assert!(config.admits(&key("10.0.0.1:50000", "10.0.0.2:80")));
        assert!(!config.admits(&key("10.0.0.1:50000", "10.0.0.3:80")));
        assert!(!config.admits(&key("10.0.0.1:50000", "10.0.0.2:8080")));

        assert!(FilterConfig::default().admits(&key("10.0.0.1:50000", "10.0.0.3:443")));
    }

    #[test]
    fn invalid_ip() {
        let config = FilterConfig { ip: "not-an-ip".into(), ..FilterConfig::default() };
        assert!(matches!(config.validate(), Err(SetupError::InvalidFilter { .. })));
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: FilterConfig = serde_json::from_str(r#"{"host": "*.example.com", "port": 8080}"#).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.ip.is_empty());
        assert!(config.host_filter().matches("a.example.com"));
    }
}
