//! Proxy data models

use std::collections::BTreeMap;
use std::fmt;

/// Protocol a proxy list is labelled with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Http,
    Https,
    Socks4,
    Socks5,
    Connect,
}

impl ProtocolKind {
    /// All kinds, in the order their lists are loaded and reported
    pub const ALL: [ProtocolKind; 5] = [
        ProtocolKind::Http,
        ProtocolKind::Https,
        ProtocolKind::Socks4,
        ProtocolKind::Socks5,
        ProtocolKind::Connect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Http => "http",
            ProtocolKind::Https => "https",
            ProtocolKind::Socks4 => "socks4",
            ProtocolKind::Socks5 => "socks5",
            ProtocolKind::Connect => "connect",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Protocol label reported for a working proxy.
///
/// SOCKS proxies report the negotiation mode that succeeded: `socks5h`/`socks4a`
/// when the proxy resolved the target hostname itself, `socks5`/`socks4` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedProtocol {
    Http,
    Https,
    Socks4,
    Socks4a,
    Socks5,
    Socks5h,
    Connect,
}

impl ResolvedProtocol {
    pub fn label(&self) -> &'static str {
        match self {
            ResolvedProtocol::Http => "http",
            ResolvedProtocol::Https => "https",
            ResolvedProtocol::Socks4 => "socks4",
            ResolvedProtocol::Socks4a => "socks4a",
            ResolvedProtocol::Socks5 => "socks5",
            ResolvedProtocol::Socks5h => "socks5h",
            ResolvedProtocol::Connect => "connect",
        }
    }

    /// Reporting bucket this label collapses into
    pub fn family(&self) -> ProtocolFamily {
        ProtocolFamily::from_label(self.label())
    }
}

impl fmt::Display for ResolvedProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Normalized protocol family used to group results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolFamily {
    Http,
    Https,
    Socks4,
    Socks5,
    Connect,
}

impl ProtocolFamily {
    /// Collapse a resolved protocol label into its family.
    ///
    /// Anything starting with `socks4` or `socks5` lands in that family; the
    /// remaining labels map literally, with `http` as the catch-all.
    pub fn from_label(label: &str) -> Self {
        if label.starts_with("socks4") {
            ProtocolFamily::Socks4
        } else if label.starts_with("socks5") {
            ProtocolFamily::Socks5
        } else {
            match label {
                "https" => ProtocolFamily::Https,
                "connect" => ProtocolFamily::Connect,
                _ => ProtocolFamily::Http,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolFamily::Http => "http",
            ProtocolFamily::Https => "https",
            ProtocolFamily::Socks4 => "socks4",
            ProtocolFamily::Socks5 => "socks5",
            ProtocolFamily::Connect => "connect",
        }
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A proxy endpoint parsed from a `host:port:country` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub country: String,
}

impl ProxyEndpoint {
    pub fn new(host: String, port: u16, country: String) -> Self {
        Self {
            host,
            port,
            country,
        }
    }

    /// Proxy URL for the given scheme, e.g. `socks5h://1.2.3.4:1080`
    pub fn url(&self, scheme: &str) -> String {
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Get the proxy string in HOST:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_simple_string())
    }
}

/// Apparent anonymity level of a working proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anonymity {
    /// The real client IP leaked through
    Transparent,
    /// The proxy announces itself but hides the client IP
    Anonymous,
    /// No leaked IP and no proxy markers
    Elite,
}

impl fmt::Display for Anonymity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anonymity::Transparent => write!(f, "transparent"),
            Anonymity::Anonymous => write!(f, "anonymous"),
            Anonymity::Elite => write!(f, "elite"),
        }
    }
}

/// Record of a proxy that passed verification.
///
/// Dead proxies never get one of these; they are represented by `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub resolved_protocol: ResolvedProtocol,
    /// `host:port`
    pub endpoint: String,
    pub observed_ip: Option<String>,
    pub anonymity: Option<Anonymity>,
    pub server: Option<String>,
    pub country: String,
}

impl ProbeOutcome {
    /// Status string, always `working` for a present outcome
    pub const STATUS: &'static str = "working";

    /// Outcome for a proxy verified with a fetched body, before classification
    pub fn working(resolved_protocol: ResolvedProtocol, endpoint: &ProxyEndpoint) -> Self {
        Self {
            resolved_protocol,
            endpoint: endpoint.to_simple_string(),
            observed_ip: None,
            anonymity: None,
            server: None,
            country: endpoint.country.clone(),
        }
    }

    pub fn status(&self) -> &'static str {
        Self::STATUS
    }

    pub fn family(&self) -> ProtocolFamily {
        self.resolved_protocol.family()
    }
}

/// Working proxies grouped by protocol family.
///
/// Within a family, outcomes keep the order they were inserted in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    groups: BTreeMap<ProtocolFamily, Vec<ProbeOutcome>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: ProbeOutcome) {
        self.groups.entry(outcome.family()).or_default().push(outcome);
    }

    /// Outcomes for one family, empty if none were recorded
    pub fn get(&self, family: ProtocolFamily) -> &[ProbeOutcome] {
        self.groups.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty families in reporting order
    pub fn iter(&self) -> impl Iterator<Item = (ProtocolFamily, &[ProbeOutcome])> {
        self.groups
            .iter()
            .filter(|(_, outcomes)| !outcomes.is_empty())
            .map(|(family, outcomes)| (*family, outcomes.as_slice()))
    }

    /// Total number of working proxies across all families
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
