//! Proxy module for parsing and checking proxies
//!
//! This module provides functionality for:
//! - Parsing `host:port:country` proxy lists
//! - Verifying HTTP, HTTPS, SOCKS4, SOCKS5 and CONNECT proxies concurrently
//! - Classifying anonymity and proxy software from probe responses
//! - Grouping working proxies by protocol family

pub mod aggregator;
pub mod checker;
pub mod classifier;
pub mod models;
pub mod parser;
pub mod strategy;
pub mod tunnel;

pub use aggregator::aggregate;
pub use checker::{CheckerConfig, ProxyChecker};
pub use models::{
    Anonymity, ProbeOutcome, ProtocolFamily, ProtocolKind, ProxyEndpoint, ResolvedProtocol,
    ResultSet,
};
pub use parser::ProxyParser;
pub use tunnel::{TcpConnector, TunnelConnector, TunnelStream};
