//! Proxy checker module for checking proxy validity

use crate::proxy::aggregator;
use crate::proxy::models::{ProbeOutcome, ProtocolKind, ResultSet};
use crate::proxy::parser::ProxyParser;
use crate::proxy::strategy;
use crate::proxy::tunnel::{TcpConnector, TunnelConnector};
use crate::Result;
use anyhow::{bail, Context};
use futures::stream::{self, StreamExt};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrent checks
const DEFAULT_CONCURRENCY: usize = 100;

/// Default URL to test proxies against
const DEFAULT_PROBE_URL: &str = "http://localhost";

/// Default address considered to be this machine's real IP
const DEFAULT_REFERENCE_IP: &str = "127.0.0.1";

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each network attempt
    pub timeout: Duration,
    /// Number of concurrent checks
    pub concurrency: usize,
    /// URL to test proxies against
    pub probe_url: String,
    /// Real client IP, used to detect transparent proxies
    pub reference_ip: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            reference_ip: DEFAULT_REFERENCE_IP.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_probe_url(mut self, url: String) -> Self {
        self.probe_url = url;
        self
    }

    pub fn with_reference_ip(mut self, ip: String) -> Self {
        self.reference_ip = ip;
        self
    }

    /// Reject settings no batch can run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }
        self.reference_ip
            .parse::<IpAddr>()
            .with_context(|| format!("invalid reference IP {:?}", self.reference_ip))?;
        reqwest::Url::parse(&self.probe_url)
            .with_context(|| format!("invalid probe URL {:?}", self.probe_url))?;
        Ok(())
    }
}

/// Proxy checker for validating proxies
#[derive(Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
    connector: Arc<dyn TunnelConnector>,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self {
            config,
            connector: Arc::new(TcpConnector),
        }
    }

    /// Replace the transport used for CONNECT probes
    pub fn with_connector(mut self, connector: Arc<dyn TunnelConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a single raw `host:port:country` line as `kind`
    pub async fn execute(&self, line: &str, kind: ProtocolKind) -> Option<ProbeOutcome> {
        let endpoint = match ProxyParser::parse_line(line) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                log::warn!("skipping {} entry: {:#}", kind, e);
                return None;
            }
        };

        log::debug!("checking {} proxy {}", kind, endpoint);
        strategy::verify(&endpoint, kind, &self.config, self.connector.as_ref()).await
    }

    /// Check every line of every list concurrently.
    ///
    /// Returns once all probes have finished, in completion order, with `None`
    /// for every dead or malformed entry.
    pub async fn run_checks(
        &self,
        lists: Vec<(ProtocolKind, Vec<String>)>,
    ) -> Result<Vec<Option<ProbeOutcome>>> {
        self.config.validate()?;

        let jobs: Vec<(String, ProtocolKind)> = lists
            .into_iter()
            .flat_map(|(kind, lines)| lines.into_iter().map(move |line| (line, kind)))
            .collect();

        log::info!(
            "checking {} proxies with {} workers, timeout {:?}",
            jobs.len(),
            self.config.concurrency,
            self.config.timeout
        );
        let start = Instant::now();

        // a probe task is only spawned once buffer_unordered polls it, so at
        // most `concurrency` of them exist at a time
        let results = stream::iter(jobs)
            .map(|(line, kind)| {
                let checker = self.clone();
                async move {
                    let handle =
                        tokio::spawn(async move { checker.execute(&line, kind).await });
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            log::warn!("{} probe task failed: {}", kind, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await;

        log::info!(
            "finished {} checks in {:.1}s, {} working",
            results.len(),
            start.elapsed().as_secs_f64(),
            results.iter().flatten().count()
        );
        Ok(results)
    }

    /// Check every list and group the working proxies by family
    pub async fn check_all(&self, lists: Vec<(ProtocolKind, Vec<String>)>) -> Result<ResultSet> {
        let outcomes = self.run_checks(lists).await?;
        Ok(aggregator::aggregate(outcomes))
    }
}

impl Default for ProxyChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::{ProtocolFamily, ResolvedProtocol};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts connections and never answers
    async fn spawn_silent_server() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        addr
    }

    /// Answers CONNECT with an established tunnel
    async fn spawn_connect_server() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                        .await;
                });
            }
        });
        addr
    }

    #[test]
    fn test_checker_config_default() {
        let config = CheckerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.probe_url, DEFAULT_PROBE_URL);
        assert_eq!(config.reference_ip, DEFAULT_REFERENCE_IP);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_checker_config_builder() {
        let config = CheckerConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_concurrency(20)
            .with_probe_url("http://example.com".to_string())
            .with_reference_ip("198.51.100.1".to_string());

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.probe_url, "http://example.com");
        assert_eq!(config.reference_ip, "198.51.100.1");
    }

    #[test]
    fn test_checker_config_validation() {
        assert!(CheckerConfig::new().with_concurrency(0).validate().is_err());
        assert!(CheckerConfig::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(CheckerConfig::new()
            .with_reference_ip("not-an-ip".to_string())
            .validate()
            .is_err());
        assert!(CheckerConfig::new()
            .with_probe_url("not a url".to_string())
            .validate()
            .is_err());
    }

    #[test]
    fn test_proxy_checker_with_config() {
        let config = CheckerConfig::new().with_concurrency(50);
        let checker = ProxyChecker::with_config(config);
        assert_eq!(checker.config().concurrency, 50);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_probing() {
        let checker = ProxyChecker::with_config(CheckerConfig::new().with_concurrency(0));
        let lists = vec![(ProtocolKind::Http, vec!["127.0.0.1:1:US".to_string()])];
        assert!(checker.run_checks(lists).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_malformed_line() {
        let checker = ProxyChecker::new();
        assert!(checker.execute("not-a-proxy", ProtocolKind::Http).await.is_none());
        assert!(checker
            .execute("127.0.0.1:8080", ProtocolKind::Connect)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_lines_do_not_affect_batch() {
        let addr = spawn_connect_server().await;
        let checker = ProxyChecker::with_config(
            CheckerConfig::new().with_timeout(Duration::from_secs(2)),
        );
        let lists = vec![(
            ProtocolKind::Connect,
            vec![
                "garbage".to_string(),
                format!("{}:{}:NL", addr.ip(), addr.port()),
                "1.2.3.4:notaport:US".to_string(),
            ],
        )];

        let outcomes = checker.run_checks(lists).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        let working: Vec<_> = outcomes.into_iter().flatten().collect();
        assert_eq!(working.len(), 1);
        assert_eq!(working[0].resolved_protocol, ResolvedProtocol::Connect);
        assert_eq!(working[0].country, "NL");
    }

    #[tokio::test]
    async fn test_timeouts_run_concurrently() {
        let addr = spawn_silent_server().await;
        let timeout = Duration::from_secs(1);
        let checker = ProxyChecker::with_config(
            CheckerConfig::new()
                .with_timeout(timeout)
                .with_concurrency(64),
        );
        let line = format!("{}:{}:US", addr.ip(), addr.port());
        let lists = vec![
            (ProtocolKind::Http, vec![line.clone(); 16]),
            (ProtocolKind::Connect, vec![line; 16]),
        ];

        let start = Instant::now();
        let outcomes = checker.run_checks(lists).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcomes.len(), 32);
        assert!(outcomes.iter().all(Option::is_none));
        assert!(elapsed < timeout * 5, "batch took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_worker_cap_limits_concurrency() {
        let addr = spawn_silent_server().await;
        let timeout = Duration::from_millis(500);
        let checker = ProxyChecker::with_config(
            CheckerConfig::new()
                .with_timeout(timeout)
                .with_concurrency(2),
        );
        let line = format!("{}:{}:US", addr.ip(), addr.port());
        let lists = vec![(ProtocolKind::Connect, vec![line; 4])];

        let start = Instant::now();
        let outcomes = checker.run_checks(lists).await.unwrap();

        assert_eq!(outcomes.len(), 4);
        assert!(start.elapsed() >= timeout * 2 - Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_check_all_groups_results() {
        let addr = spawn_connect_server().await;
        let checker = ProxyChecker::with_config(
            CheckerConfig::new().with_timeout(Duration::from_secs(2)),
        );
        let lists = vec![
            (
                ProtocolKind::Connect,
                vec![format!("{}:{}:JP", addr.ip(), addr.port())],
            ),
            (ProtocolKind::Socks5, vec!["bad line".to_string()]),
        ];

        let results = checker.check_all(lists).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.get(ProtocolFamily::Connect).len(), 1);
        assert!(results.get(ProtocolFamily::Socks5).is_empty());
    }
}
