//! Per-protocol verification strategies
//!
//! Every strategy swallows its own failures: a dead proxy yields `None`.

use crate::proxy::checker::CheckerConfig;
use crate::proxy::classifier;
use crate::proxy::models::{ProbeOutcome, ProtocolKind, ProxyEndpoint, ResolvedProtocol};
use crate::proxy::tunnel::{TunnelConnector, TunnelStream};
use crate::Result;
use anyhow::bail;
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time;

/// Target of the CONNECT handshake, independent of the configured probe URL
const CONNECT_TARGET: &str = "localhost:80";

/// Maximum number of bytes read from a CONNECT reply
const CONNECT_REPLY_LIMIT: usize = 4096;

/// Marker of an established tunnel in a CONNECT reply
const CONNECT_ESTABLISHED: &str = "200 Connection established";

/// One way of talking to a SOCKS proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationMode {
    /// Proxy URL scheme understood by the HTTP client
    pub scheme: &'static str,
    /// Label reported when this mode succeeds
    pub label: ResolvedProtocol,
}

/// Proxy-side resolution first, client-side resolution second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationModes {
    pub preferred: NegotiationMode,
    pub fallback: NegotiationMode,
}

impl NegotiationModes {
    pub const SOCKS5: NegotiationModes = NegotiationModes {
        preferred: NegotiationMode {
            scheme: "socks5h",
            label: ResolvedProtocol::Socks5h,
        },
        fallback: NegotiationMode {
            scheme: "socks5",
            label: ResolvedProtocol::Socks5,
        },
    };

    pub const SOCKS4: NegotiationModes = NegotiationModes {
        preferred: NegotiationMode {
            scheme: "socks4a",
            label: ResolvedProtocol::Socks4a,
        },
        fallback: NegotiationMode {
            scheme: "socks4",
            label: ResolvedProtocol::Socks4,
        },
    };
}

/// Verify one endpoint with the strategy matching `kind`
pub async fn verify(
    endpoint: &ProxyEndpoint,
    kind: ProtocolKind,
    config: &CheckerConfig,
    connector: &dyn TunnelConnector,
) -> Option<ProbeOutcome> {
    match kind {
        ProtocolKind::Http => verify_http(endpoint, config).await,
        ProtocolKind::Https => verify_https(endpoint, config).await,
        ProtocolKind::Socks4 => verify_socks(endpoint, NegotiationModes::SOCKS4, config).await,
        ProtocolKind::Socks5 => verify_socks(endpoint, NegotiationModes::SOCKS5, config).await,
        ProtocolKind::Connect => verify_connect(endpoint, config, connector).await,
    }
}

/// Plain forward proxy
pub async fn verify_http(endpoint: &ProxyEndpoint, config: &CheckerConfig) -> Option<ProbeOutcome> {
    let result = async {
        let proxy = ReqwestProxy::all(endpoint.url("http"))?;
        fetch(proxy, config, true).await
    }
    .await;

    finish(endpoint, ResolvedProtocol::Http, result, config)
}

/// TLS proxy, with full certificate verification
pub async fn verify_https(endpoint: &ProxyEndpoint, config: &CheckerConfig) -> Option<ProbeOutcome> {
    let result = async {
        let proxy = ReqwestProxy::all(endpoint.url("https"))?;
        fetch(proxy, config, false).await
    }
    .await;

    finish(endpoint, ResolvedProtocol::Https, result, config)
}

/// SOCKS proxy, trying the preferred mode before the fallback mode.
///
/// Both modes share one timeout budget.
pub async fn verify_socks(
    endpoint: &ProxyEndpoint,
    modes: NegotiationModes,
    config: &CheckerConfig,
) -> Option<ProbeOutcome> {
    let negotiate = async {
        for mode in [modes.preferred, modes.fallback] {
            log::debug!("{}: trying {}", endpoint, mode.scheme);
            let result = async {
                let proxy = ReqwestProxy::all(endpoint.url(mode.scheme))?;
                fetch(proxy, config, true).await
            }
            .await;

            if let Some(outcome) = finish(endpoint, mode.label, result, config) {
                return Some(outcome);
            }
        }
        None
    };

    match time::timeout(config.timeout, negotiate).await {
        Ok(outcome) => outcome,
        Err(_) => {
            log::debug!("{}: socks negotiation timed out", endpoint);
            None
        }
    }
}

/// Raw CONNECT handshake, no body is fetched through the tunnel
pub async fn verify_connect(
    endpoint: &ProxyEndpoint,
    config: &CheckerConfig,
    connector: &dyn TunnelConnector,
) -> Option<ProbeOutcome> {
    log::debug!("{}: sending CONNECT {}", endpoint, CONNECT_TARGET);
    match time::timeout(config.timeout, connect_handshake(endpoint, connector)).await {
        Ok(Ok(reply)) if reply.contains(CONNECT_ESTABLISHED) => {
            Some(ProbeOutcome::working(ResolvedProtocol::Connect, endpoint))
        }
        Ok(Ok(reply)) => {
            log::debug!(
                "{}: CONNECT refused: {:?}",
                endpoint,
                reply.lines().next().unwrap_or_default()
            );
            None
        }
        Ok(Err(e)) => {
            log::debug!("{}: CONNECT failed: {}", endpoint, e);
            None
        }
        Err(_) => {
            log::debug!("{}: CONNECT timed out", endpoint);
            None
        }
    }
}

/// Connect, send the request and read the reply.
///
/// The stream only exists inside this future, so it is dropped on every exit,
/// including cancellation by the caller's timeout.
async fn connect_handshake(
    endpoint: &ProxyEndpoint,
    connector: &dyn TunnelConnector,
) -> io::Result<String> {
    let mut stream = connector.connect(&endpoint.host, endpoint.port).await?;
    let request = format!(
        "CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n",
        target = CONNECT_TARGET
    );
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;
    read_reply(stream.as_mut()).await
}

/// Read until the tunnel marker shows up, the reply head ends, EOF, or the size limit
async fn read_reply(stream: &mut dyn TunnelStream) -> io::Result<String> {
    let mut buf = vec![0u8; CONNECT_REPLY_LIMIT];
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
        let received = &buf[..filled];
        if contains(received, CONNECT_ESTABLISHED.as_bytes()) || contains(received, b"\r\n\r\n") {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf[..filled]).into_owned())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// GET the probe URL through `proxy`, returning the body of a 200 response
async fn fetch(proxy: ReqwestProxy, config: &CheckerConfig, lenient_tls: bool) -> Result<String> {
    let client = Client::builder()
        .proxy(proxy)
        .timeout(config.timeout)
        .danger_accept_invalid_certs(lenient_tls)
        .build()?;

    let body = time::timeout(config.timeout, async {
        let response = client.get(&config.probe_url).send().await?;
        if response.status() != StatusCode::OK {
            bail!("HTTP status: {}", response.status());
        }
        Ok::<_, anyhow::Error>(response.text().await?)
    })
    .await
    .map_err(|_| anyhow::anyhow!("timed out after {:?}", config.timeout))??;

    Ok(body)
}

/// Turn a fetch result into a classified outcome, logging failures
fn finish(
    endpoint: &ProxyEndpoint,
    label: ResolvedProtocol,
    result: Result<String>,
    config: &CheckerConfig,
) -> Option<ProbeOutcome> {
    match result {
        Ok(body) => Some(classify(endpoint, label, &body, &config.reference_ip)),
        Err(e) => {
            log::debug!("{}: {} failed: {:#}", endpoint, label, e);
            None
        }
    }
}

/// Build a working outcome from a fetched body
pub fn classify(
    endpoint: &ProxyEndpoint,
    label: ResolvedProtocol,
    body: &str,
    reference_ip: &str,
) -> ProbeOutcome {
    let mut outcome = ProbeOutcome::working(label, endpoint);
    outcome.observed_ip = classifier::extract_ip(body);
    outcome.anonymity = Some(classifier::classify_anonymity(body, reference_ip));
    outcome.server = classifier::fingerprint_server(body);
    outcome
}
