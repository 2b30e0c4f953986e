//! Text reports of working proxies, one file per protocol family

use crate::proxy::models::{ProbeOutcome, ProtocolFamily, ResultSet};
use crate::Result;
use anyhow::Context;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const NOT_AVAILABLE: &str = "N/A";

/// File name used for a family's report
pub fn report_file_name(family: ProtocolFamily) -> String {
    format!("proxy_check_results_{}.md", family)
}

/// Render one outcome as a text block terminated by a blank line
pub fn render_outcome(outcome: &ProbeOutcome) -> String {
    let mut block = String::new();
    let anonymity = outcome.anonymity.map(|a| a.to_string());
    // writing to a String cannot fail
    let _ = writeln!(block, "Protocol: {}", outcome.resolved_protocol);
    let _ = writeln!(block, "Proxy: {}", outcome.endpoint);
    let _ = writeln!(block, "Status: {}", outcome.status());
    let _ = writeln!(block, "IP: {}", or_na(outcome.observed_ip.as_deref()));
    let _ = writeln!(block, "Anon: {}", or_na(anonymity.as_deref()));
    let _ = writeln!(block, "Server: {}", or_na(outcome.server.as_deref()));
    let _ = writeln!(block, "Country: {}", outcome.country);
    block.push('\n');
    block
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or(NOT_AVAILABLE)
}

/// Write a report for every non-empty family into `dir`
pub fn write_reports<P: AsRef<Path>>(results: &ResultSet, dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for (family, outcomes) in results.iter() {
        let path = dir.join(report_file_name(family));
        let content: String = outcomes.iter().map(render_outcome).collect();
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("saved {} {} proxies to {}", outcomes.len(), family, path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::aggregate;
    use crate::proxy::models::{Anonymity, ProxyEndpoint, ResolvedProtocol};

    fn endpoint() -> ProxyEndpoint {
        ProxyEndpoint::new("10.1.1.1".to_string(), 1080, "BR".to_string())
    }

    #[test]
    fn test_render_full_outcome() {
        let mut outcome = ProbeOutcome::working(ResolvedProtocol::Socks5h, &endpoint());
        outcome.observed_ip = Some("203.0.113.5".to_string());
        outcome.anonymity = Some(Anonymity::Elite);
        outcome.server = Some("squid".to_string());

        assert_eq!(
            render_outcome(&outcome),
            "Protocol: socks5h\nProxy: 10.1.1.1:1080\nStatus: working\nIP: 203.0.113.5\n\
             Anon: elite\nServer: squid\nCountry: BR\n\n"
        );
    }

    #[test]
    fn test_render_missing_fields() {
        let outcome = ProbeOutcome::working(ResolvedProtocol::Connect, &endpoint());
        let block = render_outcome(&outcome);
        assert!(block.contains("IP: N/A\n"));
        assert!(block.contains("Anon: N/A\n"));
        assert!(block.contains("Server: N/A\n"));
    }

    #[test]
    fn test_write_only_non_empty_families() {
        let dir = tempfile::tempdir().unwrap();
        let results = aggregate(vec![
            Some(ProbeOutcome::working(ResolvedProtocol::Socks5, &endpoint())),
            Some(ProbeOutcome::working(ResolvedProtocol::Socks5h, &endpoint())),
            None,
        ]);

        let written = write_reports(&results, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("proxy_check_results_socks5.md")]);
        assert!(!dir.path().join("proxy_check_results_http.md").exists());

        let content = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(content.matches("Status: working").count(), 2);
        assert!(content.starts_with("Protocol: socks5\n"));
    }
}
