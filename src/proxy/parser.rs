//! Proxy parser module for parsing `host:port:country` lines and loading proxy lists

use crate::proxy::models::{ProtocolKind, ProxyEndpoint};
use crate::Result;
use anyhow::{anyhow, bail, Context};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Proxy parser for parsing proxies from strings and files
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line in `HOST:PORT:COUNTRY` format
    pub fn parse_line(line: &str) -> Result<ProxyEndpoint> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        if parts.len() != 3 {
            bail!(
                "expected host:port:country, got {} field(s) in {:?}",
                parts.len(),
                line
            );
        }

        let host = parts[0].to_string();
        if host.is_empty() {
            bail!("empty host in {:?}", line);
        }
        let port: u16 = parts[1]
            .parse()
            .map_err(|e| anyhow!("invalid port {:?} in {:?}: {}", parts[1], line, e))?;

        Ok(ProxyEndpoint::new(host, port, parts[2].to_string()))
    }

    /// Split decoded list content into raw lines, skipping blank ones
    pub fn split_lines(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Decode list bytes as UTF-8, falling back to Latin-1 which maps every byte
    pub fn decode(bytes: Vec<u8>) -> String {
        match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
        }
    }

    /// Read raw lines from a file; a missing file is an empty list
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => Ok(Self::split_lines(&Self::decode(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("{} not found, treating as empty", path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// Load `<kind>.txt` for every protocol kind from a directory
    pub fn read_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<(ProtocolKind, Vec<String>)>> {
        let dir = dir.as_ref();
        ProtocolKind::ALL
            .iter()
            .map(|kind| {
                let lines = Self::read_file(dir.join(format!("{}.txt", kind)))?;
                log::info!("loaded {} {} proxies", lines.len(), kind);
                Ok((*kind, lines))
            })
            .collect()
    }
}
