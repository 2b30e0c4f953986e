//! Response classification for probe bodies
//!
//! The probe target echoes the connecting address either as a bare IPv4 body
//! or as an environment dump with a `REMOTE_ADDR = <ip>` line.

use crate::proxy::models::Anonymity;
use once_cell::sync::Lazy;
use regex::Regex;

static IPV4_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("Invalid IPv4 regex"));

static REMOTE_ADDR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"REMOTE_ADDR = (.*)").expect("Invalid REMOTE_ADDR regex"));

static PROXY_MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"HTTP_VIA|PROXY_REMOTE_ADDR").expect("Invalid proxy marker regex"));

/// Known proxy software, checked in this order
const KNOWN_SERVERS: [&str; 6] = [
    "squid",
    "mikrotik",
    "tinyproxy",
    "litespeed",
    "varnish",
    "haproxy",
];

/// Extract the IP the probe target saw
pub fn extract_ip(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if IPV4_REGEX.is_match(trimmed) {
        return Some(trimmed.to_string());
    }

    let value = REMOTE_ADDR_REGEX.captures(trimmed)?.get(1)?.as_str().trim();
    IPV4_REGEX.is_match(value).then(|| value.to_string())
}

/// Infer anonymity; a leaked `own_ip` wins over proxy markers
pub fn classify_anonymity(body: &str, own_ip: &str) -> Anonymity {
    if body.contains(own_ip) {
        Anonymity::Transparent
    } else if PROXY_MARKER_REGEX.is_match(body) {
        Anonymity::Anonymous
    } else {
        Anonymity::Elite
    }
}

/// Name of the first known proxy software mentioned in the body, case-insensitively
pub fn fingerprint_server(body: &str) -> Option<String> {
    let lowered = body.to_lowercase();
    KNOWN_SERVERS
        .iter()
        .find(|name| lowered.contains(*name))
        .map(|name| name.to_string())
}
