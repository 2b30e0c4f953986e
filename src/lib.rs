//! Open Proxy Checker - concurrent proxy verification
//!
//! Verifies HTTP, HTTPS, SOCKS4, SOCKS5 and CONNECT proxies, classifies their
//! anonymity and detects common proxy software.

pub mod proxy;
pub mod report;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Initialize logging to stderr.
///
/// `verbosity` 0 shows warnings and errors, each step adds a level up to trace.
pub fn initialize_logging(verbosity: usize) -> Result<()> {
    stderrlog::new()
        .module(module_path!())
        .show_module_names(true)
        .verbosity(verbosity + 1)
        .init()?;
    Ok(())
}
