use anyhow::Result;
use clap::Parser;
use open_proxy_checker::{
    initialize_logging,
    proxy::{CheckerConfig, ProxyChecker, ProxyParser},
    report,
};
use std::path::PathBuf;
use std::time::Duration;

/// Check proxy lists and report the working ones by protocol
#[derive(Parser)]
#[command(name = "open-proxy-checker")]
#[command(about = "Check HTTP, HTTPS, SOCKS4, SOCKS5 and CONNECT proxies")]
struct Cli {
    /// Directory containing http.txt, https.txt, socks4.txt, socks5.txt and connect.txt
    #[arg(short, long, default_value = ".")]
    input_dir: PathBuf,

    /// Directory to write proxy_check_results_<protocol>.md files into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Number of concurrent checks
    #[arg(short = 'n', long, default_value = "100")]
    threads: usize,

    /// Timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// This machine's IP, used to detect transparent proxies
    #[arg(long, default_value = "127.0.0.1")]
    reference_ip: String,

    /// URL to test proxies against
    #[arg(long, default_value = "http://localhost")]
    probe_url: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(cli.verbose as usize)?;

    let config = CheckerConfig::new()
        .with_concurrency(cli.threads)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_reference_ip(cli.reference_ip)
        .with_probe_url(cli.probe_url);
    config.validate()?;

    let lists = ProxyParser::read_dir(&cli.input_dir)?;
    let checker = ProxyChecker::with_config(config);
    let results = checker.check_all(lists).await?;

    println!("Results: {} working", results.len());
    for path in report::write_reports(&results, &cli.output_dir)? {
        println!("Saved {}", path.display());
    }

    Ok(())
}
