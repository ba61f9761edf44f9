use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use edge_scan_rs::types::{ExchangeStatus, ProbeResult, ScanConfig, ScanState};
use edge_scan_rs::{catalog, resolvers, rewrite, scanner::ScanCoordinator, server, speedtest};

use anyhow::Result;
use clap::Parser;

/// edge-scan-rs — concurrent CDN edge endpoint prober with a JSON read view.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "edge-scan-rs",
    version,
    about = "Discover, verify and rank responsive CDN edge addresses drawn from CIDR ranges.",
    long_about = None
)]
struct Cli {
    /// CIDR range to scan (repeatable). Omit to use the built-in edge catalog.
    #[arg(long = "range")]
    ranges: Vec<String>,

    /// Port probed on every candidate address.
    #[arg(long, default_value_t = 443)]
    port: u16,

    /// Max simultaneously active probe tasks.
    #[arg(long, default_value_t = 100)]
    concurrency: usize,

    /// Per connect-attempt timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 500)]
    timeout_ms: u64,

    /// Stop once this many verified endpoints were found.
    #[arg(long = "max-results", default_value_t = 20)]
    max_results: usize,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Serve the JSON read view instead of scanning directly.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Bind address for --serve-ui.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Probe DNS resolvers from this file (one IP per line) instead of scanning.
    #[arg(long = "find-dns")]
    resolvers: Option<PathBuf>,

    /// Domain resolved while validating resolvers in --find-dns mode.
    #[arg(long = "test-domain", default_value = "www.github.com")]
    test_domain: String,

    /// Run a latency/download speed test instead of scanning.
    #[arg(long = "speed-test", default_value_t = false)]
    speed_test: bool,

    /// Rewrite proxy links from this file with the best address found.
    #[arg(long)]
    rewrite: Option<PathBuf>,

    /// Fetch a subscription URL and rewrite its links with the best address found.
    #[arg(long)]
    subscription: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.resolvers.as_deref() {
        let content = std::fs::read_to_string(path)?;
        let candidates: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        println!(
            "Probing a sample of {} resolvers against {}...",
            candidates.len().min(resolvers::DEFAULT_SAMPLE),
            cli.test_domain
        );
        let results = resolvers::find_working_resolvers(
            &candidates,
            &cli.test_domain,
            resolvers::DEFAULT_SAMPLE,
        )
        .await;
        if results.is_empty() {
            println!("No working resolvers found.");
        }
        for r in results.iter().take(10) {
            println!("{:<16}  {:>5} ms", r.ip, r.latency_ms);
        }
        return Ok(());
    }

    if cli.speed_test {
        println!("Measuring connect latency to 1.1.1.1:443...");
        let stats =
            speedtest::ping_stats("1.1.1.1", 443, 10, Duration::from_millis(800)).await;
        println!(
            "  latency: {} ms   loss: {}%   jitter: {} ms",
            stats.avg_latency_ms, stats.loss_pct, stats.jitter_ms
        );
        println!("Measuring download throughput...");
        match speedtest::measure_download(
            speedtest::DEFAULT_DOWNLOAD_URL,
            Duration::from_secs(10),
        )
        .await
        {
            Ok(mbps) => println!("  download: {:.2} Mbit/s", mbps),
            Err(e) => eprintln!("  download test failed: {e}"),
        }
        return Ok(());
    }

    if cli.serve_ui {
        let coordinator = ScanCoordinator::new();
        server::spawn_server(&cli.bind, coordinator).await?;
        return Ok(());
    }

    println!("edge-scan-rs configuration:");
    if cli.ranges.is_empty() {
        println!(
            "  ranges       : <built-in catalog, {} ranges>",
            catalog::DEFAULT_RANGES.len()
        );
    } else {
        println!("  ranges       : {}", cli.ranges.join(", "));
    }
    println!("  port         : {}", cli.port);
    println!("  concurrency  : {}", cli.concurrency);
    println!("  timeout_ms   : {}", cli.timeout_ms);
    println!("  max_results  : {}", cli.max_results);

    let config = ScanConfig {
        ranges: cli.ranges.clone(),
        concurrency: cli.concurrency,
        timeout_ms: cli.timeout_ms,
        max_results: cli.max_results,
        target_port: cli.port,
    };

    let coordinator = ScanCoordinator::new();
    coordinator.start(config).await?;

    // Ctrl-C requests a cooperative stop; in-flight probes still land.
    let stopper = coordinator.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        eprintln!("\nStopping scan (in-flight probes will finish)...");
        stopper.stop();
    });

    let mut last_found = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let found = coordinator.found().await;
        if found != last_found {
            println!("  found {found}/{} verified endpoints", cli.max_results);
            last_found = found;
        }
        if coordinator.state() == ScanState::Idle {
            break;
        }
    }

    let results = coordinator.snapshot().await;
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    print_results_table(&results);

    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_results_json(path, &results) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON results to {}", path.display());
        }
    }

    // Feed the best address into the link rewriter when asked.
    let best = &results[0];
    let mut raw_links = String::new();
    if let Some(path) = cli.rewrite.as_deref() {
        raw_links.push_str(&std::fs::read_to_string(path)?);
        raw_links.push('\n');
    }
    if let Some(url) = cli.subscription.as_deref() {
        println!("Fetching subscription {url}...");
        match rewrite::fetch_subscription(url).await {
            Ok(links) => {
                for l in links {
                    raw_links.push_str(&l);
                    raw_links.push('\n');
                }
            }
            Err(e) => eprintln!("Subscription fetch failed: {e}"),
        }
    }
    if !raw_links.trim().is_empty() {
        let rewritten = rewrite::rewrite_links(&raw_links, &best.address);
        if rewritten.is_empty() {
            println!("No rewritable links found.");
        } else {
            println!("\nLinks rewritten to {}:", best.address);
            for link in rewritten {
                println!("{link}");
            }
        }
    }

    Ok(())
}

fn print_results_table(results: &[ProbeResult]) {
    let mut addr_w = "address".len();
    let mut pop_w = "pop".len();
    for e in results {
        addr_w = addr_w.max(e.address.len());
        pop_w = pop_w.max(e.pop.len());
    }

    println!("\nVerified endpoints: {}", results.len());
    println!(
        "{:<addr_w$}  {:>5}  {:>10}  {:>5}  {:<pop_w$}  {:<6}  {:<14}",
        "address",
        "port",
        "latency_ms",
        "loss%",
        "pop",
        "region",
        "exchange",
        addr_w = addr_w,
        pop_w = pop_w
    );
    println!(
        "{:-<addr_w$}  {:-<5}  {:-<10}  {:-<5}  {:-<pop_w$}  {:-<6}  {:-<14}",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        addr_w = addr_w,
        pop_w = pop_w
    );
    for e in results {
        println!(
            "{:<addr_w$}  {:>5}  {:>10}  {:>5}  {:<pop_w$}  {:<6}  {:<14}",
            e.address,
            e.port,
            e.latency_ms,
            e.packet_loss_pct,
            e.pop,
            e.region,
            exchange_label(e.exchange),
            addr_w = addr_w,
            pop_w = pop_w
        );
    }
}

fn exchange_label(status: ExchangeStatus) -> &'static str {
    match status {
        ExchangeStatus::Pending => "pending",
        ExchangeStatus::Success => "success",
        ExchangeStatus::NoResponse => "no-response",
        ExchangeStatus::ExchangeError => "exchange-error",
    }
}

fn write_results_json(path: &std::path::Path, results: &[ProbeResult]) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
