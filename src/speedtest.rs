use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

/// Well-known bulk-download endpoint used when the caller does not supply one.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=20000000";

/// Latency statistics from repeated timed connects.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PingStats {
    /// Average connect latency; -1 when every attempt failed.
    pub avg_latency_ms: i64,
    pub loss_pct: u8,
    /// Mean absolute difference between consecutive latencies; 0 with fewer
    /// than two samples.
    pub jitter_ms: i64,
}

/// Measure connect latency, loss and jitter against one host:port with
/// `attempts` sequential timed connects. Attempt failures count as loss and
/// are never surfaced.
pub async fn ping_stats(host: &str, port: u16, attempts: u32, timeout: Duration) -> PingStats {
    let mut latencies: Vec<i64> = Vec::new();
    for _ in 0..attempts {
        let start = Instant::now();
        if let Ok(Ok(stream)) = time::timeout(timeout, TcpStream::connect((host, port))).await {
            drop(stream);
            latencies.push(start.elapsed().as_millis() as i64);
        }
    }

    let lost = attempts as usize - latencies.len();
    let loss_pct = if attempts == 0 {
        0
    } else {
        (lost * 100 / attempts as usize) as u8
    };
    let avg_latency_ms = if latencies.is_empty() {
        -1
    } else {
        latencies.iter().sum::<i64>() / latencies.len() as i64
    };
    PingStats {
        avg_latency_ms,
        loss_pct,
        jitter_ms: jitter_of(&latencies),
    }
}

/// Stream a download and return the observed throughput in Mbit/s. Reading
/// stops at EOF or once the wall-clock budget is spent, whichever comes
/// first.
pub async fn measure_download(url: &str, budget: Duration) -> Result<f64> {
    let start = Instant::now();
    let mut response = reqwest::get(url).await?;
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        total_bytes += chunk.len() as u64;
        if start.elapsed() >= budget {
            break;
        }
    }
    let secs = start.elapsed().as_secs_f64();
    if secs <= 0.0 {
        return Ok(0.0);
    }
    Ok((total_bytes as f64 * 8.0) / (secs * 1024.0 * 1024.0))
}

fn jitter_of(latencies: &[i64]) -> i64 {
    if latencies.len() < 2 {
        return 0;
    }
    let diffs: i64 = latencies.windows(2).map(|w| (w[0] - w[1]).abs()).sum();
    diffs / (latencies.len() as i64 - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn jitter_needs_two_samples() {
        assert_eq!(jitter_of(&[]), 0);
        assert_eq!(jitter_of(&[40]), 0);
        assert_eq!(jitter_of(&[40, 50, 30]), 15);
    }

    #[tokio::test]
    async fn ping_stats_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let stats = ping_stats("127.0.0.1", port, 4, Duration::from_millis(500)).await;
        assert_eq!(stats.loss_pct, 0);
        assert!(stats.avg_latency_ms >= 0);
    }

    #[tokio::test]
    async fn ping_stats_total_loss_on_closed_port() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let stats = ping_stats("127.0.0.1", port, 4, Duration::from_millis(200)).await;
        assert_eq!(stats.loss_pct, 100);
        assert_eq!(stats.avg_latency_ms, -1);
        assert_eq!(stats.jitter_ms, 0);
    }
}
