use crate::types::ProbeResult;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

/// Fixed number of connect attempts per candidate.
pub const ATTEMPTS: u32 = 5;

/// Pause between attempts so the probe does not congest its own path.
const INTER_ATTEMPT_DELAY: Duration = Duration::from_millis(20);

/// Probe one address:port with `ATTEMPTS` sequential timed TCP connects.
///
/// Each attempt is a fresh socket, closed immediately on success; latency is
/// the wall-clock elapsed time of the connect call. Individual attempt
/// failures (refused, timed out) are counted as loss and never surfaced.
///
/// The returned entry has `succeeded` when at least one attempt connected,
/// `latency_ms` as the average over successful attempts (-1 otherwise) and
/// `packet_loss_pct` as the failed share of the 5 attempts.
pub async fn probe_connectivity(address: Ipv4Addr, port: u16, timeout: Duration) -> ProbeResult {
    let addr = SocketAddr::from((address, port));
    let mut successful = 0u32;
    let mut total_latency_ms = 0i64;

    for _ in 0..ATTEMPTS {
        let start = Instant::now();
        if let Ok(Ok(stream)) = time::timeout(timeout, TcpStream::connect(addr)).await {
            drop(stream);
            successful += 1;
            total_latency_ms += start.elapsed().as_millis() as i64;
        }
        time::sleep(INTER_ATTEMPT_DELAY).await;
    }

    if successful > 0 {
        let avg = total_latency_ms / successful as i64;
        let loss = ((ATTEMPTS - successful) * 100 / ATTEMPTS) as u8;
        ProbeResult::reachable(address.to_string(), port, avg, loss)
    } else {
        ProbeResult::unreachable(address.to_string(), port)
    }
}
