use crate::addrgen;
use crate::enrich;
use crate::probe;
use crate::ranking::RankedResults;
use crate::types::{ProbeResult, ScanConfig, ScanState};
use anyhow::Result;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Throttle between scan-loop iterations, bounding CPU spin and the
/// connection-burst rate regardless of slot availability.
const LOOP_TICK: Duration = Duration::from_millis(15);

/// Owns the bounded-concurrency scan loop and the live result set.
///
/// Lifecycle: `Idle -> Running -> (Idle | Stopped -> Idle)`. The result set is
/// the coordinator's only externally observable effect; presentation layers
/// read it through `snapshot()` and never touch internal storage. Cancellation
/// is cooperative: `stop()` flips a token observed before each new launch, so
/// in-flight probes finish (their results are still recorded) but no new
/// tasks are admitted.
#[derive(Clone)]
pub struct ScanCoordinator {
    state: Arc<StdMutex<ScanState>>,
    results: Arc<Mutex<RankedResults>>,
    cancel: Arc<StdMutex<CancellationToken>>,
}

impl ScanCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(StdMutex::new(ScanState::Idle)),
            results: Arc::new(Mutex::new(RankedResults::new(0))),
            cancel: Arc::new(StdMutex::new(CancellationToken::new())),
        }
    }

    /// Begin a scan on a background task. Rejects invalid configuration;
    /// no-ops when a scan is already running or still settling after a stop.
    pub async fn start(&self, config: ScanConfig) -> Result<()> {
        config.validate()?;
        let token = CancellationToken::new();
        {
            let mut state = self.state.lock().expect("state lock");
            if *state != ScanState::Idle {
                return Ok(());
            }
            *state = ScanState::Running;
            // The token swap shares the critical section: a concurrent stop()
            // must never observe Running while the previous scan's token is
            // still installed, or its cancel would hit the wrong token.
            *self.cancel.lock().expect("cancel lock") = token.clone();
        }
        // Results are cleared at scan start, never at scan end, so the last
        // scan's entries stay readable while Idle.
        *self.results.lock().await = RankedResults::new(config.max_results);

        let coord = self.clone();
        tokio::spawn(run_loop(coord, config, token));
        Ok(())
    }

    /// Request cooperative cancellation. In-flight tasks still complete and
    /// may record results; the state returns to Idle once the loop drains.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("state lock");
        if *state == ScanState::Running {
            *state = ScanState::Stopped;
            self.cancel.lock().expect("cancel lock").cancel();
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock().expect("state lock")
    }

    /// Defensively-copied view of the current result set, ordered by rank.
    pub async fn snapshot(&self) -> Vec<ProbeResult> {
        self.results.lock().await.snapshot()
    }

    pub async fn found(&self) -> usize {
        self.results.lock().await.len()
    }
}

impl Default for ScanCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(coord: ScanCoordinator, config: ScanConfig, cancel: CancellationToken) {
    let sem = Arc::new(Semaphore::new(config.concurrency.clamp(1, 5_000)));
    let mut tasks = JoinSet::new();
    let timeout = Duration::from_millis(config.timeout_ms);
    let ranges = Arc::new(config.ranges);

    loop {
        if cancel.is_cancelled() {
            break;
        }
        if coord.results.lock().await.is_full() {
            break;
        }
        if let Ok(permit) = sem.clone().try_acquire_owned() {
            let results = Arc::clone(&coord.results);
            let cancel = cancel.clone();
            let ranges = Arc::clone(&ranges);
            let port = config.target_port;
            tasks.spawn(async move {
                let _permit = permit; // held for the task's entire lifetime
                if cancel.is_cancelled() {
                    return;
                }
                probe_one(&results, &ranges, port, timeout).await;
            });
        }
        time::sleep(LOOP_TICK).await;
    }

    // In-flight tasks finish and may still enrich their entries; the set can
    // grow up to, but never past, its cap.
    while tasks.join_next().await.is_some() {}

    *coord.state.lock().expect("state lock") = ScanState::Idle;
}

/// One admitted probe task: draw a candidate, verify connectivity, record a
/// provisional entry, then run both enrichment checks concurrently and apply
/// the enriched update.
async fn probe_one(
    results: &Mutex<RankedResults>,
    ranges: &[String],
    port: u16,
    timeout: Duration,
) {
    let Some(address) = addrgen::pick_candidate(ranges) else {
        return;
    };
    let result = probe::probe_connectivity(address, port, timeout).await;
    if !result.succeeded {
        return;
    }
    let key = result.address.clone();
    results.lock().await.insert_provisional(result);

    // Independent checks, each bounded by its own timeout; both settle before
    // the enriched update. A duplicate discovery refreshes the existing entry.
    let ((pop, region), exchange) = tokio::join!(
        enrich::fetch_edge_trace(address),
        enrich::check_exchange(address, port),
    );
    results.lock().await.update_enriched(&key, pop, region, exchange);
}
