use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use ::time::{format_description::well_known, OffsetDateTime};

/// Placeholder shown until the trace lookup fills in the real point of presence.
pub const SEARCHING_POP: &str = "searching...";
/// Two-letter region placeholder until the trace lookup resolves it.
pub const UNKNOWN_REGION: &str = "??";
/// Informational MTU default carried on every entry; never measured by the prober.
pub const DEFAULT_MTU_HINT: u16 = 1420;

/// Outcome of the payload-exchange verification against an endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    /// Not yet checked; set on provisional insert.
    Pending,
    /// At least one response byte was read back.
    Success,
    /// The peer closed the connection without sending anything.
    NoResponse,
    /// Connect, write or read raised a fault.
    ExchangeError,
}

impl ExchangeStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ExchangeStatus::Success)
    }
}

/// One discovered endpoint entry for an address:port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: String,
    pub port: u16,
    /// Average connect latency over successful attempts; -1 when unreachable.
    pub latency_ms: i64,
    pub succeeded: bool,
    pub packet_loss_pct: u8,
    /// Edge point-of-presence code, e.g. "FRA".
    pub pop: String,
    /// Two-letter region code.
    pub region: String,
    pub exchange: ExchangeStatus,
    pub mtu_hint: u16,
    pub discovered_at: String,
}

impl ProbeResult {
    /// Entry for an address that answered at least one connect attempt.
    pub fn reachable(address: String, port: u16, latency_ms: i64, packet_loss_pct: u8) -> Self {
        Self {
            address,
            port,
            latency_ms,
            succeeded: true,
            packet_loss_pct,
            pop: SEARCHING_POP.to_string(),
            region: UNKNOWN_REGION.to_string(),
            exchange: ExchangeStatus::Pending,
            mtu_hint: DEFAULT_MTU_HINT,
            discovered_at: now_iso_like(),
        }
    }

    /// Entry for an address that failed all connect attempts.
    pub fn unreachable(address: String, port: u16) -> Self {
        Self {
            address,
            port,
            latency_ms: -1,
            succeeded: false,
            packet_loss_pct: 100,
            pop: SEARCHING_POP.to_string(),
            region: UNKNOWN_REGION.to_string(),
            exchange: ExchangeStatus::Pending,
            mtu_hint: DEFAULT_MTU_HINT,
            discovered_at: now_iso_like(),
        }
    }
}

/// Scan parameters supplied by the caller.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanConfig {
    /// CIDR ranges to draw candidates from; empty means the built-in catalog.
    pub ranges: Vec<String>,
    /// Admission-gate size: max simultaneously active probe tasks.
    pub concurrency: usize,
    /// Per connect-attempt timeout.
    pub timeout_ms: u64,
    /// Scan stops once this many entries were found.
    pub max_results: usize,
    /// Port probed on every candidate address.
    pub target_port: u16,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ranges: Vec::new(),
            concurrency: 100,
            timeout_ms: 500,
            max_results: 20,
            target_port: 443,
        }
    }
}

impl ScanConfig {
    /// Contract check applied at scan start; misconfiguration is rejected, not retried.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be positive");
        }
        if self.timeout_ms == 0 {
            bail!("timeout_ms must be positive");
        }
        if self.max_results == 0 {
            bail!("max_results must be positive");
        }
        if self.target_port == 0 {
            bail!("target_port must be in 1..=65535");
        }
        Ok(())
    }
}

/// Coordinator lifecycle. Idle is both initial and terminal; Stopped is the
/// settling window between a stop request and the loop draining its tasks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Running,
    Stopped,
}

fn now_iso_like() -> String {
    // RFC3339-like UTC timestamp using `time` crate for correctness without heavy deps.
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ScanConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_fields_rejected() {
        let cfg = ScanConfig {
            concurrency: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ScanConfig {
            max_results: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ScanConfig {
            target_port: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ScanConfig {
            timeout_ms: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reachable_entry_has_pending_placeholders() {
        let r = ProbeResult::reachable("104.16.1.1".into(), 443, 42, 20);
        assert!(r.succeeded);
        assert_eq!(r.pop, SEARCHING_POP);
        assert_eq!(r.region, UNKNOWN_REGION);
        assert_eq!(r.exchange, ExchangeStatus::Pending);
        assert_eq!(r.mtu_hint, DEFAULT_MTU_HINT);
    }

    #[test]
    fn unreachable_entry_is_total_loss() {
        let r = ProbeResult::unreachable("104.16.1.2".into(), 443);
        assert!(!r.succeeded);
        assert_eq!(r.latency_ms, -1);
        assert_eq!(r.packet_loss_pct, 100);
    }
}
