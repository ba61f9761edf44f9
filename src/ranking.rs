use crate::types::{ExchangeStatus, ProbeResult};

/// Capped, address-deduplicated, ordered collection of probe results.
///
/// Entries go through a two-phase life: a provisional insert right after the
/// connectivity probe, then one in-place enrichment update. Entries are never
/// removed individually, only bulk-cleared by starting a new scan.
#[derive(Debug)]
pub struct RankedResults {
    entries: Vec<ProbeResult>,
    cap: usize,
}

impl RankedResults {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.cap
    }

    /// Append a freshly discovered entry and re-rank. No-op (returns false)
    /// when the set is full or already holds this address.
    pub fn insert_provisional(&mut self, result: ProbeResult) -> bool {
        if self.is_full() || self.entries.iter().any(|e| e.address == result.address) {
            return false;
        }
        self.entries.push(result);
        self.resort();
        true
    }

    /// Apply enrichment to the entry with this address and re-rank. A failed
    /// exchange forces packet loss to 100 so the entry sinks below every
    /// confirmed one regardless of its raw connect latency. No-op (returns
    /// false) when the address is absent.
    pub fn update_enriched(
        &mut self,
        address: &str,
        pop: String,
        region: String,
        exchange: ExchangeStatus,
    ) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.address == address) else {
            return false;
        };
        entry.pop = pop;
        entry.region = region;
        entry.exchange = exchange;
        if !exchange.is_success() {
            entry.packet_loss_pct = 100;
        }
        self.resort();
        true
    }

    /// Defensive copy for presentation layers; readers never see the live Vec.
    pub fn snapshot(&self) -> Vec<ProbeResult> {
        self.entries.clone()
    }

    /// Stable full re-sort: confirmed exchange first, then lowest loss, then
    /// lowest latency. Cheap at this cap; revisit only if the cap grows far
    /// beyond ~100.
    fn resort(&mut self) {
        self.entries.sort_by(|a, b| {
            b.exchange
                .is_success()
                .cmp(&a.exchange.is_success())
                .then(a.packet_loss_pct.cmp(&b.packet_loss_pct))
                .then(a.latency_ms.cmp(&b.latency_ms))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(address: &str, latency: i64, loss: u8) -> ProbeResult {
        ProbeResult::reachable(address.to_string(), 443, latency, loss)
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let mut set = RankedResults::new(10);
        assert!(set.insert_provisional(entry("104.16.0.1", 50, 0)));
        assert!(!set.insert_provisional(entry("104.16.0.1", 10, 0)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.snapshot()[0].latency_ms, 50);
    }

    #[test]
    fn cap_is_enforced() {
        let mut set = RankedResults::new(2);
        assert!(set.insert_provisional(entry("104.16.0.1", 50, 0)));
        assert!(set.insert_provisional(entry("104.16.0.2", 60, 0)));
        assert!(set.is_full());
        assert!(!set.insert_provisional(entry("104.16.0.3", 10, 0)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn failed_exchange_forces_full_loss() {
        let mut set = RankedResults::new(10);
        set.insert_provisional(entry("104.16.0.1", 50, 0));
        assert!(set.update_enriched(
            "104.16.0.1",
            "FRA".into(),
            "DE".into(),
            ExchangeStatus::ExchangeError,
        ));
        let snap = set.snapshot();
        assert_eq!(snap[0].packet_loss_pct, 100);
        assert_eq!(snap[0].exchange, ExchangeStatus::ExchangeError);
        assert_eq!(snap[0].pop, "FRA");
        assert_eq!(snap[0].region, "DE");
    }

    #[test]
    fn update_on_absent_address_is_noop() {
        let mut set = RankedResults::new(10);
        set.insert_provisional(entry("104.16.0.1", 50, 0));
        assert!(!set.update_enriched(
            "104.16.0.9",
            "FRA".into(),
            "DE".into(),
            ExchangeStatus::Success,
        ));
        assert_eq!(set.snapshot()[0].exchange, ExchangeStatus::Pending);
    }

    #[test]
    fn confirmed_exchange_outranks_lower_latency() {
        let mut set = RankedResults::new(10);
        set.insert_provisional(entry("104.16.0.1", 10, 0));
        set.insert_provisional(entry("104.16.0.2", 200, 0));
        set.update_enriched("104.16.0.2", "FRA".into(), "DE".into(), ExchangeStatus::Success);
        set.update_enriched(
            "104.16.0.1",
            "AMS".into(),
            "NL".into(),
            ExchangeStatus::NoResponse,
        );
        let snap = set.snapshot();
        assert_eq!(snap[0].address, "104.16.0.2");
        assert_eq!(snap[1].address, "104.16.0.1");
    }

    #[test]
    fn order_is_loss_then_latency_within_equal_exchange() {
        let mut set = RankedResults::new(10);
        set.insert_provisional(entry("104.16.0.1", 80, 20));
        set.insert_provisional(entry("104.16.0.2", 120, 0));
        set.insert_provisional(entry("104.16.0.3", 40, 0));
        let snap = set.snapshot();
        let keys: Vec<&str> = snap.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(keys, vec!["104.16.0.3", "104.16.0.2", "104.16.0.1"]);
    }
}
