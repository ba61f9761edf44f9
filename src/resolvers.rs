use rand::seq::SliceRandom;
use serde::Serialize;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::{self, Instant};

const DNS_PORT: u16 = 53;
const CONNECT_TIMEOUT: Duration = Duration::from_millis(750);

/// Number of resolvers sampled from the candidate list per run.
pub const DEFAULT_SAMPLE: usize = 100;

/// One verified resolver with its observed round-trip latency.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolverResult {
    pub ip: String,
    pub latency_ms: u64,
}

/// Probe a random sample of DNS resolvers and return the working ones sorted
/// by latency.
///
/// A resolver passes when its port 53 accepts a TCP connection within the
/// bound and the test domain resolves to a non-poisoned answer. Latency is
/// the wall clock for both steps together. Failures are skipped silently; a
/// shorter (possibly empty) list is the only failure signal.
pub async fn find_working_resolvers(
    resolvers: &[String],
    test_domain: &str,
    sample: usize,
) -> Vec<ResolverResult> {
    let domain = clean_domain(test_domain);
    let mut pool: Vec<&String> = resolvers.iter().collect();
    pool.shuffle(&mut rand::rng());
    pool.truncate(sample);

    let mut verified = Vec::new();
    for candidate in pool {
        let ip = candidate.trim();
        if ip.is_empty() {
            continue;
        }
        let start = Instant::now();
        let connected = matches!(
            time::timeout(CONNECT_TIMEOUT, TcpStream::connect((ip, DNS_PORT))).await,
            Ok(Ok(_))
        );
        if !connected {
            continue;
        }
        // Resolution goes through the system resolver; it approximates
        // whether the domain is answerable on the current network and lets
        // the poison filter reject injected answers.
        let Ok(mut addrs) = lookup_host(format!("{domain}:80")).await else {
            continue;
        };
        let Some(resolved) = addrs.next() else {
            continue;
        };
        if is_poisoned(&resolved.ip().to_string()) {
            continue;
        }
        verified.push(ResolverResult {
            ip: ip.to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        });
    }
    verified.sort_by_key(|r| r.latency_ms);
    verified
}

/// Strip scheme and path from user input, keeping the bare host.
pub fn clean_domain(domain: &str) -> String {
    let d = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    d.split('/').next().unwrap_or(d).to_string()
}

/// Injected/filtered answers come back as loopback, RFC1918 10/8 or the
/// all-zeros address.
pub fn is_poisoned(resolved_ip: &str) -> bool {
    resolved_ip.starts_with("10.") || resolved_ip.starts_with("127.") || resolved_ip == "0.0.0.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_domain_strips_scheme_and_path() {
        assert_eq!(clean_domain("https://www.github.com/foo/bar"), "www.github.com");
        assert_eq!(clean_domain("http://example.com"), "example.com");
        assert_eq!(clean_domain("  example.com  "), "example.com");
    }

    #[test]
    fn poison_filter_catches_injected_answers() {
        assert!(is_poisoned("10.10.34.34"));
        assert!(is_poisoned("127.0.0.1"));
        assert!(is_poisoned("0.0.0.0"));
        assert!(!is_poisoned("140.82.121.4"));
    }

    #[tokio::test]
    async fn empty_candidate_list_yields_no_results() {
        let out = find_working_resolvers(&[], "example.com", DEFAULT_SAMPLE).await;
        assert!(out.is_empty());
    }
}
