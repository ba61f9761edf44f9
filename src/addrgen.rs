use crate::catalog;
use ipnet::Ipv4Net;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::net::Ipv4Addr;

/// Pick one range uniformly at random (falling back to the built-in catalog
/// when `ranges` is empty) and draw a random host address from it.
///
/// Returns `None` only when the chosen range's address part is not an IPv4
/// literal; a malformed mask alone is recovered as /24.
pub fn pick_candidate(ranges: &[String]) -> Option<Ipv4Addr> {
    let mut rng = rand::rng();
    let range = if ranges.is_empty() {
        catalog::DEFAULT_RANGES.choose(&mut rng).copied()?
    } else {
        ranges.choose(&mut rng)?.as_str()
    };
    random_host_in(range)
}

/// Draw a random host from one `a.b.c.d/n` range.
///
/// - mask <= 16: randomize the third and fourth octets to cover big blocks
/// - otherwise (typical /24): hold the first three octets and randomize the last
///
/// The final octet is drawn from 1..=254 so the network and broadcast
/// addresses are never produced.
pub fn random_host_in(range: &str) -> Option<Ipv4Addr> {
    let (base, prefix) = parse_range(range)?;
    let mut o = base.octets();
    let mut rng = rand::rng();
    if prefix <= 16 {
        o[2] = rng.random_range(0..=255);
    }
    o[3] = rng.random_range(1..=254);
    Some(Ipv4Addr::from(o))
}

/// Strict CIDR validation for API boundaries. The generator itself stays
/// lenient; callers that accept ranges over the wire reject here instead.
pub fn validate_range(range: &str) -> bool {
    range.parse::<Ipv4Net>().is_ok()
}

/// Lenient `a.b.c.d/n` split. A missing, unparsable or out-of-range mask
/// falls back to /24; an unparsable address part is unrecoverable.
fn parse_range(range: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr_part, mask_part) = match range.split_once('/') {
        Some((a, m)) => (a, Some(m)),
        None => (range, None),
    };
    let base: Ipv4Addr = addr_part.trim().parse().ok()?;
    let prefix = mask_part
        .and_then(|m| m.trim().parse::<u8>().ok())
        .filter(|p| *p <= 32)
        .unwrap_or(24);
    Some((base, prefix))
}
