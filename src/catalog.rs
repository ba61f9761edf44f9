/// Built-in catalog of CDN edge address ranges, scanned when the caller
/// selects no ranges of their own.
///
/// This list is intentionally the published anycast blocks of the targeted
/// edge network; individual entries can be narrowed by passing explicit
/// `/24` ranges instead.
pub const DEFAULT_RANGES: &[&str] = &[
    "173.245.48.0/20",
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
    "141.101.64.0/18",
    "108.162.192.0/18",
    "190.93.240.0/20",
    "188.114.96.0/20",
    "197.234.240.0/22",
    "198.41.128.0/17",
    "162.158.0.0/15",
    "104.16.0.0/13",
    "104.24.0.0/14",
    "172.64.0.0/13",
    "131.0.72.0/22",
];

#[cfg(test)]
mod tests {
    use super::*;
    use ipnet::Ipv4Net;

    #[test]
    fn catalog_entries_are_valid_cidrs() {
        for r in DEFAULT_RANGES {
            assert!(r.parse::<Ipv4Net>().is_ok(), "bad catalog entry: {r}");
        }
    }
}
