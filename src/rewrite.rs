use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Compiled once; subscription bodies get re-fetched and re-scanned.
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(vless|vmess|trojan)://[^\s"<>]+"#).expect("link pattern"));

/// Rewrite every recognized proxy link in `input` to point at `new_address`,
/// dropping lines that are blank or not a supported link scheme. Supported:
/// `vless://`, `trojan://` (host spliced after the credential `@`) and
/// `vmess://` (base64 JSON payload, `add` field replaced).
pub fn rewrite_links(input: &str, new_address: &str) -> Vec<String> {
    if input.trim().is_empty() || new_address.trim().is_empty() {
        return Vec::new();
    }
    input
        .lines()
        .filter_map(|line| rewrite_link(line, new_address))
        .collect()
}

/// Rewrite a single link. Quotes, commas and surrounding whitespace are
/// stripped first (subscription payloads often arrive as JSON fragments).
pub fn rewrite_link(line: &str, new_address: &str) -> Option<String> {
    let clean = line.trim().replace(['"', ','], "");
    if clean.is_empty() {
        return None;
    }
    if clean.starts_with("vless://") || clean.starts_with("trojan://") {
        Some(splice_host(&clean, new_address))
    } else if let Some(payload) = clean.strip_prefix("vmess://") {
        rewrite_vmess(payload, new_address).map(|p| format!("vmess://{p}"))
    } else {
        None
    }
}

/// Replace the host between `@` and the first of `: / ? #`. A link without
/// `@` is passed through untouched.
fn splice_host(link: &str, new_address: &str) -> String {
    let Some(at) = link.find('@') else {
        return link.to_string();
    };
    let (prefix, rest) = link.split_at(at + 1);
    match rest.find([':', '/', '?', '#']) {
        Some(sep) => format!("{prefix}{new_address}{}", &rest[sep..]),
        None => format!("{prefix}{new_address}"),
    }
}

/// Decode the vmess base64 JSON, swap the `add` field, re-encode. Any decode
/// or parse failure drops the link.
fn rewrite_vmess(payload: &str, new_address: &str) -> Option<String> {
    let raw = general_purpose::STANDARD
        .decode(payload)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(payload))
        .ok()?;
    let mut value: serde_json::Value = serde_json::from_slice(&raw).ok()?;
    let obj = value.as_object_mut()?;
    obj.insert(
        "add".to_string(),
        serde_json::Value::String(new_address.to_string()),
    );
    Some(general_purpose::STANDARD.encode(value.to_string()))
}

/// Fetch a subscription document over HTTPS and extract its proxy links,
/// deduplicated in order of first appearance.
pub async fn fetch_subscription(url: &str) -> Result<Vec<String>> {
    let body = reqwest::get(url).await?.text().await?;
    Ok(extract_links(&body))
}

/// Pull `vless://`, `vmess://` and `trojan://` links out of arbitrary text.
pub fn extract_links(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    LINK_PATTERN
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vless_host_is_spliced_before_port() {
        let link = "vless://uuid-1234@1.2.3.4:443?security=tls#tag";
        assert_eq!(
            rewrite_link(link, "104.16.1.1").unwrap(),
            "vless://uuid-1234@104.16.1.1:443?security=tls#tag"
        );
    }

    #[test]
    fn trojan_host_without_port_is_replaced_entirely() {
        let link = "trojan://secret@edge.example.com";
        assert_eq!(
            rewrite_link(link, "104.16.1.1").unwrap(),
            "trojan://secret@104.16.1.1"
        );
    }

    #[test]
    fn link_without_credentials_passes_through() {
        let link = "vless://no-at-sign-here";
        assert_eq!(rewrite_link(link, "104.16.1.1").unwrap(), link);
    }

    #[test]
    fn quotes_and_commas_are_stripped() {
        let link = "  \"trojan://secret@1.2.3.4:443\",  ";
        assert_eq!(
            rewrite_link(link, "104.16.1.1").unwrap(),
            "trojan://secret@104.16.1.1:443"
        );
    }

    #[test]
    fn vmess_add_field_is_rewritten() {
        let original = serde_json::json!({"v": "2", "add": "old.example.com", "port": "443"});
        let encoded = general_purpose::STANDARD.encode(original.to_string());
        let out = rewrite_link(&format!("vmess://{encoded}"), "104.16.1.1").unwrap();

        let payload = out.strip_prefix("vmess://").unwrap();
        let decoded = general_purpose::STANDARD.decode(payload).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["add"], "104.16.1.1");
        assert_eq!(value["port"], "443");
    }

    #[test]
    fn garbage_lines_are_dropped() {
        let input = "not-a-link\nvmess://%%%bad-base64%%%\n\nssh://other@1.2.3.4\n";
        assert!(rewrite_links(input, "104.16.1.1").is_empty());
    }

    #[test]
    fn extract_links_is_stable_across_repeated_calls() {
        let body = "vless://u@1.2.3.4:443#a\n";
        let first = extract_links(body);
        let second = extract_links(body);
        assert_eq!(first, second);
        assert_eq!(first, vec!["vless://u@1.2.3.4:443#a".to_string()]);
    }

    #[test]
    fn extract_links_dedupes_in_order() {
        let body = r#"
            some html <a href="vless://u@1.2.3.4:443#a">x</a>
            trojan://s@5.6.7.8:443
            vless://u@1.2.3.4:443#a
        "#;
        let links = extract_links(body);
        assert_eq!(
            links,
            vec![
                "vless://u@1.2.3.4:443#a".to_string(),
                "trojan://s@5.6.7.8:443".to_string(),
            ]
        );
    }
}
