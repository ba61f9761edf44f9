use crate::types::ExchangeStatus;
use anyhow::Result;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

/// Diagnostic path served by the edge network on every address.
const TRACE_PATH: &str = "/cdn-cgi/trace";
/// Virtual host sent with the trace request to bypass host-based routing blocks.
const TRACE_HOST: &str = "browserleaks.com";
/// Host sent with the exchange request.
const EXCHANGE_HOST: &str = "cloudflare.com";

const TRACE_TIMEOUT: Duration = Duration::from_secs(1);
const EXCHANGE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Fetch the edge diagnostic trace from `address:80` and extract the point of
/// presence (`colo=`) and region (`loc=`). Any failure inside the 1s bound
/// collapses to the `("Timeout", "??")` sentinel pair.
pub async fn fetch_edge_trace(address: Ipv4Addr) -> (String, String) {
    fetch_trace_from(SocketAddr::from((address, 80))).await
}

async fn fetch_trace_from(addr: SocketAddr) -> (String, String) {
    match time::timeout(TRACE_TIMEOUT, trace_request(addr)).await {
        Ok(Ok(body)) => parse_trace(&body),
        _ => ("Timeout".to_string(), "??".to_string()),
    }
}

async fn trace_request(addr: SocketAddr) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!(
        "GET {TRACE_PATH} HTTP/1.1\r\nHost: {TRACE_HOST}\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await?;
    let mut body = Vec::new();
    stream.read_to_end(&mut body).await?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Pull `colo=` and `loc=` values out of the line-oriented trace body.
pub fn parse_trace(body: &str) -> (String, String) {
    let value_of = |key: &str| {
        body.lines()
            .find(|l| l.starts_with(key))
            .and_then(|l| l.split_once('='))
            .map(|(_, v)| v.trim().to_string())
    };
    let pop = value_of("colo=").unwrap_or_else(|| "N/A".to_string());
    let region = value_of("loc=").unwrap_or_else(|| "??".to_string());
    (pop, region)
}

/// Verify a full request/response byte exchange on `address:port`, distinct
/// from mere connection establishment. A minimal well-formed request line is
/// written and one read is attempted; connect, write and read all share the
/// same 1.5s bound.
pub async fn check_exchange(address: Ipv4Addr, port: u16) -> ExchangeStatus {
    match time::timeout(EXCHANGE_TIMEOUT, exchange_request(address, port)).await {
        Ok(Ok(n)) if n > 0 => ExchangeStatus::Success,
        Ok(Ok(_)) => ExchangeStatus::NoResponse,
        _ => ExchangeStatus::ExchangeError,
    }
}

async fn exchange_request(address: Ipv4Addr, port: u16) -> Result<usize> {
    let mut stream = TcpStream::connect(SocketAddr::from((address, port))).await?;
    let request = format!("GET {TRACE_PATH} HTTP/1.1\r\nHost: {EXCHANGE_HOST}\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).await?;
    Ok(n)
}
