use std::net::IpAddr;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, instrument, warn};
use url::{Host, Url};

use super::extract::{extract, Site};
use crate::error::AppError;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Hosts that block scraping outright; we hand back an empty form instead.
const SKIPPED_HOSTS: [&str; 2] = ["amazon", "etsy"];

pub const MAX_PAGE_BYTES: usize = 4 * 1024 * 1024;
const MAX_REDIRECTS: usize = 5;
const FETCH_FAILED: &str = "Failed to parse product information";

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ParsedProduct {
    pub name: String,
    pub description: String,
    pub price: String,
    pub product_url: String,
}

pub fn parse_target(raw: &str) -> Result<Url, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::BadRequest("URL is required".into()));
    }
    let url = Url::parse(raw).map_err(|_| AppError::BadRequest("Invalid URL".into()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AppError::BadRequest("Invalid URL".into()));
    }
    Ok(url)
}

fn is_skipped(host: &str) -> bool {
    SKIPPED_HOSTS.iter().any(|s| host.contains(s))
}

/// Addresses on the open internet only: no loopback, private, link-local,
/// CGNAT, multicast or unspecified ranges.
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_multicast()
                || v4.is_documentation()
                || a == 0
                || (a == 100 && (64..128).contains(&b)))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public_ip(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

/// Cheap check on a URL's literal host, used for redirect hops.
fn literal_host_allowed(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Ipv4(ip)) => is_public_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_public_ip(IpAddr::V6(ip)),
        Some(Host::Domain(d)) => {
            let d = d.trim_end_matches('.').to_ascii_lowercase();
            d != "localhost" && !d.ends_with(".localhost")
        }
        None => false,
    }
}

/// Follow a few redirects, never onto a literal private address.
pub fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !literal_host_allowed(attempt.url()) {
            attempt.error("redirect to a non-public address")
        } else {
            attempt.follow()
        }
    })
}

/// Resolve the target host and refuse anything that is not a public address.
async fn ensure_public_target(url: &Url) -> Result<(), AppError> {
    let rejected = || AppError::BadRequest("URL host is not allowed".into());
    if !literal_host_allowed(url) {
        return Err(rejected());
    }
    let Some(Host::Domain(domain)) = url.host() else {
        return Ok(());
    };

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|e| {
            warn!(error = %e, host = %domain, "product host lookup failed");
            AppError::Upstream(FETCH_FAILED.into())
        })?
        .map(|a| a.ip())
        .collect();

    if addrs.is_empty() || !addrs.iter().all(|ip| is_public_ip(*ip)) {
        warn!(host = %domain, ?addrs, "product host resolves to a non-public address");
        return Err(rejected());
    }
    Ok(())
}

/// GET the page, reading at most `limit` bytes of body.
async fn fetch_page(http: &reqwest::Client, url: &Url, limit: usize) -> anyhow::Result<String> {
    let mut res = http
        .get(url.clone())
        .send()
        .await
        .context("fetch product page")?
        .error_for_status()
        .context("product page status")?;

    if res.content_length().is_some_and(|len| len > limit as u64) {
        anyhow::bail!("product page larger than {limit} bytes");
    }

    let mut body = Vec::new();
    while let Some(chunk) = res.chunk().await.context("read product page")? {
        if body.len() + chunk.len() > limit {
            anyhow::bail!("product page larger than {limit} bytes");
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Pre-fill item fields from a product page.
#[instrument(skip(http))]
pub async fn parse_product_url(http: &reqwest::Client, raw_url: &str) -> Result<ParsedProduct, AppError> {
    let url = parse_target(raw_url)?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    let mut product = ParsedProduct {
        product_url: raw_url.trim().to_owned(),
        ..ParsedProduct::default()
    };

    if is_skipped(&host) {
        info!(%host, "skipping scrape for blocked host");
        return Ok(product);
    }

    ensure_public_target(&url).await?;

    let html = fetch_page(http, &url, MAX_PAGE_BYTES).await.map_err(|e| {
        warn!(error = ?e, %host, "product scrape failed");
        AppError::Upstream(FETCH_FAILED.into())
    })?;

    let fields = extract(Site::for_host(&host), &html);
    product.name = fields.name;
    product.description = fields.description;
    product.price = fields.price;
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_malformed_urls() {
        assert!(matches!(parse_target("  "), Err(AppError::BadRequest(m)) if m == "URL is required"));
        assert!(matches!(parse_target("not a url"), Err(AppError::BadRequest(m)) if m == "Invalid URL"));
        assert!(matches!(parse_target("ftp://x.com/a"), Err(AppError::BadRequest(_))));
        assert!(parse_target("https://www.target.com/p/1").is_ok());
    }

    #[test]
    fn skips_marketplaces_that_block_scrapers() {
        assert!(is_skipped("www.amazon.com"));
        assert!(is_skipped("www.etsy.com"));
        assert!(!is_skipped("www.walmart.com"));
    }

    #[tokio::test]
    async fn skipped_host_returns_empty_fields_without_fetching() {
        let http = reqwest::Client::new();
        let got = parse_product_url(&http, "https://www.amazon.com/dp/B000").await.unwrap();
        assert_eq!(
            got,
            ParsedProduct {
                product_url: "https://www.amazon.com/dp/B000".into(),
                ..ParsedProduct::default()
            }
        );
    }

    #[test]
    fn classifies_public_and_internal_addresses() {
        for internal in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "::1",
            "fd00::1",
            "fe80::1",
            "::ffff:127.0.0.1",
        ] {
            assert!(!is_public_ip(internal.parse().unwrap()), "{internal}");
        }
        for public in ["93.184.216.34", "8.8.8.8", "2606:4700::1111"] {
            assert!(is_public_ip(public.parse().unwrap()), "{public}");
        }
    }

    #[test]
    fn redirect_hops_to_internal_hosts_are_refused() {
        assert!(!literal_host_allowed(&Url::parse("http://127.0.0.1/x").unwrap()));
        assert!(!literal_host_allowed(&Url::parse("http://[::1]/x").unwrap()));
        assert!(!literal_host_allowed(&Url::parse("http://LOCALHOST./x").unwrap()));
        assert!(!literal_host_allowed(&Url::parse("http://api.localhost/x").unwrap()));
        assert!(!literal_host_allowed(&Url::parse("file:///etc/passwd").unwrap()));
        assert!(literal_host_allowed(&Url::parse("https://www.walmart.com/ip/1").unwrap()));
    }

    #[tokio::test]
    async fn internal_targets_are_rejected_before_fetching() {
        let http = reqwest::Client::new();
        for url in ["http://127.0.0.1:9/product", "http://[::1]/p", "http://10.0.0.5/p"] {
            let err = parse_product_url(&http, url).await.unwrap_err();
            assert!(
                matches!(&err, AppError::BadRequest(m) if m == "URL host is not allowed"),
                "{url}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn unresolvable_host_is_an_upstream_error() {
        let http = reqwest::Client::new();
        let err = parse_product_url(&http, "http://shop.invalid/product").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    /// One-shot HTTP server answering with `body` and closing the connection.
    async fn serve_once(body: Vec<u8>) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\nconnection: close\r\n\r\n";
            let _ = sock.write_all(head.as_bytes()).await;
            let _ = sock.write_all(&body).await;
            let _ = sock.shutdown().await;
        });
        Url::parse(&format!("http://{addr}/product")).unwrap()
    }

    #[tokio::test]
    async fn fetch_reads_pages_within_the_limit() {
        let url = serve_once(b"<title>Bike</title>".to_vec()).await;
        let html = fetch_page(&reqwest::Client::new(), &url, 1024).await.unwrap();
        assert_eq!(html, "<title>Bike</title>");
    }

    #[tokio::test]
    async fn fetch_stops_at_the_size_limit() {
        let url = serve_once(vec![b'a'; 64 * 1024]).await;
        let err = fetch_page(&reqwest::Client::new(), &url, 1024).await.unwrap_err();
        assert!(err.to_string().contains("larger than 1024 bytes"));
    }
}
