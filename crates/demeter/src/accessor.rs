// ABOUTME: Page access boundary: navigate to a URL and snapshot its DOM as HTML text.
// ABOUTME: HttpAccessor fetches over HTTP with SSRF protection, size limits and charset decoding.

//! The [`PageAccessor`] trait isolates the sweep engine from how pages are
//! obtained. Only plain HTML text crosses the boundary, so the engine never
//! holds live page handles.
//!
//! [`HttpAccessor`] treats each target as a static document: the body fetched
//! by `navigate` is served to the first `snapshot`, and later snapshots
//! refetch the URL so slow-to-populate pages can be polled. A browser-driving
//! implementation would snapshot a live DOM instead.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use tracing::debug;

use crate::error::SweepError;
use crate::options::Options;

/// Maximum allowed page size (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Capability to open a target page and read its current DOM.
#[async_trait]
pub trait PageAccessor: Send {
    /// Points the accessor at `url` and loads it.
    async fn navigate(&mut self, url: &str) -> Result<(), SweepError>;

    /// Serializes the current page to HTML text. Callable repeatedly while a
    /// page is open; each call may observe newer content.
    async fn snapshot(&mut self) -> Result<String, SweepError>;

    /// Releases the page resource. Safe to call when nothing is open.
    async fn release(&mut self);
}

/// Fetches pages over HTTP.
pub struct HttpAccessor {
    client: reqwest::Client,
    headers: HashMap<String, String>,
    allow_private_networks: bool,
    current_url: Option<String>,
    pending_body: Option<String>,
}

impl HttpAccessor {
    /// Builds an accessor from sweep options, constructing an HTTP client
    /// unless the options carry one.
    ///
    /// # Panics
    ///
    /// Panics if the default HTTP client cannot be constructed.
    pub fn from_options(opts: &Options) -> Self {
        let client = match &opts.http_client {
            Some(client) => client.clone(),
            None => reqwest::Client::builder()
                .user_agent(&opts.user_agent)
                .timeout(opts.attempt_timeout)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .expect("failed to build HTTP client"),
        };
        Self {
            client,
            headers: opts.headers.clone(),
            allow_private_networks: opts.allow_private_networks,
            current_url: None,
            pending_body: None,
        }
    }

    async fn fetch_decoded(&self, url: &str) -> anyhow::Result<String> {
        let mut request = self.client.get(url);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("request failed: {}", e))?;

        let status = response.status().as_u16();
        if status != 200 {
            anyhow::bail!("HTTP status {}", status);
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_CONTENT_LENGTH {
                anyhow::bail!("content too large");
            }
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read body: {}", e))?;
        if body.len() > MAX_CONTENT_LENGTH {
            anyhow::bail!("content too large");
        }

        debug!("fetched {} ({} bytes)", url, body.len());
        Ok(decode_body(&body, content_type.as_deref()))
    }
}

#[async_trait]
impl PageAccessor for HttpAccessor {
    async fn navigate(&mut self, url: &str) -> Result<(), SweepError> {
        let parsed = validate_url(url, "Navigate")?;
        if !self.allow_private_networks {
            check_public_host(&parsed, url).await?;
        }
        let body = self
            .fetch_decoded(url)
            .await
            .map_err(|e| SweepError::navigate(url, "Navigate", Some(e)))?;
        self.current_url = Some(url.to_string());
        self.pending_body = Some(body);
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<String, SweepError> {
        if let Some(body) = self.pending_body.take() {
            return Ok(body);
        }
        let Some(url) = self.current_url.clone() else {
            return Err(SweepError::snapshot(
                "",
                "Snapshot",
                Some(anyhow::anyhow!("no page loaded")),
            ));
        };
        self.fetch_decoded(&url)
            .await
            .map_err(|e| SweepError::snapshot(url, "Snapshot", Some(e)))
    }

    async fn release(&mut self) {
        self.current_url = None;
        self.pending_body = None;
    }
}

/// Serves canned HTML from memory. Used for offline sweeps of saved pages and
/// in tests.
#[derive(Debug, Default)]
pub struct StaticAccessor {
    pages: HashMap<String, String>,
    current: Option<String>,
}

impl StaticAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the HTML served for `url`.
    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }
}

#[async_trait]
impl PageAccessor for StaticAccessor {
    async fn navigate(&mut self, url: &str) -> Result<(), SweepError> {
        if !self.pages.contains_key(url) {
            return Err(SweepError::navigate(
                url,
                "Navigate",
                Some(anyhow::anyhow!("no page registered for this URL")),
            ));
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<String, SweepError> {
        let Some(url) = &self.current else {
            return Err(SweepError::snapshot(
                "",
                "Snapshot",
                Some(anyhow::anyhow!("no page loaded")),
            ));
        };
        match self.pages.get(url) {
            Some(html) => Ok(html.clone()),
            None => Err(SweepError::snapshot(
                url.clone(),
                "Snapshot",
                Some(anyhow::anyhow!("page disappeared")),
            )),
        }
    }

    async fn release(&mut self) {
        self.current = None;
    }
}

fn validate_url(url: &str, op: &str) -> Result<url::Url, SweepError> {
    if url.is_empty() {
        return Err(SweepError::invalid_url(url, op, None));
    }
    let parsed = url::Url::parse(url).map_err(|e| {
        SweepError::invalid_url(url, op, Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;
    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(SweepError::invalid_url(
            url,
            op,
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }
    Ok(parsed)
}

/// Rejects hosts that are, or resolve to, private or loopback addresses.
async fn check_public_host(parsed: &url::Url, url: &str) -> Result<(), SweepError> {
    let Some(host) = parsed.host_str() else {
        return Err(SweepError::invalid_url(
            url,
            "Navigate",
            Some(anyhow::anyhow!("URL has no host")),
        ));
    };
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(SweepError::ssrf(url, "Navigate"));
        }
        return Ok(());
    }
    let port = parsed
        .port()
        .unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        SweepError::navigate(url, "Navigate", Some(anyhow::anyhow!("DNS lookup failed: {}", e)))
    })?;
    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(SweepError::ssrf(url, "Navigate"));
        }
    }
    Ok(())
}

/// Check if an IP address is in a private/reserved range.
pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => {
            // RFC1918 private ranges
            let private_10: Ipv4Net = "10.0.0.0/8".parse().unwrap();
            let private_172: Ipv4Net = "172.16.0.0/12".parse().unwrap();
            let private_192: Ipv4Net = "192.168.0.0/16".parse().unwrap();
            // Loopback
            let loopback: Ipv4Net = "127.0.0.0/8".parse().unwrap();
            // Link-local
            let link_local: Ipv4Net = "169.254.0.0/16".parse().unwrap();

            private_10.contains(ip)
                || private_172.contains(ip)
                || private_192.contains(ip)
                || loopback.contains(ip)
                || link_local.contains(ip)
        }
        IpAddr::V6(ip) => {
            if ip.is_loopback() {
                return true;
            }
            // Unique local fc00::/7, link-local fe80::/10
            let unique_local: Ipv6Net = "fc00::/7".parse().unwrap();
            let link_local: Ipv6Net = "fe80::/10".parse().unwrap();

            unique_local.contains(ip) || link_local.contains(ip)
        }
    }
}

/// Decode body bytes to a String using the content-type charset or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(charset) = content_type.and_then(extract_charset) {
        if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
            let (decoded, _, _) = encoding.decode(body);
            return decoded.into_owned();
        }
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract the charset value from a Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        if let Some(charset) = part.trim().strip_prefix("charset=") {
            return Some(charset.trim_matches('"').trim_matches('\'').to_string());
        }
    }
    None
}
