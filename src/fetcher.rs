use crate::extractor::{MetadataExtractor, OEmbedResponse};
use crate::{AccessPolicy, Parser, PoolConfig, PreviewError, PreviewInfo, Providers};
use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect, Client, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use url::Url;

const USER_AGENT: &str = "link-preview/0.1.0";
const MAX_REDIRECTS: usize = 5;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// DNS resolver that only hands out addresses the access policy permits.
///
/// Runs at connect time, so a hostname cannot be re-pointed at a denied
/// address between validation and connection.
struct PolicyResolver {
    policy: Arc<AccessPolicy>,
}

impl Resolve for PolicyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_permitted(Arc::clone(&self.policy), name))
    }
}

async fn resolve_permitted(policy: Arc<AccessPolicy>, name: Name) -> Result<Addrs, BoxError> {
    let host = name.as_str();
    let permitted: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
        .await?
        .filter(|addr| {
            let ok = policy.permits(addr.ip());
            if !ok {
                warn!(host = %host, ip = %addr.ip(), "Resolved address denied by access policy");
            }
            ok
        })
        .collect();

    if permitted.is_empty() {
        return Err(format!("no permitted address for {host}").into());
    }
    Ok(Box::new(permitted.into_iter()))
}

/// Built-in [`Parser`]: fetches a page over HTTP(S), honoring the pool's
/// byte caps, wait timeout and access policy, and extracts its metadata.
#[derive(Clone)]
pub struct HtmlParser {
    client: Client,
    config: PoolConfig,
    extractor: MetadataExtractor,
}

impl HtmlParser {
    pub fn new(config: &PoolConfig) -> Result<Self, PreviewError> {
        let resolver = Arc::new(PolicyResolver {
            policy: Arc::clone(&config.access),
        });
        let client = Client::builder()
            .timeout(config.wait_timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            // A proxy would resolve the target itself and bypass the policy resolver.
            .no_proxy()
            .dns_resolver(resolver)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to create HTTP client");
                PreviewError::Config(format!("failed to initialize HTTP client: {e}"))
            })?;
        debug!("HtmlParser initialized");

        Ok(Self {
            client,
            config: config.clone(),
            extractor: MetadataExtractor::new(),
        })
    }

    /// [`crate::ParserBuilder`]-compatible constructor. Provider-specific
    /// endpoints are not consulted; oEmbed is found through page discovery.
    pub fn build(_providers: &Providers, config: &PoolConfig) -> Result<Self, PreviewError> {
        Self::new(config)
    }

    /// Sends a GET to `url` after checking it against the access policy.
    async fn get(&self, url: &Url) -> Result<Response, PreviewError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PreviewError::Internal(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        self.config.access.check_url(url)?;
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PreviewError::Internal(e.to_string()))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Option<PreviewInfo> {
        let mut target = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "Unparseable URL reached the parser");
                return None;
            }
        };

        let mut last_status = 0;
        for _ in 0..=MAX_REDIRECTS {
            let response = match self.get(&target).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(url = %target, error = %e, "Fetch failed");
                    return None;
                }
            };
            let status = response.status();
            last_status = status.as_u16();

            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| target.join(loc).ok());
                match next {
                    Some(next) => {
                        debug!(from = %target, to = %next, "Following redirect");
                        target = next;
                        continue;
                    }
                    None => return Some(PreviewInfo::with_status(last_status)),
                }
            }

            if !status.is_success() {
                debug!(url = %target, status = last_status, "Upstream status not successful");
                return Some(PreviewInfo::with_status(last_status));
            }

            return Some(self.read_document(target, response).await);
        }

        warn!(url = %url, "Too many redirects");
        Some(PreviewInfo::with_status(last_status))
    }

    async fn read_document(&self, url: Url, response: Response) -> PreviewInfo {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();

        if content_type.is_empty() || content_type.contains("html") {
            let body = read_capped(response, self.config.max_html_bytes).await;
            let html = String::from_utf8_lossy(&body);
            let extracted = self.extractor.extract(&html, &url);

            let mut info = match extracted.oembed_endpoint {
                Some(endpoint) => match self.fetch_oembed(&endpoint).await {
                    Some(oembed) => self.extractor.merge_oembed(extracted.info, oembed),
                    None => extracted.info,
                },
                None => extracted.info,
            };
            info.status = status;
            return info;
        }

        let mut info = PreviewInfo {
            url: Some(url.to_string()),
            status,
            ..Default::default()
        };
        if content_type.starts_with("image/") {
            let head = read_capped(response, self.config.max_binary_bytes).await;
            info.kind = Some("photo".to_string());
            if let Some((width, height)) = image_dimensions(&head) {
                info.width = Some(width);
                info.height = Some(height);
            }
        } else {
            info.kind = Some("link".to_string());
        }
        info
    }

    async fn fetch_oembed(&self, endpoint: &Url) -> Option<OEmbedResponse> {
        let response = match self.get(endpoint).await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(endpoint = %endpoint, status = %r.status(), "oEmbed endpoint refused");
                return None;
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "oEmbed fetch failed");
                return None;
            }
        };
        let body = read_capped(response, self.config.max_html_bytes).await;
        serde_json::from_slice(&body)
            .map_err(|e| warn!(endpoint = %endpoint, error = %e, "Invalid oEmbed response"))
            .ok()
    }
}

#[async_trait]
impl Parser for HtmlParser {
    async fn parse(&self, url: &str) -> Option<PreviewInfo> {
        match tokio::time::timeout(self.config.wait_timeout, self.fetch(url)).await {
            Ok(info) => info,
            Err(_) => {
                warn!(url = %url, "Fetch exceeded wait timeout");
                None
            }
        }
    }
}

/// Reads at most `cap` bytes of the body; a transport error ends the read
/// with what arrived so far.
async fn read_capped(mut response: Response, cap: usize) -> Vec<u8> {
    let mut body = Vec::new();
    while body.len() < cap {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = cap - body.len();
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Body read interrupted");
                break;
            }
        }
    }
    body
}

/// Width and height from the header bytes of a PNG, GIF or JPEG image.
fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") && data.len() >= 24 {
        let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        return Some((width, height));
    }
    if (data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")) && data.len() >= 10 {
        let width = u16::from_le_bytes([data[6], data[7]]);
        let height = u16::from_le_bytes([data[8], data[9]]);
        return Some((width.into(), height.into()));
    }
    if data.starts_with(&[0xFF, 0xD8]) {
        return jpeg_dimensions(data);
    }
    None
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        let len = usize::from(u16::from_be_bytes([data[i + 2], data[i + 3]]));
        // SOFn markers, excluding DHT, JPG and DAC.
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]);
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]);
            return Some((width.into(), height.into()));
        }
        i += 2 + len;
    }
    None
}
