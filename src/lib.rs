use async_trait::async_trait;

mod access;
mod cache;
mod config;
mod error;
mod extractor;
mod fetcher;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "logging")]
mod logging;
mod pool;
mod service;
mod worker;

pub use access::{parse_ranges, AccessPolicy, IpNetwork};
pub use cache::{CacheFacade, NoopCache, PreviewCache};
pub use config::{
    LinkPreviewConfig, PoolConfig, Providers, DEFAULT_BINARY_BYTES_TO_READ,
    DEFAULT_CACHE_TTL_SECS, DEFAULT_HTML_BYTES_TO_READ, DEFAULT_WAIT_TIMEOUT_SECS,
    DEFAULT_WORKER_COUNT,
};
pub use error::PreviewError;
pub use extractor::{Extracted, MetadataExtractor, OEmbedResponse};
pub use fetcher::HtmlParser;
#[cfg(feature = "logging")]
pub use logging::{log_error_card, log_preview_card, setup_logging, LogConfig, LogLevelGuard};
pub use pool::WorkerPool;
pub use service::LinkPreviewService;
pub use worker::{
    FetchWorker, WorkResult, OUTCOME_BAD_UPSTREAM, OUTCOME_INTERNAL, OUTCOME_NO_DATA, OUTCOME_OK,
};

/// Metadata describing a fetched URL, in oEmbed vocabulary.
///
/// `status` is the upstream HTTP status the parser observed; anything at or
/// above 300 means the fetch did not produce usable data.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreviewInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub status: u16,
}

impl PreviewInfo {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// Retrieves and parses one URL into a [`PreviewInfo`].
///
/// Implementations enforce the byte caps, wait timeout and access policy
/// they were built with. `None` means nothing could be retrieved.
#[async_trait]
pub trait Parser: Send + Sync + 'static {
    async fn parse(&self, url: &str) -> Option<PreviewInfo>;
}

/// Builds one parser per fetch worker.
pub trait ParserBuilder {
    type Parser: Parser;

    fn build(&self, providers: &Providers, config: &PoolConfig)
        -> Result<Self::Parser, PreviewError>;
}

impl<F, P> ParserBuilder for F
where
    F: Fn(&Providers, &PoolConfig) -> Result<P, PreviewError>,
    P: Parser,
{
    type Parser = P;

    fn build(&self, providers: &Providers, config: &PoolConfig) -> Result<P, PreviewError> {
        self(providers, config)
    }
}
