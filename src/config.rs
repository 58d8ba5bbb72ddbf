use crate::access::AccessPolicy;
use crate::error::PreviewError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 7;
pub const DEFAULT_WORKER_COUNT: usize = 10;
pub const DEFAULT_HTML_BYTES_TO_READ: usize = 50_000;
pub const DEFAULT_BINARY_BYTES_TO_READ: usize = 4096;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

const ENV_PREFIX: &str = "LINK_PREVIEW_";

/// Construction-time settings for [`crate::LinkPreviewService`].
///
/// Zero values fall back to the `DEFAULT_*` constants when the config is
/// turned into a [`PoolConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkPreviewConfig {
    pub providers_file: PathBuf,
    pub worker_count: usize,
    pub max_html_bytes: usize,
    pub max_binary_bytes: usize,
    pub wait_timeout_secs: u64,
    /// Space separated CIDR ranges a fetch may connect to (empty = any).
    pub whitelist_ranges: String,
    /// Space separated CIDR ranges a fetch must never connect to.
    pub blacklist_ranges: String,
    pub cache_ttl_secs: u64,
}

impl LinkPreviewConfig {
    pub fn new(providers_file: impl Into<PathBuf>) -> Self {
        Self {
            providers_file: providers_file.into(),
            ..Default::default()
        }
    }

    /// Reads `LINK_PREVIEW_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, PreviewError> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PreviewError> {
        fn number<T: std::str::FromStr>(
            key: &str,
            value: Option<String>,
        ) -> Result<Option<T>, PreviewError> {
            value
                .map(|v| {
                    v.trim()
                        .parse()
                        .map_err(|_| {
                            PreviewError::Config(format!("{ENV_PREFIX}{key} is not a number: {v}"))
                        })
                })
                .transpose()
        }

        let mut config = Self::default();
        if let Some(path) = lookup("PROVIDERS_FILE") {
            config.providers_file = path.into();
        }
        if let Some(v) = number("WORKER_COUNT", lookup("WORKER_COUNT"))? {
            config.worker_count = v;
        }
        if let Some(v) = number("MAX_HTML_BYTES", lookup("MAX_HTML_BYTES"))? {
            config.max_html_bytes = v;
        }
        if let Some(v) = number("MAX_BINARY_BYTES", lookup("MAX_BINARY_BYTES"))? {
            config.max_binary_bytes = v;
        }
        if let Some(v) = number("WAIT_TIMEOUT_SECS", lookup("WAIT_TIMEOUT_SECS"))? {
            config.wait_timeout_secs = v;
        }
        if let Some(v) = lookup("WHITELIST_RANGES") {
            config.whitelist_ranges = v;
        }
        if let Some(v) = lookup("BLACKLIST_RANGES") {
            config.blacklist_ranges = v;
        }
        if let Some(v) = number("CACHE_TTL_SECS", lookup("CACHE_TTL_SECS"))? {
            config.cache_ttl_secs = v;
        }
        Ok(config)
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_max_html_bytes(mut self, max_html_bytes: usize) -> Self {
        self.max_html_bytes = max_html_bytes;
        self
    }

    pub fn with_max_binary_bytes(mut self, max_binary_bytes: usize) -> Self {
        self.max_binary_bytes = max_binary_bytes;
        self
    }

    pub fn with_wait_timeout_secs(mut self, wait_timeout_secs: u64) -> Self {
        self.wait_timeout_secs = wait_timeout_secs;
        self
    }

    pub fn with_whitelist_ranges(mut self, ranges: impl Into<String>) -> Self {
        self.whitelist_ranges = ranges.into();
        self
    }

    pub fn with_blacklist_ranges(mut self, ranges: impl Into<String>) -> Self {
        self.blacklist_ranges = ranges.into();
        self
    }

    pub fn with_cache_ttl_secs(mut self, cache_ttl_secs: u64) -> Self {
        self.cache_ttl_secs = cache_ttl_secs;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(non_zero(self.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS))
    }

    /// Applies defaults and parses the network ranges.
    pub fn pool_config(&self) -> Result<PoolConfig, PreviewError> {
        let access = AccessPolicy::from_ranges(&self.whitelist_ranges, &self.blacklist_ranges)?;
        let config = PoolConfig {
            worker_count: non_zero(self.worker_count, DEFAULT_WORKER_COUNT),
            wait_timeout: Duration::from_secs(non_zero(
                self.wait_timeout_secs,
                DEFAULT_WAIT_TIMEOUT_SECS,
            )),
            max_html_bytes: non_zero(self.max_html_bytes, DEFAULT_HTML_BYTES_TO_READ),
            max_binary_bytes: non_zero(self.max_binary_bytes, DEFAULT_BINARY_BYTES_TO_READ),
            access: Arc::new(access),
        };
        debug!(
            worker_count = config.worker_count,
            wait_timeout = ?config.wait_timeout,
            allowed = config.access.allowed().len(),
            denied = config.access.denied().len(),
            "Pool configuration resolved"
        );
        Ok(config)
    }
}

fn non_zero<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

/// Limits shared read-only by every fetch worker.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub wait_timeout: Duration,
    pub max_html_bytes: usize,
    pub max_binary_bytes: usize,
    pub access: Arc<AccessPolicy>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
            max_html_bytes: DEFAULT_HTML_BYTES_TO_READ,
            max_binary_bytes: DEFAULT_BINARY_BYTES_TO_READ,
            access: Arc::new(AccessPolicy::default()),
        }
    }
}

/// Raw content of the oEmbed providers file, handed to every parser builder.
#[derive(Debug, Clone)]
pub struct Providers {
    path: PathBuf,
    content: Arc<str>,
}

impl Providers {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreviewError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| PreviewError::ProvidersFile {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), bytes = content.len(), "Providers file loaded");
        Ok(Self {
            path: path.to_path_buf(),
            content: content.into(),
        })
    }

    pub fn from_content(content: impl Into<Arc<str>>) -> Self {
        Self {
            path: PathBuf::new(),
            content: content.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}
