use crate::worker::{FetchWorker, WorkResult, OUTCOME_BAD_UPSTREAM, OUTCOME_NO_DATA};
use crate::{
    CacheFacade, LinkPreviewConfig, ParserBuilder, PoolConfig, PreviewError, PreviewInfo,
    Providers, WorkerPool,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

/// Cache-aside front end over a [`WorkerPool`].
///
/// Shared by the direct call surface ([`resolve`](Self::resolve),
/// [`url_info`](Self::url_info)) and the HTTP handler.
pub struct LinkPreviewService<P> {
    pool: WorkerPool<P>,
    cache: Option<CacheFacade>,
    config: Arc<PoolConfig>,
}

impl<P: crate::Parser> LinkPreviewService<P> {
    /// Loads the providers file, parses the network ranges and opens one
    /// worker per configured slot, each with its own parser.
    pub fn new<B>(
        config: &LinkPreviewConfig,
        builder: B,
        cache: Option<CacheFacade>,
    ) -> Result<Self, PreviewError>
    where
        B: ParserBuilder<Parser = P>,
    {
        let providers = Providers::load(&config.providers_file)?;
        Self::with_providers(&providers, config.pool_config()?, builder, cache)
    }

    pub fn with_providers<B>(
        providers: &Providers,
        pool_config: PoolConfig,
        builder: B,
        cache: Option<CacheFacade>,
    ) -> Result<Self, PreviewError>
    where
        B: ParserBuilder<Parser = P>,
    {
        let config = Arc::new(pool_config);
        let workers = (0..config.worker_count)
            .map(|id| -> Result<FetchWorker<P>, PreviewError> {
                let parser = builder.build(providers, &config)?;
                Ok(FetchWorker::new(id, parser, Arc::clone(&config)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pool = WorkerPool::open(workers)?;

        debug!(
            workers = config.worker_count,
            cached = cache.is_some(),
            "LinkPreviewService initialized"
        );
        Ok(Self {
            pool,
            cache,
            config,
        })
    }

    pub fn pool(&self) -> &WorkerPool<P> {
        &self.pool
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Validates `input_url`, then serves it from the cache or the pool.
    ///
    /// Failures are typed: 404/411 outcomes come back as
    /// [`PreviewError::Upstream`] and other outcomes as
    /// [`PreviewError::Internal`]. Dispatch errors are not folded into
    /// `Internal`; they surface as [`PreviewError::PoolClosed`] or
    /// [`PreviewError::WorkerFault`] so callers can tell them apart through
    /// [`PreviewError::is_dispatch_error`].
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, input_url: &str) -> Result<PreviewInfo, PreviewError> {
        let _ = Url::parse(input_url)?;

        if let Some(cache) = &self.cache {
            if let Some(info) = cache.try_get(input_url).await {
                debug!("Cache hit");
                return Ok(info);
            }
        }

        debug!("Submitting to worker pool");
        match self.pool.submit(input_url).await? {
            WorkResult::Success(info) => {
                if let Some(cache) = &self.cache {
                    cache.set(input_url, &info).await;
                }
                Ok(info)
            }
            WorkResult::Failure { code, message }
                if code == OUTCOME_NO_DATA || code == OUTCOME_BAD_UPSTREAM =>
            {
                Err(PreviewError::Upstream { code, message })
            }
            WorkResult::Failure { code, message } => {
                Err(PreviewError::Internal(format!("{code}: {message}")))
            }
        }
    }

    /// Resolves every URL concurrently; results keep the input order.
    pub async fn resolve_batch(&self, urls: &[&str]) -> Vec<Result<PreviewInfo, PreviewError>> {
        let futures = urls.iter().map(|url| self.resolve(url));
        futures::future::join_all(futures).await
    }

    /// Like [`resolve`](Self::resolve), but logs the failure and returns `None`.
    ///
    /// With the `logging` feature the outcome is also rendered as a log card.
    pub async fn url_info(&self, input_url: &str) -> Option<PreviewInfo> {
        match self.resolve(input_url).await {
            Ok(info) => {
                #[cfg(feature = "logging")]
                crate::logging::log_preview_card(&info, input_url);
                Some(info)
            }
            Err(e) => {
                info!(url = %input_url, "UrlInfo lookup failed");
                e.log();
                #[cfg(feature = "logging")]
                crate::logging::log_error_card(input_url, &e);
                None
            }
        }
    }

    /// Call once at teardown to drain and close the worker pool.
    pub async fn release(&self) {
        self.pool.release().await;
    }
}
