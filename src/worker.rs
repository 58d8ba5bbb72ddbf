use crate::{Parser, PoolConfig, PreviewInfo};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const OUTCOME_OK: u16 = 200;
pub const OUTCOME_NO_DATA: u16 = 404;
pub const OUTCOME_BAD_UPSTREAM: u16 = 411;
pub const OUTCOME_INTERNAL: u16 = 500;

/// Outcome of processing one job.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkResult {
    Success(PreviewInfo),
    Failure { code: u16, message: String },
}

impl WorkResult {
    pub fn outcome_code(&self) -> u16 {
        match self {
            WorkResult::Success(_) => OUTCOME_OK,
            WorkResult::Failure { code, .. } => *code,
        }
    }

    fn failure(code: u16, message: impl Into<String>) -> Self {
        WorkResult::Failure {
            code,
            message: message.into(),
        }
    }
}

/// Wraps one parser and runs exactly one fetch-and-classify cycle per job.
pub struct FetchWorker<P> {
    id: usize,
    parser: P,
    config: Arc<PoolConfig>,
}

impl<P: Parser> FetchWorker<P> {
    pub fn new(id: usize, parser: P, config: Arc<PoolConfig>) -> Self {
        Self { id, parser, config }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Never fails: every path yields a [`WorkResult`].
    pub async fn process(&self, job: &str) -> WorkResult {
        let url = job.trim();
        if url.is_empty() {
            warn!(worker = self.id, "Empty job submitted");
            return WorkResult::failure(OUTCOME_INTERNAL, "unexpected input");
        }

        let parsed = tokio::time::timeout(self.config.wait_timeout, self.parser.parse(url)).await;
        let info = match parsed {
            Ok(info) => info,
            Err(_) => {
                warn!(
                    worker = self.id,
                    url = %url,
                    timeout = ?self.config.wait_timeout,
                    "Parse timed out"
                );
                None
            }
        };

        match info {
            None => {
                info!(worker = self.id, url = %url, "No info for url");
                WorkResult::failure(OUTCOME_NO_DATA, "no data")
            }
            Some(info) if info.status < 300 => {
                debug!(worker = self.id, url = %url, "Url parsed");
                WorkResult::Success(info)
            }
            Some(info) => {
                info!(
                    worker = self.id,
                    url = %url,
                    status = info.status,
                    "Upstream status not usable"
                );
                WorkResult::failure(
                    OUTCOME_BAD_UPSTREAM,
                    format!("Unable to obtain data. Status code: {}", info.status),
                )
            }
        }
    }
}
