#![allow(dead_code)]

use async_trait::async_trait;
use link_preview::{
    CacheFacade, LinkPreviewService, Parser, PoolConfig, PreviewCache, PreviewError, PreviewInfo,
    Providers,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters shared by every stub parser built for one service.
#[derive(Default)]
pub struct Probe {
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub order: Mutex<Vec<String>>,
}

impl Probe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Answers from a fixed table, optionally after a delay.
#[derive(Clone)]
pub struct StubParser {
    pub responses: Arc<HashMap<String, PreviewInfo>>,
    pub delay: Duration,
    pub probe: Arc<Probe>,
}

#[async_trait]
impl Parser for StubParser {
    async fn parse(&self, url: &str) -> Option<PreviewInfo> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.order.lock().unwrap().push(url.to_string());
        let now = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        self.responses.get(url).cloned()
    }
}

pub fn titled(title: &str, status: u16) -> PreviewInfo {
    PreviewInfo {
        title: Some(title.to_string()),
        ..PreviewInfo::with_status(status)
    }
}

pub fn stub(responses: &[(&str, PreviewInfo)], delay: Duration) -> StubParser {
    StubParser {
        responses: Arc::new(
            responses
                .iter()
                .map(|(url, info)| (url.to_string(), info.clone()))
                .collect(),
        ),
        delay,
        probe: Arc::new(Probe::default()),
    }
}

pub fn service(
    parser: StubParser,
    workers: usize,
    cache: Option<CacheFacade>,
) -> LinkPreviewService<StubParser> {
    let config = PoolConfig {
        worker_count: workers,
        ..Default::default()
    };
    LinkPreviewService::with_providers(
        &Providers::from_content("[]"),
        config,
        move |_: &Providers, _: &PoolConfig| Ok::<_, PreviewError>(parser.clone()),
        cache,
    )
    .unwrap()
}

/// In-memory cache keyed by URL, recording every call.
#[derive(Default)]
pub struct MemoryCache {
    pub entries: Mutex<HashMap<String, PreviewInfo>>,
    pub gets: AtomicUsize,
    pub sets: Mutex<Vec<(String, Duration)>>,
}

impl MemoryCache {
    pub fn with_entry(key: &str, value: PreviewInfo) -> Self {
        let cache = Self::default();
        cache.entries.lock().unwrap().insert(key.to_string(), value);
        cache
    }

    pub fn set_count(&self) -> usize {
        self.sets.lock().unwrap().len()
    }
}

#[async_trait]
impl PreviewCache for MemoryCache {
    async fn try_get(&self, key: &str) -> Option<PreviewInfo> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &PreviewInfo, ttl: Duration) {
        self.sets.lock().unwrap().push((key.to_string(), ttl));
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
    }
}
