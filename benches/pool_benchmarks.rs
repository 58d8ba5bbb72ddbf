use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use link_preview::{
    CacheFacade, LinkPreviewService, Parser, PoolConfig, PreviewCache, PreviewError, PreviewInfo,
    Providers,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::runtime::Runtime;

const MOCK_URLS: &[&str] = &[
    "https://example1.com/page1",
    "https://example2.com/page2",
    "https://example3.com/page3",
    "https://example4.com/page4",
    "https://example5.com/page5",
];

fn create_mock_info(url: &str) -> PreviewInfo {
    PreviewInfo {
        url: Some(url.to_string()),
        title: Some(format!("Title for {url}")),
        description: Some(format!("Description for {url}")),
        thumbnail_url: Some("https://example.com/image.jpg".to_string()),
        provider_name: Some("Example Site".to_string()),
        ..PreviewInfo::with_status(200)
    }
}

#[derive(Clone)]
struct InstantParser;

#[async_trait]
impl Parser for InstantParser {
    async fn parse(&self, url: &str) -> Option<PreviewInfo> {
        Some(create_mock_info(url))
    }
}

#[derive(Default)]
struct MapCache(RwLock<HashMap<String, PreviewInfo>>);

#[async_trait]
impl PreviewCache for MapCache {
    async fn try_get(&self, key: &str) -> Option<PreviewInfo> {
        self.0.read().ok()?.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &PreviewInfo, _ttl: Duration) {
        if let Ok(mut map) = self.0.write() {
            map.insert(key.to_string(), value.clone());
        }
    }
}

fn build_service(workers: usize, cache: Option<CacheFacade>) -> LinkPreviewService<InstantParser> {
    let config = PoolConfig {
        worker_count: workers,
        ..Default::default()
    };
    LinkPreviewService::with_providers(
        &Providers::from_content("[]"),
        config,
        |_: &Providers, _: &PoolConfig| Ok::<_, PreviewError>(InstantParser),
        cache,
    )
    .unwrap()
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("pool_dispatch");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(5));

    for &workers in &[1usize, 4, 16] {
        let service = Arc::new(build_service(workers, None));
        group.bench_with_input(
            BenchmarkId::new("uncached_batch", workers),
            &workers,
            |b, _| {
                b.to_async(&rt).iter(|| {
                    let service = Arc::clone(&service);
                    async move { black_box(service.resolve_batch(MOCK_URLS).await) }
                });
            },
        );
    }
    group.finish();
}

fn bench_cache_hits(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = CacheFacade::with_store(Duration::from_secs(300), MapCache::default());
    let service = Arc::new(build_service(4, Some(cache)));
    rt.block_on(async {
        for url in MOCK_URLS {
            let _ = service.resolve(url).await;
        }
    });

    c.bench_function("cache_hit_resolve", |b| {
        b.to_async(&rt).iter(|| {
            let service = Arc::clone(&service);
            async move {
                for url in MOCK_URLS {
                    black_box(service.resolve(url).await.ok());
                }
            }
        });
    });
}

criterion_group!(benches, bench_dispatch, bench_cache_hits);
criterion_main!(benches);
