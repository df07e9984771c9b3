//! Detection and connect benchmark suite.
//!
//! Benchmarks the hot paths when the provider is already injected:
//! - Detection verdict per strategy position (first, second, third)
//! - Full connect / disconnect cycle across concurrent managers: 1, 10, 100
//!
//! Run with: cargo bench --bench detection
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use wallet_bridge::{
    ConnectResponse, ConnectionManager, DetectionOrchestrator, InjectedHost, KeyValueStore,
    MemoryStore, ProbeContext, Provider, SessionStore, WalletConfig,
};

// ============================================================================
// Bench Provider
// ============================================================================

struct BenchProvider {
    flagged: bool,
    callable: bool,
}

#[async_trait]
impl Provider for BenchProvider {
    fn is_flagged(&self) -> wallet_bridge::Result<bool> {
        Ok(self.flagged)
    }

    fn has_connect(&self) -> wallet_bridge::Result<bool> {
        Ok(self.callable)
    }

    async fn connect(&self) -> wallet_bridge::Result<ConnectResponse> {
        Ok(ConnectResponse::new("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"))
    }
}

// ============================================================================
// Benchmark Parameters
// ============================================================================

const MANAGER_COUNTS: &[usize] = &[1, 10, 100];

fn orchestrator(flagged: bool, callable: bool, storage_trace: bool) -> DetectionOrchestrator {
    let host = Arc::new(InjectedHost::new());
    if flagged || callable {
        host.inject(Arc::new(BenchProvider { flagged, callable }));
    }
    let store = Arc::new(MemoryStore::new());
    if storage_trace {
        store.set("phantom.session", "{}").expect("memory store write");
    }
    DetectionOrchestrator::new(ProbeContext::new(
        host,
        SessionStore::new(store),
        Arc::new(WalletConfig::new()),
    ))
}

// ============================================================================
// Benchmark: Detection Verdict
// ============================================================================

fn bench_detection(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("detection");
    let cases = [
        ("primary", orchestrator(true, true, false)),
        ("method", orchestrator(false, true, false)),
        ("storage", orchestrator(false, false, true)),
    ];

    for (name, detector) in &cases {
        group.bench_function(*name, |b| {
            b.to_async(&rt).iter(|| async {
                let result = detector.detect().await;
                assert!(result.found);
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Connect Cycle
// ============================================================================

fn bench_connect_cycle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("connect_cycle");
    group.measurement_time(Duration::from_secs(10));

    for &count in MANAGER_COUNTS {
        group.bench_with_input(BenchmarkId::new("managers", count), &count, |b, &count| {
            b.to_async(&rt).iter(|| connect_cycle(count));
        });
    }

    group.finish();
}

async fn connect_cycle(count: usize) {
    let mut handles = Vec::with_capacity(count);

    for _ in 0..count {
        handles.push(tokio::spawn(async {
            let host = Arc::new(InjectedHost::new());
            host.inject(Arc::new(BenchProvider {
                flagged: true,
                callable: true,
            }));
            let manager = ConnectionManager::builder()
                .host(host)
                .build()
                .expect("valid configuration");

            manager.connect().await.expect("connect");
            manager.disconnect().await.expect("disconnect");
        }));
    }

    for handle in handles {
        handle.await.expect("connect task");
    }
}

// ============================================================================
// Criterion Setup
// ============================================================================

criterion_group!(benches, bench_detection, bench_connect_cycle);
criterion_main!(benches);
