//! Capability index benchmarks
//!
//! - Relevance scoring per candidate
//! - Cluster rebuild over a fleet
//! - Cache key derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use synapse_common::{AffinityEdge, AgentProfile, QueryContext};
use synapse_index::cache::CacheKey;
use synapse_index::cluster::build_clusters;
use synapse_index::scorer::score;

const DOMAINS: [&str; 6] = ["physics", "optics", "chemistry", "logistics", "manufacturing", "finance"];
const CAPABILITIES: [&str; 4] = ["concept_definition", "explanation", "scheduling", "research"];

fn fleet(size: usize) -> Vec<AgentProfile> {
    (0..size)
        .map(|i| {
            AgentProfile::new(format!("agent-{}", i), format!("http://agent-{}:8080", i))
                .with_domains([DOMAINS[i % DOMAINS.len()], DOMAINS[(i + 1) % DOMAINS.len()]])
                .with_capabilities([CAPABILITIES[i % CAPABILITIES.len()]])
        })
        .collect()
}

// ============ SCORING BENCHMARKS ============

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    group.measurement_time(Duration::from_secs(5));

    let query = QueryContext::new("quantum optics", "explain").with_domains(["physics", "optics"]);
    let mut edge = AffinityEdge::new("agent-0", "quantum_optics");
    edge.weight = 0.7;

    let single = fleet(1);
    group.bench_function("single_candidate", |b| {
        let profile = &single[0];
        b.iter(|| black_box(score(black_box(profile), black_box(&query), Some(&edge))));
    });

    for size in [10usize, 100, 1000] {
        let profiles = fleet(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("fleet", size), &profiles, |b, profiles| {
            b.iter(|| {
                for profile in profiles {
                    black_box(score(profile, &query, None));
                }
            });
        });
    }

    group.finish();
}

// ============ CLUSTERING BENCHMARKS ============

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");

    for size in [100usize, 1000] {
        let profiles = fleet(size);
        group.bench_with_input(BenchmarkId::new("rebuild", size), &profiles, |b, profiles| {
            b.iter(|| black_box(build_clusters(black_box(profiles))));
        });
    }

    group.finish();
}

// ============ CACHE BENCHMARKS ============

fn bench_cache_key(c: &mut Criterion) {
    let query = QueryContext::new("supply chain risk", "summarize").with_domains(["logistics", "finance"]);

    c.bench_function("cache_key", |b| {
        b.iter(|| black_box(CacheKey::for_query(black_box(&query))));
    });
}

criterion_group!(scoring, bench_scoring);
criterion_group!(clustering, bench_clustering);
criterion_group!(cache, bench_cache_key);

criterion_main!(scoring, clustering, cache);
