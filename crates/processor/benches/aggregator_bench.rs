//! Performance benchmarks for the aggregation engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use streamstats_processor::{
    MergeReducer, PipelineConfig, ShardedStats, StatsPlan, StreamAggregator,
};
use streamstats_types::{Event, ShardId};
use tokio::runtime::Runtime;

const SPECS: [&str; 4] = ["count()", "sum(latency)", "max(latency)", "dc(status)"];

fn events(n: usize, groups: usize) -> Vec<Event> {
    (0..n)
        .map(|i| {
            Event::new(json!({
                "tenant": format!("t{}", i % groups),
                "latency": (i % 97) as f64 * 1.5,
                "status": 200 + (i % 4) * 100,
            }))
            .with_id(format!("req-{i}"))
        })
        .collect()
}

fn plan() -> StatsPlan {
    StatsPlan::parse(&SPECS, &["tenant"]).unwrap()
}

/// Single-event folding cost for growing group cardinality
fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator_process");

    for groups in [1, 100, 10_000] {
        let input = events(10_000, groups);
        group.throughput(Throughput::Elements(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("groups", groups), &input, |b, input| {
            b.iter(|| {
                let mut aggregator = StreamAggregator::new(plan());
                for event in input {
                    let mut event = event.clone();
                    black_box(aggregator.process(&mut event));
                }
            });
        });
    }

    group.finish();
}

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_reduce");

    let partials: Vec<_> = (0..4)
        .flat_map(|shard| {
            let mut aggregator = StreamAggregator::new(plan()).with_shard(ShardId::indexed(shard));
            events(2_500, 50)
                .into_iter()
                .map(move |mut e| aggregator.process(&mut e))
                .collect::<Vec<_>>()
        })
        .collect();

    group.throughput(Throughput::Elements(partials.len() as u64));
    group.bench_function("four_shards", |b| {
        b.iter(|| {
            let mut reducer = MergeReducer::new(&plan());
            for partial in &partials {
                black_box(reducer.reduce(partial));
            }
        });
    });

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sharded_pipeline");
    let input = events(5_000, 100);
    group.throughput(Throughput::Elements(input.len() as u64));

    for shards in [1, 4] {
        group.bench_with_input(BenchmarkId::new("shards", shards), &input, |b, input| {
            b.to_async(&rt).iter(|| async {
                // Buffer larger than the group count keeps output below the channel bound
                let config = PipelineConfig::default().with_shards(shards).with_buffer(256);
                let mut pipeline = ShardedStats::spawn(plan(), &config).unwrap();
                for event in input {
                    pipeline.send(event.clone()).await.unwrap();
                }
                black_box(pipeline.shutdown().await.unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_process, bench_reduce, bench_pipeline);
criterion_main!(benches);
