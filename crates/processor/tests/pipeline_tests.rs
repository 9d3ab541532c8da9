//! End-to-end tests for the sharded pipeline

use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use streamstats_processor::aggregation::FunctorRegistry;
use streamstats_processor::{
    MetricsRegistry, PipelineConfig, ShardedStats, StatsConfig, StatsMetrics, StatsPlan,
    StreamAggregator,
};
use streamstats_types::Event;

fn events(n: usize) -> Vec<Event> {
    (0..n)
        .map(|i| {
            Event::new(json!({
                "tenant": format!("t{}", i % 3),
                "latency": (i % 17) as f64,
                "status": if i % 5 == 0 { 500 } else { 200 },
            }))
            .with_id(format!("req-{i}"))
        })
        .collect()
}

#[tokio::test]
async fn test_pipeline_matches_single_aggregator() {
    let plan = StatsPlan::parse(
        &["count()", "sum(latency)", "max(latency)", "dc(status)"],
        &["tenant"],
    )
    .unwrap();

    let mut direct = StreamAggregator::new(plan.clone());
    let expected: HashMap<_, _> = events(90)
        .into_iter()
        .map(|mut e| {
            let r = direct.process(&mut e);
            (r.fingerprint.clone(), r)
        })
        .collect();

    let mut pipeline = ShardedStats::spawn(plan, &PipelineConfig::default().with_shards(4)).unwrap();
    for event in events(90) {
        pipeline.send(event).await.unwrap();
    }
    let (received, stats) = pipeline.shutdown().await.unwrap();

    assert_eq!(received.len(), 90);
    assert_eq!(stats.events_processed(), 90);

    let merged: HashMap<_, _> = received
        .into_iter()
        .map(|r| (r.fingerprint.clone(), r))
        .collect();
    assert_eq!(merged.len(), 3);
    for (fingerprint, direct) in &expected {
        for destination in ["count()", "sum(latency)", "max(latency)", "dc(status)"] {
            assert_eq!(direct.value(destination), merged[fingerprint].value(destination));
        }
    }
}

#[tokio::test]
async fn test_concurrent_producer_and_consumer() {
    let plan = StatsPlan::parse(&["count()"], &["tenant"]).unwrap();
    let config = PipelineConfig {
        shards: 3,
        channel_capacity: 2,
        buffer_capacity: None,
    };
    let mut pipeline = ShardedStats::spawn(plan, &config).unwrap();

    let mut received = 0usize;
    for event in events(30) {
        pipeline.send(event).await.unwrap();
        while let Ok(Some(_)) =
            tokio::time::timeout(std::time::Duration::from_millis(1), pipeline.recv()).await
        {
            received += 1;
        }
    }
    let (rest, _) = pipeline.shutdown().await.unwrap();
    assert_eq!(received + rest.len(), 30);
}

#[tokio::test]
async fn test_pipeline_from_config_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "functions: [\"count() as requests\", \"avg(latency) as mean\"]\n\
         by: [tenant]\n\
         eviction:\n  max_groups: 10\n\
         pipeline:\n  shards: 2\n  buffer_capacity: 8\n"
    )
    .unwrap();

    let config = StatsConfig::load(Some(file.path().to_path_buf())).unwrap();
    let plan = config.plan(&FunctorRegistry::with_builtins()).unwrap();

    let registry = MetricsRegistry::new();
    let metrics = StatsMetrics::register(&registry);
    let mut pipeline = ShardedStats::spawn_with(
        plan,
        &config.pipeline,
        config.eviction.policy(),
        Some(metrics.clone()),
    )
    .unwrap();

    for event in events(12) {
        pipeline.send(event).await.unwrap();
    }
    let (results, stats) = pipeline.shutdown().await.unwrap();

    // One coalesced result per tenant
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.value("requests") == Some(&json!(4))));
    assert_eq!(stats.reducer.results_merged, 12);
    assert_eq!(metrics.merged_results(), 12);

    let text = registry.encode().unwrap();
    assert!(text.contains("streamstats_merged_results_total 12"));
}
