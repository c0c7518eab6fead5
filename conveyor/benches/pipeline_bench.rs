//! Benchmarks for pipeline execution.

use conveyor::chain::handler_fn;
use conveyor::config::PipelineConfig;
use conveyor::pipeline::Pipeline;
use conveyor::testing::MarkerTransform;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline.pre_processing(Arc::new(MarkerTransform::new(
        "mark",
        "seen",
        serde_json::json!(true),
    )));
    let pipeline = Arc::new(pipeline);
    let handler = handler_fn(|request| async move { Ok(request) });

    c.bench_function("execute_minimal", |b| {
        b.iter(|| {
            runtime.block_on(async {
                pipeline
                    .execute(
                        black_box(serde_json::json!({"method": "GET"})),
                        handler.clone(),
                    )
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
