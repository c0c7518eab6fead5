//! End-to-end tests driving the whole engine through `Pipeline::execute`.

use crate::chain::{handler_fn, BoxedHandler, Next};
use crate::config::PipelineConfig;
use crate::context::RequestContext;
use crate::errors::{MiddlewareError, PipelineError};
use crate::events::{CollectingEventSink, EventSink};
use crate::middleware::{ConditionalInterceptor, FnTransform, Interceptor, Transform};
use crate::pipeline::Pipeline;
use crate::testing::{
    CallLog, CountingCleanup, ErrorCountProbe, FailingErrorHandler, MarkerTransform,
    RecordingErrorHandler, RecordingInterceptor, ShortCircuitInterceptor,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn counting_handler(count: Arc<AtomicUsize>) -> BoxedHandler {
    handler_fn(move |request| {
        let count = Arc::clone(&count);
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(request)
        }
    })
}

fn echo_handler() -> BoxedHandler {
    handler_fn(|request| async move { Ok(request) })
}

fn failing_handler() -> BoxedHandler {
    handler_fn(|_request| async move { Err(MiddlewareError::failed("handler blew up")) })
}

/// Lets `next` pass only when an authorization header is present.
struct AuthInterceptor {
    log: CallLog,
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    async fn handle(
        &self,
        request: serde_json::Value,
        next: Next,
    ) -> Result<serde_json::Value, MiddlewareError> {
        self.log.push("auth");
        let authorized = request
            .get("headers")
            .and_then(|headers| headers.get("authorization"))
            .is_some();
        if authorized {
            next.run(request).await
        } else {
            Ok(serde_json::json!({"status": 401}))
        }
    }
}

/// Writes the request's id into context metadata, then reads it back later.
struct IdentityWriter;

#[async_trait]
impl Transform for IdentityWriter {
    fn name(&self) -> &str {
        "identity_writer"
    }

    async fn apply(
        &self,
        payload: serde_json::Value,
        ctx: &RequestContext,
    ) -> Result<serde_json::Value, MiddlewareError> {
        ctx.metadata.set("who", payload["id"].clone());
        // Yield so concurrent calls interleave.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(payload)
    }
}

struct IdentityReader;

#[async_trait]
impl Transform for IdentityReader {
    fn name(&self) -> &str {
        "identity_reader"
    }

    async fn apply(
        &self,
        mut payload: serde_json::Value,
        ctx: &RequestContext,
    ) -> Result<serde_json::Value, MiddlewareError> {
        let who = ctx.metadata.get("who").unwrap_or(serde_json::Value::Null);
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("who_meta".to_string(), who);
        }
        Ok(payload)
    }
}

fn method_validator() -> Arc<dyn Transform> {
    Arc::new(FnTransform::new(
        "method_validator",
        |payload: serde_json::Value, _ctx: &RequestContext| {
            let allowed = ["GET", "POST", "PUT", "DELETE"];
            let method = payload["method"].as_str().unwrap_or_default();
            if allowed.contains(&method) {
                Ok(payload)
            } else {
                Err(MiddlewareError::rejected(format!(
                    "method '{method}' is not allowed"
                )))
            }
        },
    ))
}

#[tokio::test]
async fn context_is_registered_and_removed_exactly_once() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    pipeline
        .execute(serde_json::json!({}), echo_handler())
        .await
        .unwrap();
    assert_eq!(pipeline.stats().active_contexts, 0);

    // The same holds when the handler raises and the failure propagates.
    let pipeline = Pipeline::new(PipelineConfig::default().with_error_recovery(false));
    let result = pipeline
        .execute(serde_json::json!({}), failing_handler())
        .await;
    assert!(result.is_err());
    assert_eq!(pipeline.stats().active_contexts, 0);
    assert!(pipeline.active_contexts().is_empty());
}

#[tokio::test]
async fn interceptors_run_in_registration_order_then_handler() {
    let log = CallLog::new();
    let count = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline
        .wrap(Arc::new(RecordingInterceptor::new("m1", log.clone())))
        .wrap(Arc::new(RecordingInterceptor::new("m2", log.clone())))
        .wrap(Arc::new(RecordingInterceptor::new("m3", log.clone())));

    let handler_log = log.clone();
    let handler = handler_fn(move |request| {
        let log = handler_log.clone();
        let count = Arc::clone(&count);
        async move {
            log.push("handler");
            count.fetch_add(1, Ordering::SeqCst);
            Ok(request)
        }
    });

    pipeline.execute(serde_json::json!({}), handler).await.unwrap();
    assert_eq!(log.entries(), vec!["m1", "m2", "m3", "handler"]);
}

#[tokio::test]
async fn short_circuit_skips_downstream_and_handler() {
    let log = CallLog::new();
    let count = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline
        .wrap(Arc::new(RecordingInterceptor::new("m1", log.clone())))
        .wrap(Arc::new(ShortCircuitInterceptor::new(
            "m2",
            serde_json::json!({"served_from": "m2"}),
            log.clone(),
        )))
        .wrap(Arc::new(RecordingInterceptor::new("m3", log.clone())));

    let result = pipeline
        .execute(serde_json::json!({}), counting_handler(Arc::clone(&count)))
        .await
        .unwrap();

    assert_eq!(result, serde_json::json!({"served_from": "m2"}));
    assert_eq!(log.entries(), vec!["m1", "m2"]);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn recovery_swallows_transform_failure_and_continues() {
    let errors_seen = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::new(PipelineConfig::default().with_error_recovery(true));
    pipeline
        .pre_processing(Arc::new(FnTransform::new(
            "t1",
            |_payload: serde_json::Value, _ctx: &RequestContext| {
                Err(MiddlewareError::failed("t1 broke"))
            },
        )))
        .pre_processing(Arc::new(MarkerTransform::new(
            "t2",
            "x",
            serde_json::json!("marker"),
        )))
        .cleanup(Arc::new(ErrorCountProbe::new(
            "probe",
            Arc::clone(&errors_seen),
        )));

    let result = pipeline
        .execute(serde_json::json!({}), echo_handler())
        .await
        .unwrap();

    // The failing transform's effect is discarded; t2 still ran.
    assert_eq!(result, serde_json::json!({"x": "marker"}));
    assert_eq!(errors_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_without_recovery_still_runs_cleanup_once() {
    let cleanups = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::new(PipelineConfig::default().with_error_recovery(false));
    pipeline.cleanup(Arc::new(CountingCleanup::new(
        "release",
        Arc::clone(&cleanups),
    )));

    let result = pipeline
        .execute(serde_json::json!({}), failing_handler())
        .await;

    match result {
        Err(PipelineError::HandlerChain { .. }) => {}
        other => panic!("expected a handler chain failure, got {other:?}"),
    }
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_contexts_are_isolated() {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline
        .pre_processing(Arc::new(IdentityWriter))
        .post_processing(Arc::new(IdentityReader));
    let pipeline = Arc::new(pipeline);

    let (a, b) = tokio::join!(
        pipeline.execute(serde_json::json!({"id": "alpha"}), echo_handler()),
        pipeline.execute(serde_json::json!({"id": "beta"}), echo_handler()),
    );

    // Each call reads back only the value written into its own context.
    assert_eq!(a.unwrap()["who_meta"], "alpha");
    assert_eq!(b.unwrap()["who_meta"], "beta");
}

#[tokio::test]
async fn stats_track_registrations_and_in_flight_requests() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    let stats = pipeline.stats();
    assert_eq!(stats.stage_counts.total(), 0);
    assert_eq!(stats.active_contexts, 0);

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let log = CallLog::new();
    pipeline
        .pre_processing(Arc::new(MarkerTransform::new("m", "k", serde_json::json!(1))))
        .wrap(Arc::new(RecordingInterceptor::new("i", log)));
    let pipeline = Arc::new(pipeline);

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let handler = {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        handler_fn(move |request| {
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            async move {
                entered.notify_one();
                release.notified().await;
                Ok(request)
            }
        })
    };

    let task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.execute(serde_json::json!({}), handler).await }
    });

    entered.notified().await;
    let stats = pipeline.stats();
    assert_eq!(stats.active_contexts, 1);
    assert_eq!(stats.stage_counts.pre_processing, 1);
    assert_eq!(stats.stage_counts.request_handling, 1);

    release.notify_one();
    task.await.unwrap().unwrap();
    assert_eq!(pipeline.stats().active_contexts, 0);
}

#[tokio::test]
async fn validation_rejects_unknown_method_with_recovery() {
    let count = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::new(PipelineConfig::default().with_error_recovery(true));
    pipeline.pre_processing(method_validator());

    let result = pipeline
        .execute(
            serde_json::json!({"method": "TRACE"}),
            counting_handler(Arc::clone(&count)),
        )
        .await
        .unwrap();

    assert_eq!(result["error"], "stage_middleware_error");
    assert!(!result["request_id"].as_str().unwrap().is_empty());
    assert_eq!(count.load(Ordering::SeqCst), 0);

    // Allowed methods flow through untouched.
    let ok = pipeline
        .execute(
            serde_json::json!({"method": "GET"}),
            counting_handler(Arc::clone(&count)),
        )
        .await
        .unwrap();
    assert_eq!(ok, serde_json::json!({"method": "GET"}));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auth_interceptor_short_circuits_with_401() {
    let log = CallLog::new();
    let count = Arc::new(AtomicUsize::new(0));

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline
        .wrap(Arc::new(AuthInterceptor { log: log.clone() }))
        .wrap(Arc::new(RecordingInterceptor::new("downstream", log.clone())));

    let result = pipeline
        .execute(
            serde_json::json!({"headers": {}}),
            counting_handler(Arc::clone(&count)),
        )
        .await
        .unwrap();

    assert_eq!(result, serde_json::json!({"status": 401}));
    assert_eq!(log.entries(), vec!["auth"]);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    let authorized = pipeline
        .execute(
            serde_json::json!({"headers": {"authorization": "Bearer t"}}),
            counting_handler(Arc::clone(&count)),
        )
        .await
        .unwrap();
    assert_eq!(authorized["headers"]["authorization"], "Bearer t");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn conditional_wrapper_gates_inner_interceptor() {
    let log = CallLog::new();
    let inner: Arc<dyn Interceptor> = Arc::new(ShortCircuitInterceptor::new(
        "blocker",
        serde_json::json!({"status": 429}),
        log.clone(),
    ));

    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline.wrap(Arc::new(ConditionalInterceptor::new(
        "maybe_block",
        |request: &serde_json::Value| request.get("throttled").is_some(),
        inner,
    )));
    let pipeline = Arc::new(pipeline);

    let blocked = pipeline
        .execute(serde_json::json!({"throttled": true}), echo_handler())
        .await
        .unwrap();
    assert_eq!(blocked, serde_json::json!({"status": 429}));
    assert_eq!(log.entries(), vec!["blocker"]);

    let passed = pipeline
        .execute(serde_json::json!({"fine": true}), echo_handler())
        .await
        .unwrap();
    assert_eq!(passed, serde_json::json!({"fine": true}));
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn execution_budget_expiry_takes_the_failure_path() {
    let cleanups = Arc::new(AtomicUsize::new(0));

    let slow_handler = || {
        handler_fn(|request| async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(request)
        })
    };

    // Recovery off: the timeout is raised to the caller, cleanup still runs.
    let mut pipeline = Pipeline::new(
        PipelineConfig::default()
            .with_error_recovery(false)
            .with_max_execution_time(0.05),
    );
    pipeline.cleanup(Arc::new(CountingCleanup::new(
        "release",
        Arc::clone(&cleanups),
    )));

    let result = pipeline.execute(serde_json::json!({}), slow_handler()).await;
    match result {
        Err(PipelineError::Timeout { budget_ms }) => assert_eq!(budget_ms, 50),
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.stats().active_contexts, 0);

    // Recovery on: the caller sees the generic recovery payload instead.
    let pipeline = Pipeline::new(
        PipelineConfig::default()
            .with_error_recovery(true)
            .with_max_execution_time(0.05),
    );
    let recovered = pipeline
        .execute(serde_json::json!({}), slow_handler())
        .await
        .unwrap();
    assert_eq!(recovered["error"], "pipeline_timeout");
}

#[tokio::test]
async fn failing_error_handler_does_not_stop_later_handlers() {
    let log = CallLog::new();

    let mut pipeline = Pipeline::new(PipelineConfig::default().with_error_recovery(true));
    pipeline
        .error_handling(Arc::new(FailingErrorHandler::new("broken")))
        .error_handling(Arc::new(RecordingErrorHandler::new("observer", log.clone())));

    pipeline
        .execute(serde_json::json!({}), failing_handler())
        .await
        .unwrap();

    assert_eq!(log.entries(), vec!["observer:handler_chain_error"]);
}

#[tokio::test]
async fn event_sink_sees_the_request_lifecycle() {
    let sink = Arc::new(CollectingEventSink::new());
    let sink_dyn: Arc<dyn EventSink> = Arc::clone(&sink) as Arc<dyn EventSink>;

    let pipeline = Pipeline::new(
        PipelineConfig::default().with_performance_monitoring(true),
    )
    .with_event_sink(sink_dyn);

    pipeline
        .execute(serde_json::json!({}), echo_handler())
        .await
        .unwrap();

    let names = sink.names();
    assert_eq!(names.first().map(String::as_str), Some("pipeline.started"));
    assert!(names.contains(&"pipeline.completed".to_string()));
    // Performance monitoring adds one stage.completed event per stage.
    assert_eq!(
        names.iter().filter(|n| *n == "stage.completed").count(),
        3
    );

    // A recovered failure emits pipeline.recovered instead.
    let sink = Arc::new(CollectingEventSink::new());
    let pipeline = Pipeline::new(PipelineConfig::default())
        .with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>);
    pipeline
        .execute(serde_json::json!({}), failing_handler())
        .await
        .unwrap();
    assert!(sink.names().contains(&"pipeline.recovered".to_string()));
}

#[tokio::test]
async fn disabled_context_tracking_keeps_registry_empty() {
    let pipeline = Pipeline::new(PipelineConfig::default().with_context_tracking(false));

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let handler = {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        handler_fn(move |request| {
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            async move {
                entered.notify_one();
                release.notified().await;
                Ok(request)
            }
        })
    };

    let pipeline = Arc::new(pipeline);
    let task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.execute(serde_json::json!({}), handler).await }
    });

    entered.notified().await;
    assert_eq!(pipeline.stats().active_contexts, 0);
    release.notify_one();
    task.await.unwrap().unwrap();
}
