//! Reusable middleware fixtures for engine tests.

mod fixtures;

pub use fixtures::{
    CallLog, CountingCleanup, ErrorCountProbe, FailingErrorHandler, MarkerTransform,
    RecordingErrorHandler, RecordingInterceptor, ShortCircuitInterceptor,
};
