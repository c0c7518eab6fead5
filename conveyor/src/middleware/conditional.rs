//! An interceptor gated behind a request predicate.

use super::Interceptor;
use crate::chain::Next;
use crate::errors::MiddlewareError;
use async_trait::async_trait;
use std::sync::Arc;

/// Gates an inner interceptor behind a predicate evaluated on the request.
///
/// When the predicate holds, the inner interceptor runs with the real
/// continuation; otherwise the continuation is taken directly and the inner
/// interceptor is bypassed entirely. This is plain composition, not a special
/// case in the orchestrator.
pub struct ConditionalInterceptor<P>
where
    P: Fn(&serde_json::Value) -> bool + Send + Sync,
{
    name: String,
    predicate: P,
    inner: Arc<dyn Interceptor>,
}

impl<P> ConditionalInterceptor<P>
where
    P: Fn(&serde_json::Value) -> bool + Send + Sync,
{
    /// Wraps `inner` behind `predicate`.
    pub fn new(name: impl Into<String>, predicate: P, inner: Arc<dyn Interceptor>) -> Self {
        Self {
            name: name.into(),
            predicate,
            inner,
        }
    }
}

#[async_trait]
impl<P> Interceptor for ConditionalInterceptor<P>
where
    P: Fn(&serde_json::Value) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        request: serde_json::Value,
        next: Next,
    ) -> Result<serde_json::Value, MiddlewareError> {
        if (self.predicate)(&request) {
            self.inner.handle(request, next).await
        } else {
            next.run(request).await
        }
    }
}
