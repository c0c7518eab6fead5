//! Function adapters for defining middleware from closures.

use super::{Interceptor, Transform};
use crate::chain::Next;
use crate::context::RequestContext;
use crate::errors::MiddlewareError;
use async_trait::async_trait;
use futures::future::BoxFuture;

/// A transform defined from a plain function.
pub struct FnTransform<F>
where
    F: Fn(serde_json::Value, &RequestContext) -> Result<serde_json::Value, MiddlewareError>
        + Send
        + Sync,
{
    name: String,
    func: F,
}

impl<F> FnTransform<F>
where
    F: Fn(serde_json::Value, &RequestContext) -> Result<serde_json::Value, MiddlewareError>
        + Send
        + Sync,
{
    /// Creates a named transform from `func`.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Transform for FnTransform<F>
where
    F: Fn(serde_json::Value, &RequestContext) -> Result<serde_json::Value, MiddlewareError>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(
        &self,
        payload: serde_json::Value,
        ctx: &RequestContext,
    ) -> Result<serde_json::Value, MiddlewareError> {
        (self.func)(payload, ctx)
    }
}

/// An interceptor defined from a function returning a boxed future.
pub struct FnInterceptor<F>
where
    F: Fn(serde_json::Value, Next) -> BoxFuture<'static, Result<serde_json::Value, MiddlewareError>>
        + Send
        + Sync,
{
    name: String,
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(serde_json::Value, Next) -> BoxFuture<'static, Result<serde_json::Value, MiddlewareError>>
        + Send
        + Sync,
{
    /// Creates a named interceptor from `func`.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(serde_json::Value, Next) -> BoxFuture<'static, Result<serde_json::Value, MiddlewareError>>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        request: serde_json::Value,
        next: Next,
    ) -> Result<serde_json::Value, MiddlewareError> {
        (self.func)(request, next).await
    }
}
