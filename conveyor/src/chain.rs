//! Onion composition of the request-handling stage.
//!
//! Interceptors and the terminal handler are folded into a single callable:
//! the fold runs from the end of the registration list, so construction is
//! right-to-left while invocation order is left-to-right. An interceptor
//! short-circuits everything downstream simply by not running its
//! continuation.

use crate::errors::MiddlewareError;
use crate::middleware::Interceptor;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The future type produced by handlers and the composed chain.
pub type HandlerFuture = BoxFuture<'static, Result<serde_json::Value, MiddlewareError>>;

/// A callable that consumes a request and produces a result.
///
/// Both the terminal handler and every partially-built chain layer have this
/// shape.
pub type BoxedHandler = Arc<dyn Fn(serde_json::Value) -> HandlerFuture + Send + Sync>;

/// The continuation handed to an interceptor.
///
/// Running it resolves to the next interceptor in registration order, or the
/// terminal handler once the chain is exhausted. `run` consumes the
/// continuation, so an interceptor invokes its downstream at most once.
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    pub(crate) fn new(inner: BoxedHandler) -> Self {
        Self { inner }
    }

    /// Invokes the downstream chain with `request`.
    pub async fn run(self, request: serde_json::Value) -> Result<serde_json::Value, MiddlewareError> {
        (self.inner.as_ref())(request).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Lifts an async function into a [`BoxedHandler`].
pub fn handler_fn<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, MiddlewareError>> + Send + 'static,
{
    Arc::new(move |request| -> HandlerFuture { Box::pin(f(request)) })
}

/// Composes interceptors and a terminal handler into one callable.
///
/// Folds the list from the end: the last-registered interceptor wraps the
/// terminal handler, and each earlier interceptor wraps everything after it,
/// so invoking the result runs the first-registered interceptor first. An
/// empty list yields the terminal handler unchanged.
#[must_use]
pub fn build_chain(interceptors: &[Arc<dyn Interceptor>], terminal: BoxedHandler) -> BoxedHandler {
    let mut wrapped = terminal;
    for interceptor in interceptors.iter().rev() {
        let current = Arc::clone(interceptor);
        let downstream = wrapped;
        wrapped = Arc::new(move |request: serde_json::Value| -> HandlerFuture {
            let current = Arc::clone(&current);
            let next = Next::new(Arc::clone(&downstream));
            Box::pin(async move { current.handle(request, next).await })
        });
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct NamedInterceptor {
        name: String,
        calls: Arc<Mutex<Vec<String>>>,
        short_circuit: bool,
    }

    impl NamedInterceptor {
        fn passthrough(name: &str, calls: Arc<Mutex<Vec<String>>>) -> Arc<dyn Interceptor> {
            Arc::new(Self {
                name: name.to_string(),
                calls,
                short_circuit: false,
            })
        }

        fn blocking(name: &str, calls: Arc<Mutex<Vec<String>>>) -> Arc<dyn Interceptor> {
            Arc::new(Self {
                name: name.to_string(),
                calls,
                short_circuit: true,
            })
        }
    }

    #[async_trait]
    impl Interceptor for NamedInterceptor {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(
            &self,
            request: serde_json::Value,
            next: Next,
        ) -> Result<serde_json::Value, MiddlewareError> {
            self.calls.lock().push(self.name.clone());
            if self.short_circuit {
                return Ok(serde_json::json!({"short_circuited_by": self.name}));
            }
            next.run(request).await
        }
    }

    fn terminal(calls: Arc<Mutex<Vec<String>>>) -> BoxedHandler {
        handler_fn(move |request| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().push("handler".to_string());
                Ok(request)
            }
        })
    }

    #[tokio::test]
    async fn test_empty_chain_is_the_handler() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let chain = build_chain(&[], terminal(Arc::clone(&calls)));

        let result = (chain.as_ref())(serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
        assert_eq!(*calls.lock(), vec!["handler"]);
    }

    #[tokio::test]
    async fn test_invocation_order_is_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let interceptors = vec![
            NamedInterceptor::passthrough("m1", Arc::clone(&calls)),
            NamedInterceptor::passthrough("m2", Arc::clone(&calls)),
            NamedInterceptor::passthrough("m3", Arc::clone(&calls)),
        ];

        let chain = build_chain(&interceptors, terminal(Arc::clone(&calls)));
        (chain.as_ref())(serde_json::json!({})).await.unwrap();

        assert_eq!(*calls.lock(), vec!["m1", "m2", "m3", "handler"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_downstream() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let interceptors = vec![
            NamedInterceptor::passthrough("m1", Arc::clone(&calls)),
            NamedInterceptor::blocking("m2", Arc::clone(&calls)),
            NamedInterceptor::passthrough("m3", Arc::clone(&calls)),
        ];

        let chain = build_chain(&interceptors, terminal(Arc::clone(&calls)));
        let result = (chain.as_ref())(serde_json::json!({})).await.unwrap();

        assert_eq!(result, serde_json::json!({"short_circuited_by": "m2"}));
        assert_eq!(*calls.lock(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_chain_is_reusable() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let interceptors = vec![NamedInterceptor::passthrough("m1", Arc::clone(&calls))];
        let chain = build_chain(&interceptors, terminal(Arc::clone(&calls)));

        (chain.as_ref())(serde_json::json!({})).await.unwrap();
        (chain.as_ref())(serde_json::json!({})).await.unwrap();

        assert_eq!(*calls.lock(), vec!["m1", "handler", "m1", "handler"]);
    }
}
