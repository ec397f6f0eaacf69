//! Custom middleware.
//!
//! Middleware wraps the fixed stage sequence with onion composition: each
//! middleware receives the context and a [`Next`] continuation, and may run
//! code before and after calling it, or return without calling it at all.
//! The first registered middleware is the outermost.
//!
//! ```rust,ignore
//! let timing = middleware_fn(|ctx, next| async move {
//!     let started = Instant::now();
//!     let result = next.run(ctx).await;
//!     debug!(elapsed = ?started.elapsed(), "Invocation finished");
//!     result
//! });
//! ```

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use herald_core::{BoxError, Reply};
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

use crate::context::InvokeContext;

/// The type-erased service a pipeline is assembled into.
pub type PipelineService = BoxCloneSyncService<Arc<InvokeContext>, Reply, BoxError>;

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Code run around every invocation of a pipeline.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: Arc<InvokeContext>, next: Next) -> Result<Reply, BoxError>;
}

/// The rest of the pipeline, as seen from a middleware.
pub struct Next {
    inner: PipelineService,
}

impl Next {
    /// Runs the remaining middleware and stages.
    pub async fn run(self, ctx: Arc<InvokeContext>) -> Result<Reply, BoxError> {
        self.inner.oneshot(ctx).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

// =============================================================================
// Closures
// =============================================================================

/// Wraps an async closure as a [`Middleware`].
pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Arc<InvokeContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, BoxError>> + Send + 'static,
{
    FnMiddleware(f)
}

#[derive(Clone)]
pub struct FnMiddleware<F>(F);

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Arc<InvokeContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, BoxError>> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<InvokeContext>, next: Next) -> Result<Reply, BoxError> {
        (self.0)(ctx, next).await
    }
}

// =============================================================================
// Composition
// =============================================================================

/// Wraps `inner` in `middleware`, the first entry outermost.
pub(crate) fn wrap(inner: PipelineService, middleware: &[BoxedMiddleware]) -> PipelineService {
    middleware.iter().rev().fold(inner, |next, middleware| {
        PipelineService::new(MiddlewareService {
            middleware: Arc::clone(middleware),
            next,
        })
    })
}

#[derive(Clone)]
struct MiddlewareService {
    middleware: BoxedMiddleware,
    next: PipelineService,
}

impl Service<Arc<InvokeContext>> for MiddlewareService {
    type Response = Reply;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Reply, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<InvokeContext>) -> Self::Future {
        let middleware = Arc::clone(&self.middleware);
        let next = Next {
            inner: self.next.clone(),
        };
        async move { middleware.handle(ctx, next).await }.boxed()
    }
}
