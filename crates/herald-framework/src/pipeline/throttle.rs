//! The throttling stage.
//!
//! An admitted invocation holds a [`Release`] for as long as the inner stages
//! run. When they fail, the cancel predicate decides whether the invocation
//! still counts against the limit. A [`ReleaseGuard`] settles the release
//! exactly once, including when the stage future is torn down by a panic or
//! dropped, in which case the predicate sees [`InvocationAborted`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use herald_core::{ArgumentError, BoxError, InvocationAborted, Release, Reply, RestrictionError};
use tower::{Layer, Service};
use tracing::debug;

use crate::context::InvokeContext;

/// Decides whether a failed invocation is released from its throttle count.
pub type CancelPredicate = Arc<dyn Fn(&(dyn Error + Send + Sync + 'static)) -> bool + Send + Sync>;

/// Releases invocations rejected by a restriction or by argument parsing.
pub fn default_cancel_predicate() -> CancelPredicate {
    Arc::new(|err: &(dyn Error + Send + Sync + 'static)| {
        err.is::<RestrictionError>() || err.is::<ArgumentError>()
    })
}

// ============================================================================
// ReleaseGuard
// ============================================================================

struct ReleaseGuard {
    release: Option<Release>,
    cancel: CancelPredicate,
}

impl ReleaseGuard {
    fn new(release: Release, cancel: CancelPredicate) -> Self {
        Self {
            release: Some(release),
            cancel,
        }
    }

    /// Keeps the invocation counted.
    fn keep(mut self) {
        self.release.take();
    }

    /// Releases the invocation if the predicate matches `err`.
    fn settle(mut self, err: &(dyn Error + Send + Sync + 'static)) {
        self.settle_with(err);
    }

    fn settle_with(&mut self, err: &(dyn Error + Send + Sync + 'static)) {
        let Some(release) = self.release.take() else {
            return;
        };
        if (self.cancel)(err) {
            debug!(error = %err, "Releasing throttle count");
            release.release();
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.settle_with(&InvocationAborted);
    }
}

// ============================================================================
// ThrottleLayer
// ============================================================================

/// Counts invocations against the command's throttler.
#[derive(Clone)]
pub struct ThrottleLayer {
    cancel: CancelPredicate,
}

impl ThrottleLayer {
    pub fn new(cancel: CancelPredicate) -> Self {
        Self { cancel }
    }
}

impl Default for ThrottleLayer {
    fn default() -> Self {
        Self::new(default_cancel_predicate())
    }
}

impl fmt::Debug for ThrottleLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = ThrottleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrottleService {
            inner,
            cancel: self.cancel.clone(),
        }
    }
}

pub struct ThrottleService<S> {
    inner: S,
    cancel: CancelPredicate,
}

impl<S: Clone> Clone for ThrottleService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S> Service<Arc<InvokeContext>> for ThrottleService<S>
where
    S: Service<Arc<InvokeContext>, Response = Reply, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Reply;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Reply, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: Arc<InvokeContext>) -> Self::Future {
        let inner = self.inner.clone();
        let cancel = self.cancel.clone();
        throttled(inner, cancel, ctx).boxed()
    }
}

async fn throttled<S>(
    mut inner: S,
    cancel: CancelPredicate,
    ctx: Arc<InvokeContext>,
) -> Result<Reply, BoxError>
where
    S: Service<Arc<InvokeContext>, Response = Reply, Error = BoxError>,
{
    let Some(throttler) = ctx.command().throttler().cloned() else {
        return inner.call(ctx).await;
    };

    let release = throttler.check(ctx.event())?;
    let guard = ReleaseGuard::new(release, cancel);
    let result = inner.call(ctx).await;
    match &result {
        Ok(_) => guard.keep(),
        Err(err) => guard.settle(err.as_ref()),
    }
    result
}
