//! # Worker abstraction and function-backed worker implementation.
//!
//! This module defines the [`Worker`] trait (async, stoppable) and a
//! convenient closure-backed implementation [`WorkerFn`]. The common handle
//! type is [`WorkerRef`], an `Arc<dyn Worker>` shared by every unit of a pool.
//!
//! Each unit calls [`Worker::run`] once, producing a fresh future that owns
//! its own state; nothing is shared between units unless the implementation
//! shares it explicitly (e.g. through an `Arc` captured by the closure).

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::WorkerContext;
use crate::error::WorkerError;

/// # Shared handle to a worker implementation.
pub type WorkerRef = Arc<dyn Worker>;

/// # Worker implementation run by every unit of a pool.
///
/// The run loop owns the unit: when it returns, the unit has terminated and
/// the supervisor records the exit code derived from the result.
/// Implementations should watch [`WorkerContext::stopped`] and return
/// promptly once a stop is requested; a unit that ignores it is force-killed
/// after the grace window.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use poolvisor::{Worker, WorkerContext, WorkerError};
///
/// struct Idle;
///
/// #[async_trait]
/// impl Worker for Idle {
///     async fn run(&self, ctx: WorkerContext) -> Result<(), WorkerError> {
///         ctx.stopped().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Runs the unit until it finishes or is asked to stop.
    async fn run(&self, ctx: WorkerContext) -> Result<(), WorkerError>;
}

/// Closure-backed worker.
///
/// Wraps `F: Fn(WorkerContext) -> Fut`, creating a new future per unit.
///
/// ## Example
/// ```rust
/// use poolvisor::{WorkerContext, WorkerFn, WorkerRef, WorkerError};
///
/// let w: WorkerRef = WorkerFn::arc(|ctx: WorkerContext| async move {
///     ctx.stopped().await;
///     Ok::<_, WorkerError>(())
/// });
/// # let _ = w;
/// ```
#[derive(Debug)]
pub struct WorkerFn<F> {
    f: F,
}

impl<F> WorkerFn<F> {
    /// Creates a new closure-backed worker.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the worker and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Worker for WorkerFn<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    async fn run(&self, ctx: WorkerContext) -> Result<(), WorkerError> {
        (self.f)(ctx).await
    }
}
