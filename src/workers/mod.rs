//! # Worker specifications and implementations.
//!
//! - [`WorkerSpec`] - declaration of one pool (name, listen, count, implementation)
//! - [`Worker`] - trait implemented by a unit's run loop
//! - [`WorkerFn`] - closure-backed worker
//! - [`WorkerRef`] - shared reference to a worker (`Arc<dyn Worker>`)
//! - [`WorkerContext`] - what a unit's run loop receives
//! - [`WorkerCatalog`] - implementation references resolved by task-grade units

mod builtin;
mod catalog;
mod context;
mod spec;
mod worker;

pub use builtin::EchoWorker;
pub use catalog::WorkerCatalog;
pub use context::WorkerContext;
pub use spec::WorkerSpec;
pub use worker::{Worker, WorkerFn, WorkerRef};
