//! # Status reporting.
//!
//! - [`StatusSnapshot`] - start time, exit-code histogram and live units per worker
//! - [`StatusStore`] - where snapshots go
//! - [`FileStatusStore`] / [`MemoryStatusStore`] - bundled stores

mod snapshot;
mod store;

pub use snapshot::StatusSnapshot;
pub use store::{FileStatusStore, MemoryStatusStore, StatusError, StatusStore};
