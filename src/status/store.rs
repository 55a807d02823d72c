//! # Status snapshot stores.
//!
//! ```text
//! Supervisor::tick() ──► StatusStore::write(&snapshot)
//!                            ├─ FileStatusStore   unchanged? skip : temp file ─► fsync ─► rename
//!                            └─ MemoryStatusStore RwLock replace
//! ```
//!
//! ## Rules
//! - a write replaces the whole record
//! - readers never observe a partially written record
//! - the file store skips a write whose record equals the one it wrote last,
//!   unless the file has disappeared meanwhile

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tempfile::Builder;
use thiserror::Error;

use super::snapshot::StatusSnapshot;

/// # Status persistence failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StatusError {
    /// Filesystem failure.
    #[error("status file {}: {source}", path.display())]
    Io {
        /// Status file path.
        path: PathBuf,
        /// OS error.
        #[source]
        source: io::Error,
    },

    /// The record could not be (de)serialized.
    #[error("status record is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

impl StatusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StatusError::Io { .. } => "status_io",
            StatusError::Format(_) => "status_format",
        }
    }
}

/// Destination of status snapshots.
pub trait StatusStore: Send + Sync {
    /// Replaces the stored record.
    fn write(&self, snapshot: &StatusSnapshot) -> Result<(), StatusError>;

    /// Reads the stored record, `None` if nothing was written yet.
    fn read(&self) -> Result<Option<StatusSnapshot>, StatusError>;
}

/// JSON status file, replaced atomically.
#[derive(Clone, Debug)]
pub struct FileStatusStore {
    path: PathBuf,
    last: Arc<Mutex<Option<Vec<u8>>>>,
}

impl FileStatusStore {
    /// Store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: Arc::default(),
        }
    }

    /// Status file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StatusError {
        StatusError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StatusStore for FileStatusStore {
    fn write(&self, snapshot: &StatusSnapshot) -> Result<(), StatusError> {
        let contents = serde_json::to_vec_pretty(snapshot)?;
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.as_deref() == Some(contents.as_slice()) && self.path.exists() {
            return Ok(());
        }
        atomic_write(&self.path, &contents).map_err(|e| self.io_error(e))?;
        *last = Some(contents);
        Ok(())
    }

    fn read(&self) -> Result<Option<StatusSnapshot>, StatusError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("poolvisor-status"),
    );
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o644));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// In-process store; clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct MemoryStatusStore {
    inner: Arc<RwLock<Option<StatusSnapshot>>>,
}

impl MemoryStatusStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written snapshot.
    pub fn latest(&self) -> Option<StatusSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StatusStore for MemoryStatusStore {
    fn write(&self, snapshot: &StatusSnapshot) -> Result<(), StatusError> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(snapshot.clone());
        Ok(())
    }

    fn read(&self) -> Result<Option<StatusSnapshot>, StatusError> {
        Ok(self.latest())
    }
}
