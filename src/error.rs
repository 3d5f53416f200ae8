use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the filler operations. Each one is reported to the operator
/// as a single line and never ends the session.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("cannot determine the partition containing {}", .0.display())]
    PartitionNotFound(PathBuf),

    #[error("free space is about {free_mb} MB, not above the {reserve_mb} MB reserve; nothing to fill")]
    InsufficientSpace { free_mb: u64, reserve_mb: u64 },

    #[error("failed to create filler file {}: {reason}", .path.display())]
    AllocationFailed { path: PathBuf, reason: String },

    #[error("creating filler file {} timed out after {}s", .path.display(), .timeout.as_secs())]
    AllocationTimeout { path: PathBuf, timeout: Duration },

    #[error("file does not exist or is not a regular file: {}", .0.display())]
    RemovalNotFound(PathBuf),

    #[error("failed to delete {}: {source}", .path.display())]
    RemovalFailed {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}
