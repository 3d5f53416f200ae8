//! Platform queries behind one surface: mount table, space statistics,
//! device identity and volume labels.

#[cfg(windows)]
mod windows;

#[cfg(unix)]
mod unix;

#[cfg(windows)]
use crate::sys::windows as imp;

#[cfg(unix)]
use crate::sys::unix as imp;

use crate::collectors::mounts::MountEntry;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw capacity numbers for one filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Space {
    pub total: u64,
    /// Available to the invoking user.
    pub free:  u64,
}

/// The OS mount table, or `None` when the facility is not available here.
pub fn mount_table(timeout: Duration) -> Option<Vec<MountEntry>> {
    imp::mount_table(timeout)
}

/// Well-known roots probed when the mount table is unavailable.
pub fn fallback_roots() -> Vec<MountEntry> {
    imp::fallback_roots()
}

pub fn space(path: &Path) -> Result<Space> {
    imp::space(path)
}

/// Identifier of the filesystem holding `path` (`st_dev` on Unix).
pub fn device_id(path: &Path) -> Option<u64> {
    imp::device_id(path)
}

/// Stable identity of a file across aliases such as bind mounts (`(st_dev, st_ino)` on Unix).
pub fn file_identity(meta: &fs::Metadata) -> Option<(u64, u64)> {
    imp::file_identity(meta)
}

/// Ask the platform which mount point really holds `path`.
pub fn native_mount_point(path: &Path, timeout: Duration) -> Option<String> {
    imp::native_mount_point(path, timeout)
}

pub fn volume_label(entry: &MountEntry) -> String {
    imp::volume_label(entry)
}

pub fn is_writable(dir: &Path) -> bool {
    imp::is_writable(dir)
}

/// Path usable for filesystem calls on a mount point string ("C:" → "C:\").
pub fn root_path(mount_point: &str) -> PathBuf {
    imp::root_path(mount_point)
}
