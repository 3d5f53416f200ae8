use super::Space;
use crate::collectors::mounts::{self, MountEntry};
use crate::util::command::{run_with_timeout, RunOutcome};
use anyhow::{Context, Result};
use nix::sys::statvfs::statvfs;
use nix::unistd::{access, AccessFlags};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

#[cfg(target_os = "linux")]
pub fn mount_table(_timeout: Duration) -> Option<Vec<MountEntry>> {
    let content = fs::read_to_string("/proc/self/mounts")
        .or_else(|_| fs::read_to_string("/proc/mounts"))
        .map_err(|e| log::info!("kernel mount table unavailable: {e}"))
        .ok()?;
    Some(mounts::parse_proc_mounts(&content))
}

#[cfg(not(target_os = "linux"))]
pub fn mount_table(timeout: Duration) -> Option<Vec<MountEntry>> {
    match run_with_timeout(&mut Command::new("mount"), timeout) {
        Ok(RunOutcome::Exited { status, stdout, .. }) if status.success() => {
            Some(mounts::parse_mount_output(&stdout))
        }
        Ok(other) => {
            log::info!("mount listing unavailable: {}", other.diagnostic());
            None
        }
        Err(e) => {
            log::info!("mount listing unavailable: {e:#}");
            None
        }
    }
}

pub fn fallback_roots() -> Vec<MountEntry> {
    let mut roots = vec![PathBuf::from("/")];
    if let Some(home) = dirs::home_dir() {
        roots.push(home);
    }
    roots
        .into_iter()
        .filter_map(|p| fs::canonicalize(p).ok())
        .filter(|p| p.is_dir())
        .map(|p| MountEntry::bare(p.to_string_lossy().into_owned()))
        .collect()
}

pub fn space(path: &Path) -> Result<Space> {
    let stat = statvfs(path).with_context(|| format!("statvfs {}", path.display()))?;

    let frsize = stat.fragment_size() as u64;
    let total  = stat.blocks() as u64 * frsize;
    let free   = stat.blocks_available() as u64 * frsize;

    Ok(Space { total, free: free.min(total) })
}

pub fn device_id(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.dev())
}

pub fn file_identity(meta: &fs::Metadata) -> Option<(u64, u64)> {
    Some((meta.dev(), meta.ino()))
}

/// `df -P <path>`: the mount point is the last column of the last line.
pub fn native_mount_point(path: &Path, timeout: Duration) -> Option<String> {
    let out = run_with_timeout(Command::new("df").arg("-P").arg(path), timeout).ok()?;
    match out {
        RunOutcome::Exited { status, stdout, .. } if status.success() => {
            mounts::parse_df_mount_point(&stdout)
        }
        other => {
            log::debug!("df -P {} gave no answer: {}", path.display(), other.diagnostic());
            None
        }
    }
}

#[cfg(target_os = "linux")]
pub fn volume_label(entry: &MountEntry) -> String {
    if !entry.device.starts_with("/dev/") {
        return String::new();
    }
    let device = match fs::canonicalize(&entry.device) {
        Ok(d)  => d,
        Err(_) => return String::new(),
    };
    let dir = match fs::read_dir("/dev/disk/by-label") {
        Ok(d)  => d,
        Err(_) => return String::new(),
    };
    for link in dir.flatten() {
        if fs::canonicalize(link.path()).ok().as_deref() == Some(device.as_path()) {
            return mounts::decode_hex_escapes(&link.file_name().to_string_lossy());
        }
    }
    String::new()
}

#[cfg(not(target_os = "linux"))]
pub fn volume_label(_entry: &MountEntry) -> String {
    String::new()
}

pub fn is_writable(dir: &Path) -> bool {
    access(dir, AccessFlags::W_OK).is_ok()
}

pub fn root_path(mount_point: &str) -> PathBuf {
    PathBuf::from(mount_point)
}
