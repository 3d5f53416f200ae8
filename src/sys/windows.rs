use super::Space;
use crate::collectors::mounts::MountEntry;
use anyhow::{bail, Result};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::time::Duration;

use winapi::um::fileapi::{
    GetDiskFreeSpaceExW, GetDriveTypeW, GetLogicalDrives, GetVolumeInformationW, GetVolumePathNameW,
};
use winapi::um::winbase::{DRIVE_FIXED, DRIVE_REMOVABLE};
use winapi::um::winnt::ULARGE_INTEGER;

const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(Some(0)).collect()
}

fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

/// Local fixed and removable drives from `GetLogicalDrives`.
pub fn mount_table(_timeout: Duration) -> Option<Vec<MountEntry>> {
    let mask = unsafe { GetLogicalDrives() };
    if mask == 0 {
        log::info!("GetLogicalDrives failed: {}", io::Error::last_os_error());
        return None;
    }
    let mut out = Vec::new();
    for (i, letter) in LETTERS.chars().enumerate() {
        if mask & (1 << i) == 0 { continue; }
        let root = format!("{}:\\", letter);
        let kind = unsafe { GetDriveTypeW(wide(OsStr::new(&root)).as_ptr()) };
        if kind != DRIVE_FIXED && kind != DRIVE_REMOVABLE { continue; }
        let (_, fs_type) = volume_info(&root);
        out.push(MountEntry {
            device:  String::new(),
            mount:   format!("{}:", letter),
            fs_type,
        });
    }
    Some(out)
}

pub fn fallback_roots() -> Vec<MountEntry> {
    LETTERS
        .chars()
        .filter(|l| Path::new(&format!("{}:\\", l)).exists())
        .map(|l| MountEntry::bare(format!("{}:", l)))
        .collect()
}

pub fn space(path: &Path) -> Result<Space> {
    let dir = wide(path.as_os_str());
    let mut avail: ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let mut total: ULARGE_INTEGER = unsafe { std::mem::zeroed() };
    let ok = unsafe { GetDiskFreeSpaceExW(dir.as_ptr(), &mut avail, &mut total, ptr::null_mut()) };
    if ok == 0 {
        bail!("GetDiskFreeSpaceExW {}: {}", path.display(), io::Error::last_os_error());
    }
    let (total, free) = unsafe { (*total.QuadPart(), *avail.QuadPart()) };
    Ok(Space { total, free: free.min(total) })
}

pub fn device_id(_path: &Path) -> Option<u64> {
    None
}

pub fn file_identity(_meta: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

/// `GetVolumePathNameW`: the volume mount point holding `path`.
pub fn native_mount_point(path: &Path, _timeout: Duration) -> Option<String> {
    let p = wide(path.as_os_str());
    let mut buf = [0u16; 1024];
    let ok = unsafe { GetVolumePathNameW(p.as_ptr(), buf.as_mut_ptr(), buf.len() as u32) };
    if ok == 0 {
        return None;
    }
    Some(from_wide(&buf).trim_end_matches('\\').to_string())
}

pub fn volume_label(entry: &MountEntry) -> String {
    volume_info(&root_path(&entry.mount).to_string_lossy()).0
}

fn volume_info(root: &str) -> (String, String) {
    let r = wide(OsStr::new(root));
    let mut label = [0u16; 261];
    let mut fs_name = [0u16; 261];
    let ok = unsafe {
        GetVolumeInformationW(
            r.as_ptr(),
            label.as_mut_ptr(),
            label.len() as u32,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            fs_name.as_mut_ptr(),
            fs_name.len() as u32,
        )
    };
    if ok == 0 {
        return (String::new(), String::new());
    }
    (from_wide(&label), from_wide(&fs_name))
}

pub fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir).map(|m| !m.permissions().readonly()).unwrap_or(false)
}

pub fn root_path(mount_point: &str) -> PathBuf {
    let trimmed = mount_point.trim_end_matches('\\');
    PathBuf::from(format!("{}\\", trimmed))
}
